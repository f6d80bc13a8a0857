//! Turn orchestration for streaming chat transcripts.
//!
//! [`ChatSession`] owns the transcript, drives one turn at a time through a
//! [`ChatTransport`], and publishes an immutable snapshot after every applied stream event.
mod cancellation;
mod collaborators;
mod config;
mod error;
mod session;
mod transport;

pub use cancellation::CooperativeCancellationToken;
pub use collaborators::{
    upload_image, AssetStorage, ChatRecord, ChatRecordService, UploadRequest, UploadedAsset,
};
pub use config::{
    parse_header_pair, ChatRuntimeConfig, CHAT_ID_HEADER, DEFAULT_CHAT_API_URL,
    DEFAULT_CONNECT_TIMEOUT_MS,
};
pub use error::ChatRuntimeError;
pub use session::{
    ChatSession, ChatSessionEvent, ChatSessionEventHandler, ChatSnapshot, ChatStatus,
    TurnOutcome,
};
pub use transport::{ByteStream, ChatTransport, HttpChatTransport};
