//! Wire protocol for UI message streams.
//!
//! Re-frames an incrementally delivered `text/event-stream` body into newline-delimited
//! frames and extracts the typed events carried by `data:` frames.
mod error;
mod event;
mod frame;

pub use error::UiStreamError;
pub use event::{
    collect_text, data_payload, decode_events, event_stream, extract_event, parse_event,
    TextDeltaHandler, UiStreamEvent,
};
pub use frame::{frame_stream, FrameDecoder};
