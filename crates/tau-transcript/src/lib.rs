//! Conversation transcript model and the reducer that folds UI stream events into it.
mod content;
mod history;
mod model;
mod reducer;
mod wire;

pub use content::{compose_prompt_parts, has_submittable_content, ContentPart};
pub use history::{transcript_from_history, turn_from_persisted, PersistedMessage};
pub use model::{
    new_turn_id, Segment, SegmentKind, StreamLifecycle, ToolLifecycle, Transcript, Turn,
    TurnRole,
};
pub use reducer::{finalize_turn, reduce_turn, TurnReducer};
pub use wire::{
    filename_from_url, infer_media_type, to_wire_messages, ChatStreamRequest, WireMessage,
    WirePart,
};
