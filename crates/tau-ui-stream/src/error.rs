use thiserror::Error;

#[derive(Debug, Error)]
/// Enumerates supported `UiStreamError` values.
pub enum UiStreamError {
    #[error("invalid UTF-8 in stream frame (valid up to byte {valid_up_to} of {frame_len})")]
    Decode { valid_up_to: usize, frame_len: usize },
    #[error("stream transport error: {0}")]
    Transport(String),
    #[error("malformed stream event: {0}")]
    MalformedEvent(#[from] serde_json::Error),
}

impl UiStreamError {
    /// Returns true when the error ends the underlying byte stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
