use tau_ui_stream::UiStreamError;
use thiserror::Error;

#[derive(Debug, Error)]
/// Enumerates supported `ChatRuntimeError` values.
pub enum ChatRuntimeError {
    #[error("{0}")]
    Validation(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat endpoint returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("stream decode error: {0}")]
    Decode(UiStreamError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("turn cancelled")]
    Cancelled,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ChatRuntimeError {
    /// Returns true for failures that end a turn after it was submitted.
    pub fn is_turn_failure(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::HttpStatus { .. }
                | Self::Transport(_)
                | Self::Decode(_)
                | Self::Serde(_)
        )
    }
}

impl From<UiStreamError> for ChatRuntimeError {
    fn from(error: UiStreamError) -> Self {
        match error {
            UiStreamError::Transport(message) => Self::Transport(message),
            other => Self::Decode(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use tau_ui_stream::UiStreamError;

    use super::ChatRuntimeError;

    #[test]
    fn unit_stream_transport_errors_map_to_transport_variant() {
        let error = ChatRuntimeError::from(UiStreamError::Transport("reset".to_string()));
        assert!(matches!(error, ChatRuntimeError::Transport(ref message) if message == "reset"));

        let error = ChatRuntimeError::from(UiStreamError::Decode {
            valid_up_to: 2,
            frame_len: 4,
        });
        assert!(matches!(error, ChatRuntimeError::Decode(_)));
        assert!(error.is_turn_failure());
    }

    #[test]
    fn unit_validation_and_cancellation_are_not_turn_failures() {
        assert!(!ChatRuntimeError::Validation("empty".to_string()).is_turn_failure());
        assert!(!ChatRuntimeError::Cancelled.is_turn_failure());
        assert_eq!(
            ChatRuntimeError::Validation("Please enter a message or upload an image".to_string())
                .to_string(),
            "Please enter a message or upload an image"
        );
    }
}
