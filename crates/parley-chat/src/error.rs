//! Error types for the conversational layer.

use parley_generate::GenerateError;

/// Errors from a chat turn or the conversation store.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error(transparent)]
    Generation(#[from] GenerateError),
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl ChatError {
    /// Whether the turn failed because the backend could not be built.
    pub fn is_initialization(&self) -> bool {
        matches!(self, ChatError::Generation(e) if e.is_initialization())
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");

        let err = ChatError::Persistence("disk full".to_string());
        assert_eq!(err.to_string(), "persistence error: disk full");

        let err = ChatError::from(GenerateError::Inference("oom".to_string()));
        assert_eq!(err.to_string(), "inference failed: oom");
    }

    #[test]
    fn test_is_initialization() {
        let err = ChatError::from(GenerateError::BackendUnavailable("x".to_string()));
        assert!(err.is_initialization());
        let err = ChatError::from(GenerateError::ModelLoad("x".to_string()));
        assert!(err.is_initialization());
        let err = ChatError::from(GenerateError::Inference("x".to_string()));
        assert!(!err.is_initialization());
        assert!(!ChatError::EmptyMessage.is_initialization());
    }

    #[test]
    fn test_chat_error_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: ChatError = io.into();
        assert!(matches!(err, ChatError::Persistence(_)));
        assert!(err.to_string().contains("read-only"));
    }
}
