//! Error types for pipeline construction and generation.

/// Errors from building or running a generation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// The real backend was not compiled into this binary.
    #[error("generation backend unavailable: {0}")]
    BackendUnavailable(String),
    /// The backend is present but the named model could not be loaded.
    #[error("failed to load model: {0}")]
    ModelLoad(String),
    /// The backend failed while producing text.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl GenerateError {
    /// Whether this error happened while constructing the pipeline.
    pub fn is_initialization(&self) -> bool {
        matches!(
            self,
            GenerateError::BackendUnavailable(_) | GenerateError::ModelLoad(_)
        )
    }
}
