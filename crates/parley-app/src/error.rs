//! Errors that end a command-line run, with their exit codes.

use std::path::PathBuf;

use parley_chat::ChatError;
use parley_core::error::ParleyError;
use parley_generate::GenerateError;

/// Errors from a command-line run.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No prompt provided")]
    NoPrompt,
    #[error("Failed to read file: {}", path.display())]
    PromptFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Server(#[from] ParleyError),
}

impl AppError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::NoPrompt => 1,
            AppError::Generate(GenerateError::BackendUnavailable(_)) => 2,
            AppError::PromptFile { .. } => 3,
            AppError::Generate(GenerateError::ModelLoad(_)) => 4,
            AppError::Generate(_) | AppError::Chat(_) | AppError::Io(_) | AppError::Server(_) => 1,
        }
    }
}
