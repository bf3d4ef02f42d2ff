//! API error types and JSON error response formatting.
//!
//! Every failure is reported as a JSON object with an `error` string, plus
//! extra fields where a client can act on them.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use parley_chat::ChatError;
use parley_transcribe::TranscribeError;

/// Hint returned when the speech model file is missing.
pub const TRANSCRIPTION_MODEL_HINT: &str =
    "Download a whisper GGML model and set WHISPER_MODEL_PATH or [transcription].model_path";

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            model_path: None,
            hint: None,
        }
    }
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid input.
    BadRequest(String),
    /// 400 Bad Request - the transcription model file is not installed.
    TranscriptionModelMissing { model_path: String },
    /// 500 Internal Server Error - generation or transcription failed.
    Internal(String),
    /// 503 Service Unavailable - a backend could not be initialized.
    ServiceUnavailable(String),
    /// The request body could not be read (too large, malformed form).
    Rejected { status: StatusCode, message: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorBody::new(msg)),
            ApiError::TranscriptionModelMissing { model_path } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "transcription model not found".to_string(),
                    model_path: Some(model_path),
                    hint: Some(TRANSCRIPTION_MODEL_HINT.to_string()),
                },
            ),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new(msg))
            }
            ApiError::ServiceUnavailable(msg) => {
                tracing::warn!(error = %msg, "Backend unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, ErrorBody::new(msg))
            }
            ApiError::Rejected { status, message } => (status, ErrorBody::new(message)),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage => ApiError::BadRequest("no message".to_string()),
            e if e.is_initialization() => ApiError::ServiceUnavailable(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<TranscribeError> for ApiError {
    fn from(err: TranscribeError) -> Self {
        match err {
            TranscribeError::ModelNotFound(model_path) => {
                ApiError::TranscriptionModelMissing { model_path }
            }
            e @ TranscribeError::EmptyAudio => ApiError::BadRequest(e.to_string()),
            e @ TranscribeError::BackendUnavailable(_) => ApiError::ServiceUnavailable(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(err: MultipartRejection) -> Self {
        ApiError::Rejected {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Rejected {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(err: BytesRejection) -> Self {
        ApiError::Rejected {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {}", err))
    }
}
