//! Route handler implementations for all API endpoints.
//!
//! Model loading, generation, and transcription block, so they run on
//! tokio's blocking pool.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use parley_chat::ChatError;
use parley_core::config::GenerationConfig;
use parley_core::types::GenerationParameters;
use parley_transcribe::{decode_wav, TranscribeError, TranscriptionResult};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Health
// =============================================================================

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub history_len: usize,
}

/// GET /health - liveness plus a few counters.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        history_len: state.orchestrator.store().len(),
    })
}

// =============================================================================
// Chat
// =============================================================================

/// Request body for POST /api/chat.
///
/// Everything except `message` falls back to the server configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub model: Option<String>,
    pub device: Option<String>,
    pub dry_run: Option<bool>,
    pub max_new_tokens: Option<i64>,
    pub no_sample: Option<bool>,
    pub temperature: Option<f64>,
    pub top_k: Option<i64>,
    pub top_p: Option<f64>,
    pub repetition_penalty: Option<f64>,
    pub num_return_sequences: Option<i64>,
}

impl ChatRequest {
    /// Generation parameters with request values over configured defaults.
    pub fn parameters(&self, defaults: &GenerationConfig) -> GenerationParameters {
        let base = defaults.parameters();
        GenerationParameters {
            max_new_tokens: self.max_new_tokens.or(base.max_new_tokens),
            do_sample: self.no_sample.map(|no| !no).or(base.do_sample),
            temperature: self.temperature.or(base.temperature),
            top_k: self.top_k.or(base.top_k),
            top_p: self.top_p.or(base.top_p),
            repetition_penalty: self.repetition_penalty.or(base.repetition_penalty),
            num_return_sequences: self.num_return_sequences.or(base.num_return_sequences),
        }
    }
}

/// Response body for POST /api/chat.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// POST /api/chat - run one conversational turn.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = req.message.clone().unwrap_or_default();
    if message.trim().is_empty() {
        return Err(ChatError::EmptyMessage.into());
    }

    let generation = &state.config.generation;
    let model = req.model.clone().unwrap_or_else(|| generation.model.clone());
    let device = req.device.clone().unwrap_or_else(|| generation.device.clone());
    let dry_run = req.dry_run.unwrap_or(state.config.server.dry_run_default);
    let params = req.parameters(generation);

    debug!(model = %model, device = %device, dry_run, "Chat request");

    let reply = tokio::task::spawn_blocking(move || -> Result<String, ChatError> {
        let generator = state.pipelines.get_or_init(&model, &device, dry_run)?;
        state
            .orchestrator
            .handle_turn(generator.as_ref(), &message, &params)
    })
    .await??;

    Ok(Json(ChatResponse { reply }))
}

// =============================================================================
// Transcription
// =============================================================================

/// Response body for POST /api/transcribe.
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Form field carrying the audio in a multipart upload.
pub const AUDIO_FIELD: &str = "file";

/// POST /api/transcribe - transcribe a WAV file.
///
/// The WAV is either the raw request body or the `file` part of a
/// `multipart/form-data` upload.
pub async fn transcribe(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let slot = Arc::clone(&state.transcriber);
    let service = tokio::task::spawn_blocking(move || slot.get_or_load()).await??;

    let body = read_audio(request).await?;
    if body.is_empty() {
        return Err(TranscribeError::EmptyAudio.into());
    }

    let handle = tokio::runtime::Handle::current();
    let result = tokio::task::spawn_blocking(move || -> Result<TranscriptionResult, TranscribeError> {
        let audio = decode_wav(&body)?;
        debug!(
            samples = audio.samples.len(),
            sample_rate = audio.sample_rate,
            duration_secs = audio.duration_secs(),
            "Audio decoded"
        );
        handle.block_on(service.transcribe_boxed(&audio.samples, audio.sample_rate))
    })
    .await??;

    info!(
        text_len = result.text.len(),
        duration_secs = result.duration_secs,
        "Transcription served"
    );
    Ok(Json(TranscribeResponse { text: result.text }))
}

async fn read_audio(request: Request) -> Result<Bytes, ApiError> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if !is_form {
        return Ok(Bytes::from_request(request, &()).await?);
    }

    let mut form = Multipart::from_request(request, &()).await?;
    while let Some(field) = form.next_field().await? {
        if field.name() == Some(AUDIO_FIELD) {
            return Ok(field.bytes().await?);
        }
    }
    debug!("Multipart upload without a `{}` part", AUDIO_FIELD);
    Ok(Bytes::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_defaults_from_config() {
        let req: ChatRequest = serde_json::from_str(r#"{"message": "Hi"}"#).unwrap();
        let params = req.parameters(&GenerationConfig::default());
        assert_eq!(params.max_new_tokens, Some(120));
        assert_eq!(params.do_sample, Some(true));
        assert_eq!(params.temperature, Some(0.8));
        assert_eq!(params.top_k, Some(0));
        assert_eq!(params.top_p, Some(0.92));
        assert_eq!(params.repetition_penalty, Some(1.15));
        assert_eq!(params.num_return_sequences, Some(1));
    }

    #[test]
    fn test_chat_request_overrides() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"message": "Hi", "no_sample": true, "temperature": 0.3, "top_k": -5,
                "num_return_sequences": 3}"#,
        )
        .unwrap();
        let params = req.parameters(&GenerationConfig::default());
        assert_eq!(params.do_sample, Some(false));
        assert_eq!(params.temperature, Some(0.3));
        // Out-of-range values are passed through for the invoker to normalize.
        assert_eq!(params.top_k, Some(-5));
        assert_eq!(params.num_return_sequences, Some(3));
    }

    #[test]
    fn test_chat_request_empty_object() {
        let req: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(req.message.is_none());
        assert!(req.dry_run.is_none());
    }
}
