//! Parley transcription crate - speech-to-text for voice input.
//!
//! Provides a trait-based abstraction for transcription, WAV decoding for
//! uploaded audio, a whisper.cpp-backed service, and a mock implementation
//! for testing without a real model.

pub mod wav;
pub mod whisper_service;

use std::future::Future;
use std::pin::Pin;

use parley_core::config::TranscriptionConfig;

pub use wav::{decode_wav, DecodedAudio};
pub use whisper_service::WhisperService;

// =============================================================================
// Errors
// =============================================================================

/// Errors from decoding or transcribing audio.
#[derive(Debug, thiserror::Error)]
pub enum TranscribeError {
    #[error("transcription model not found: {0}")]
    ModelNotFound(String),
    #[error("no audio provided")]
    EmptyAudio,
    #[error("invalid audio: {0}")]
    InvalidAudio(String),
    #[error("transcription backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("transcription failed: {0}")]
    Backend(String),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Whisper transcription engine.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the GGML model file.
    pub model_path: String,
    /// Language code for transcription (e.g., "en", "auto").
    pub language: String,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self::from(&TranscriptionConfig::default())
    }
}

impl From<&TranscriptionConfig> for WhisperConfig {
    fn from(config: &TranscriptionConfig) -> Self {
        Self {
            model_path: config.model_path.clone(),
            language: config.language.clone(),
        }
    }
}

// =============================================================================
// Result types
// =============================================================================

/// The outcome of one transcription.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    /// Recognized text with segments joined by single spaces.
    pub text: String,
    /// Requested language, or `auto` for detection.
    pub language: String,
    /// Audio length in seconds.
    pub duration_secs: f32,
}

/// Reject input no backend can transcribe.
pub fn check_audio(audio_data: &[f32], sample_rate: u32) -> Result<(), TranscribeError> {
    if audio_data.is_empty() {
        return Err(TranscribeError::EmptyAudio);
    }
    if sample_rate == 0 {
        return Err(TranscribeError::InvalidAudio(
            "sample rate must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// Traits
// =============================================================================

/// Service for transcribing audio data to text.
pub trait TranscriptionService: Send + Sync {
    /// Transcribe mono PCM samples in [-1.0, 1.0] recorded at `sample_rate` Hz.
    fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> impl Future<Output = Result<TranscriptionResult, TranscribeError>> + Send;
}

/// Object-safe version of [`TranscriptionService`] for dynamic dispatch.
///
/// A blanket implementation is provided so that every
/// `TranscriptionService` automatically implements this trait.
pub trait DynTranscriptionService: Send + Sync {
    fn transcribe_boxed<'a>(
        &'a self,
        audio_data: &'a [f32],
        sample_rate: u32,
    ) -> Pin<Box<dyn Future<Output = Result<TranscriptionResult, TranscribeError>> + Send + 'a>>;
}

impl<T: TranscriptionService> DynTranscriptionService for T {
    fn transcribe_boxed<'a>(
        &'a self,
        audio_data: &'a [f32],
        sample_rate: u32,
    ) -> Pin<Box<dyn Future<Output = Result<TranscriptionResult, TranscribeError>> + Send + 'a>>
    {
        Box::pin(self.transcribe(audio_data, sample_rate))
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock transcription service that returns a fixed transcript.
#[derive(Debug, Clone, Default)]
pub struct MockTranscriptionService;

impl MockTranscriptionService {
    pub fn new() -> Self {
        Self
    }
}

impl TranscriptionService for MockTranscriptionService {
    async fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> Result<TranscriptionResult, TranscribeError> {
        check_audio(audio_data, sample_rate)?;

        let duration_secs = audio_data.len() as f32 / sample_rate as f32;
        tracing::debug!(duration_secs, sample_rate, "Mock transcription generated");

        Ok(TranscriptionResult {
            text: "[mock transcription]".to_string(),
            language: "en".to_string(),
            duration_secs,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
