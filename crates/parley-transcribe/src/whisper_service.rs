//! whisper.cpp transcription through `whisper-rs`.
//!
//! The model path is checked whether or not the `whisper` feature is
//! compiled in, so a missing model is reported the same way everywhere.
//! Without the feature every transcription reports the backend as
//! unavailable.

use std::path::Path;

use tracing::{debug, info};

use crate::{
    check_audio, TranscribeError, TranscriptionResult, TranscriptionService, WhisperConfig,
};

/// Sample rate whisper.cpp models are trained on.
const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Transcription service holding one loaded whisper.cpp model.
pub struct WhisperService {
    engine: engine::Engine,
    config: WhisperConfig,
}

impl WhisperService {
    /// Load the GGML model named by `config.model_path`.
    pub fn new(config: WhisperConfig) -> Result<Self, TranscribeError> {
        if !Path::new(&config.model_path).exists() {
            return Err(TranscribeError::ModelNotFound(config.model_path.clone()));
        }
        let engine = engine::Engine::load(&config.model_path)?;
        info!(model = %config.model_path, language = %config.language, "Transcription model ready");
        Ok(Self { engine, config })
    }

    /// `None` asks the model to detect the language.
    fn language(&self) -> Option<&str> {
        match self.config.language.trim() {
            "" | "auto" => None,
            lang => Some(lang),
        }
    }
}

impl TranscriptionService for WhisperService {
    async fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> Result<TranscriptionResult, TranscribeError> {
        check_audio(audio_data, sample_rate)?;

        let samples = resample(audio_data, sample_rate, WHISPER_SAMPLE_RATE);
        let duration_secs = samples.len() as f32 / WHISPER_SAMPLE_RATE as f32;
        debug!(samples = samples.len(), duration_secs, "Running transcription");

        let language = self.language();
        let text = self.engine.run(&samples, language)?;

        info!(text_len = text.len(), duration_secs, "Transcription complete");
        Ok(TranscriptionResult {
            text,
            language: language.unwrap_or("auto").to_string(),
            duration_secs,
        })
    }
}

#[cfg(feature = "whisper")]
mod engine {
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    use crate::TranscribeError;

    pub(super) struct Engine {
        ctx: WhisperContext,
    }

    fn backend_err(what: &str, e: impl std::fmt::Display) -> TranscribeError {
        TranscribeError::Backend(format!("{}: {}", what, e))
    }

    impl Engine {
        pub(super) fn load(model_path: &str) -> Result<Self, TranscribeError> {
            let params = WhisperContextParameters::default();
            let ctx = WhisperContext::new_with_params(model_path, params)
                .map_err(|e| backend_err("failed to load model", e))?;
            Ok(Self { ctx })
        }

        /// Transcribe 16 kHz mono samples, returning the non-empty segment
        /// texts joined by spaces.
        pub(super) fn run(
            &self,
            samples: &[f32],
            language: Option<&str>,
        ) -> Result<String, TranscribeError> {
            let mut state = self
                .ctx
                .create_state()
                .map_err(|e| backend_err("failed to create state", e))?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            params.set_language(language);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);

            state
                .full(params, samples)
                .map_err(|e| backend_err("inference failed", e))?;

            let count = state
                .full_n_segments()
                .map_err(|e| backend_err("failed to count segments", e))?;

            let mut parts = Vec::new();
            for i in 0..count {
                let text = state
                    .full_get_segment_text(i)
                    .map_err(|e| backend_err("failed to read segment", e))?;
                let text = text.trim();
                if !text.is_empty() {
                    parts.push(text.to_string());
                }
            }
            Ok(parts.join(" "))
        }
    }
}

#[cfg(not(feature = "whisper"))]
mod engine {
    use crate::TranscribeError;

    pub(super) struct Engine;

    impl Engine {
        pub(super) fn load(_model_path: &str) -> Result<Self, TranscribeError> {
            tracing::warn!("Built without the `whisper` feature; transcription requests will fail");
            Ok(Self)
        }

        pub(super) fn run(
            &self,
            _samples: &[f32],
            _language: Option<&str>,
        ) -> Result<String, TranscribeError> {
            Err(TranscribeError::BackendUnavailable(
                "rebuild with the `whisper` feature to transcribe audio".to_string(),
            ))
        }
    }
}

/// Linear interpolation between neighbouring samples.
fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }

    let step = from_rate as f64 / to_rate as f64;
    let last = input.len() - 1;
    let len = (input.len() as f64 / step).ceil() as usize;

    (0..len)
        .map(|i| {
            let pos = i as f64 * step;
            let lo = (pos as usize).min(last);
            let hi = (lo + 1).min(last);
            let t = (pos - lo as f64) as f32;
            input[lo] + (input[hi] - input[lo]) * t
        })
        .collect()
}
