use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::types::{
    GenerationParameters, DEFAULT_DO_SAMPLE, DEFAULT_MAX_NEW_TOKENS, DEFAULT_NUM_RETURN_SEQUENCES,
    DEFAULT_REPETITION_PENALTY, DEFAULT_TEMPERATURE, DEFAULT_TOP_K, DEFAULT_TOP_P,
};

/// Top-level configuration for Parley.
///
/// Loaded from `~/.parley/config.toml` by default. Every section is
/// optional; missing sections and fields fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParleyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Apply environment overrides that take precedence over the file.
    ///
    /// `WHISPER_MODEL_PATH` wins over the legacy `VOSK_MODEL_PATH`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for key in ["WHISPER_MODEL_PATH", "VOSK_MODEL_PATH"] {
            if let Some(path) = lookup(key).filter(|p| !p.trim().is_empty()) {
                info!(key, path = %path, "Transcription model path overridden from environment");
                self.transcription.model_path = path;
                break;
            }
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Generation backend and default decoding parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model identifier: a directory path or a name under `models_dir`.
    pub model: String,
    /// Device selector: "cpu", "cuda", "gpu", or a device index.
    pub device: String,
    /// Directory that model names are resolved against.
    pub models_dir: String,
    /// Sampler seed for the real backend.
    pub seed: u64,
    /// Context length of the model; prompts are truncated to fit.
    pub max_context_tokens: usize,
    pub max_new_tokens: usize,
    pub do_sample: bool,
    pub temperature: f64,
    pub top_k: usize,
    pub top_p: f64,
    pub repetition_penalty: f64,
    pub num_return_sequences: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "distilgpt2".to_string(),
            device: "cpu".to_string(),
            models_dir: "models".to_string(),
            seed: 42,
            max_context_tokens: 1024,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            do_sample: DEFAULT_DO_SAMPLE,
            temperature: DEFAULT_TEMPERATURE,
            top_k: DEFAULT_TOP_K,
            top_p: DEFAULT_TOP_P,
            repetition_penalty: DEFAULT_REPETITION_PENALTY,
            num_return_sequences: DEFAULT_NUM_RETURN_SEQUENCES,
        }
    }
}

impl GenerationConfig {
    /// The configured defaults as a fully-populated parameter set.
    pub fn parameters(&self) -> GenerationParameters {
        GenerationParameters {
            max_new_tokens: Some(self.max_new_tokens as i64),
            do_sample: Some(self.do_sample),
            temperature: Some(self.temperature),
            top_k: Some(self.top_k as i64),
            top_p: Some(self.top_p),
            repetition_penalty: Some(self.repetition_penalty),
            num_return_sequences: Some(self.num_return_sequences as i64),
        }
    }
}

/// Conversation history policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Number of most recent messages rendered into a prompt.
    pub window_size: usize,
    /// Number of most recent messages kept in the persisted file.
    pub max_kept: usize,
    /// History file used by the REPL.
    pub history_file: String,
    /// History file used by the HTTP server.
    pub state_file: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            window_size: 6,
            max_kept: 100,
            history_file: "conversation.json".to_string(),
            state_file: "chat_state.json".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Whether chat requests without a `dry_run` field use the mock backend.
    pub dry_run_default: bool,
    /// Maximum accepted request body, mostly relevant for audio uploads.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            dry_run_default: true,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Speech-to-text settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Path to the GGML whisper model file.
    pub model_path: String,
    /// Language code for transcription (e.g., "en", "auto").
    pub language: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model_path: "models/ggml-base.en.bin".to_string(),
            language: "en".to_string(),
        }
    }
}

/// Spoken reply settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    /// External synthesizer program; the reply is passed as its last argument.
    pub command: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: "espeak".to_string(),
        }
    }
}
