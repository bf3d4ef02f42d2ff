//! Application state shared across all route handlers.
//!
//! AppState holds references to all services and shared resources.
//! It is passed to handlers via axum's State extractor.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use parley_chat::{ChatOrchestrator, ConversationStore};
use parley_core::config::ParleyConfig;
use parley_generate::{BackendOptions, PipelineRegistry};
use parley_transcribe::{DynTranscriptionService, TranscribeError, WhisperConfig, WhisperService};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed for the life of the server.
    pub config: Arc<ParleyConfig>,
    /// Runs chat turns against the shared conversation history.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Generation pipelines built so far.
    pub pipelines: Arc<PipelineRegistry>,
    /// Lazily loaded speech-to-text service.
    pub transcriber: Arc<TranscriberSlot>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create state around `store`, persisting it to `state_file` after
    /// every turn when one is given.
    pub fn new(config: ParleyConfig, store: Arc<ConversationStore>, state_file: Option<PathBuf>) -> Self {
        let mut orchestrator = ChatOrchestrator::new(store, &config.conversation);
        if let Some(path) = state_file {
            orchestrator = orchestrator.with_history_path(path);
        }
        let pipelines = PipelineRegistry::new(BackendOptions::from(&config.generation));
        let transcriber = TranscriberSlot::new(WhisperConfig::from(&config.transcription));

        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            pipelines: Arc::new(pipelines),
            transcriber: Arc::new(transcriber),
            start_time: Instant::now(),
        }
    }

    /// Replace the transcription service slot.
    pub fn with_transcriber(mut self, transcriber: TranscriberSlot) -> Self {
        self.transcriber = Arc::new(transcriber);
        self
    }
}

/// Holds the transcription service, loading the model on first use.
///
/// A missing model is reported on every request until the file appears,
/// so installing it does not require a restart.
pub struct TranscriberSlot {
    config: WhisperConfig,
    service: Mutex<Option<Arc<dyn DynTranscriptionService>>>,
}

impl TranscriberSlot {
    pub fn new(config: WhisperConfig) -> Self {
        Self {
            config,
            service: Mutex::new(None),
        }
    }

    /// A slot with an already constructed service.
    pub fn with_service(config: WhisperConfig, service: Arc<dyn DynTranscriptionService>) -> Self {
        Self {
            config,
            service: Mutex::new(Some(service)),
        }
    }

    pub fn model_path(&self) -> &str {
        &self.config.model_path
    }

    /// Return the service, loading the model if this is the first use.
    ///
    /// Blocks while the model loads; call from a blocking context.
    pub fn get_or_load(&self) -> Result<Arc<dyn DynTranscriptionService>, TranscribeError> {
        let mut slot = self.service.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(service) = slot.as_ref() {
            return Ok(Arc::clone(service));
        }

        let service: Arc<dyn DynTranscriptionService> =
            Arc::new(WhisperService::new(self.config.clone())?);
        *slot = Some(Arc::clone(&service));
        Ok(service)
    }
}
