//! Chat orchestrator: runs one conversational turn end to end.
//!
//! Used by both the interactive loop and the HTTP chat handler.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use parley_core::config::ConversationConfig;
use parley_core::types::{GenerationParameters, Message, Role};
use parley_generate::{generate, TextGenerator};

use crate::error::ChatError;
use crate::prompt::build_prompt;
use crate::speech::{SilentSpeech, SpeechOutput};
use crate::store::ConversationStore;

/// Composes the store, prompt builder, generator and speech output.
pub struct ChatOrchestrator {
    store: Arc<ConversationStore>,
    history_path: Option<PathBuf>,
    window_size: usize,
    max_kept: usize,
    speech: Arc<dyn SpeechOutput>,
}

impl ChatOrchestrator {
    /// Create an orchestrator that keeps history in memory only.
    pub fn new(store: Arc<ConversationStore>, config: &ConversationConfig) -> Self {
        Self {
            store,
            history_path: None,
            window_size: config.window_size,
            max_kept: config.max_kept,
            speech: Arc::new(SilentSpeech),
        }
    }

    /// Persist history to `path` after every completed turn.
    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = Some(path.into());
        self
    }

    /// Speak every reply through `speech`.
    pub fn with_speech(mut self, speech: Arc<dyn SpeechOutput>) -> Self {
        self.speech = speech;
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Handle one user message and return the assistant's reply.
    ///
    /// An empty message is rejected before the history is touched.
    /// Generation runs synchronously on the calling thread. Persistence and
    /// speech failures are logged and do not fail the turn.
    pub fn handle_turn(
        &self,
        generator: &dyn TextGenerator,
        message: &str,
        params: &GenerationParameters,
    ) -> Result<String, ChatError> {
        self.handle_turn_with(generator, message, params, |_| {})
    }

    /// Like [`handle_turn`](Self::handle_turn), calling `on_reply` with the
    /// reply once it is recorded and before it is spoken and persisted.
    pub fn handle_turn_with(
        &self,
        generator: &dyn TextGenerator,
        message: &str,
        params: &GenerationParameters,
        on_reply: impl FnOnce(&str),
    ) -> Result<String, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let window = self
            .store
            .append_and_window(Message::user(message), self.window_size);
        let prompt = build_prompt(&window, self.window_size);

        debug!(
            backend = generator.name(),
            window = window.len(),
            prompt_len = prompt.len(),
            "Generating reply"
        );

        let candidates = generate(generator, &prompt, params)?;
        let reply = candidates
            .into_iter()
            .next()
            .map(|text| text.trim().to_string())
            .unwrap_or_default();

        self.store.append(Role::Assistant, reply.clone());
        on_reply(&reply);

        if let Err(e) = self.speech.speak(&reply) {
            warn!(error = %e, "Failed to speak reply");
        }

        if let Some(path) = &self.history_path {
            match self.store.persist(path, self.max_kept) {
                Ok(kept) => debug!(path = %path.display(), kept, "History saved"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to save history"),
            }
        }

        info!(reply_len = reply.len(), history_len = self.store.len(), "Turn complete");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::SpeechError;
    use parley_generate::{GenerateError, MockGenerator, PipelineRequest};
    use std::sync::Mutex;

    struct FailingGenerator;

    impl TextGenerator for FailingGenerator {
        fn generate(
            &self,
            _prompt: &str,
            _request: &PipelineRequest,
        ) -> Result<Vec<serde_json::Value>, GenerateError> {
            Err(GenerateError::Inference("boom".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[derive(Default)]
    struct RecordingSpeech {
        spoken: Mutex<Vec<String>>,
    }

    impl SpeechOutput for RecordingSpeech {
        fn speak(&self, text: &str) -> Result<(), SpeechError> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct BrokenSpeech;

    impl SpeechOutput for BrokenSpeech {
        fn speak(&self, _text: &str) -> Result<(), SpeechError> {
            Err(SpeechError::Failed("exit status: 1".to_string()))
        }
    }

    fn orchestrator() -> ChatOrchestrator {
        ChatOrchestrator::new(
            Arc::new(ConversationStore::new()),
            &ConversationConfig::default(),
        )
    }

    fn sample_params() -> GenerationParameters {
        GenerationParameters {
            do_sample: Some(true),
            temperature: Some(0.8),
            num_return_sequences: Some(1),
            ..GenerationParameters::default()
        }
    }

    #[test]
    fn test_turn_with_mock_generator() {
        let orch = orchestrator();
        let reply = orch
            .handle_turn(&MockGenerator::new(), "Hi", &sample_params())
            .unwrap();

        assert_eq!(
            reply,
            "User: Hi\nAI: [DRY RUN] sample=True temp=0.8 top_k=0 top_p=0.92 (seq 1)"
        );
        let history = orch.store().snapshot();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], Message::user("Hi"));
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].text, reply);
    }

    #[test]
    fn test_empty_message_leaves_history_unchanged() {
        let orch = orchestrator();
        orch.store().append(Role::User, "earlier");

        for message in ["", "   \n"] {
            let result = orch.handle_turn(&MockGenerator::new(), message, &sample_params());
            assert!(matches!(result, Err(ChatError::EmptyMessage)));
        }
        assert_eq!(orch.store().len(), 1);
    }

    #[test]
    fn test_generation_failure_surfaces() {
        let orch = orchestrator();
        let result = orch.handle_turn(&FailingGenerator, "Hi", &sample_params());
        assert!(matches!(
            result,
            Err(ChatError::Generation(GenerateError::Inference(_)))
        ));
        // No reply was recorded.
        assert_eq!(orch.store().len(), 1);
    }

    #[test]
    fn test_prompt_uses_window() {
        let store = Arc::new(ConversationStore::new());
        for i in 0..10 {
            store.append(Role::User, format!("old{}", i));
        }
        let config = ConversationConfig {
            window_size: 2,
            ..ConversationConfig::default()
        };
        let orch = ChatOrchestrator::new(store, &config);

        let reply = orch
            .handle_turn(&MockGenerator::new(), "new", &GenerationParameters::default())
            .unwrap();
        assert!(reply.starts_with("User: old9\nUser: new\nAI: [DRY RUN]"));
    }

    #[test]
    fn test_turn_persists_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversation.json");
        let orch = orchestrator().with_history_path(&path);

        orch.handle_turn(&MockGenerator::new(), "Hi", &sample_params())
            .unwrap();

        let reloaded = ConversationStore::load(&path);
        assert_eq!(reloaded.snapshot(), orch.store().snapshot());
    }

    #[test]
    fn test_persist_failure_does_not_fail_turn() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let orch = orchestrator().with_history_path(blocker.join("history.json"));

        let result = orch.handle_turn(&MockGenerator::new(), "Hi", &sample_params());
        assert!(result.is_ok());
        assert_eq!(orch.store().len(), 2);
    }

    #[test]
    fn test_reply_is_spoken() {
        let speech = Arc::new(RecordingSpeech::default());
        let orch = orchestrator().with_speech(speech.clone());

        let reply = orch
            .handle_turn(&MockGenerator::new(), "Hi", &sample_params())
            .unwrap();
        assert_eq!(*speech.spoken.lock().unwrap(), vec![reply]);
    }

    #[test]
    fn test_on_reply_runs_before_speech() {
        let speech = Arc::new(RecordingSpeech::default());
        let orch = orchestrator().with_speech(speech.clone());

        let mut seen = None;
        orch.handle_turn_with(&MockGenerator::new(), "Hi", &sample_params(), |reply| {
            assert!(speech.spoken.lock().unwrap().is_empty());
            seen = Some(reply.to_string());
        })
        .unwrap();

        assert_eq!(seen.as_deref(), speech.spoken.lock().unwrap().first().map(String::as_str));
    }

    #[test]
    fn test_speech_failure_does_not_fail_turn() {
        let orch = orchestrator().with_speech(Arc::new(BrokenSpeech));
        assert!(orch
            .handle_turn(&MockGenerator::new(), "Hi", &sample_params())
            .is_ok());
    }
}
