//! Conversational layer for Parley.
//!
//! Owns the conversation history, renders bounded prompt windows, and
//! drives a single chat turn end to end: validate, append, generate,
//! persist and optionally speak the reply.

pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod speech;
pub mod store;

pub use error::ChatError;
pub use orchestrator::ChatOrchestrator;
pub use prompt::build_prompt;
pub use speech::{CommandSpeech, SilentSpeech, SpeechError, SpeechOutput};
pub use store::ConversationStore;
