//! Parley generation crate - pipeline construction and invocation.
//!
//! Provides a trait-based abstraction over text-generation backends, a
//! deterministic mock for dry runs, the pipeline factory that picks between
//! them, and the invoker that normalizes parameters and decodes backend
//! output defensively.
//!
//! The real backend runs a causal language model through ONNX Runtime and
//! is only compiled with the `onnx` feature.

pub mod device;
pub mod error;
pub mod factory;
pub mod invoker;
pub mod mock;
pub mod registry;
pub mod sampling;

#[cfg(feature = "onnx")]
pub mod onnx;

use std::sync::Arc;

pub use device::resolve_device;
pub use error::GenerateError;
pub use factory::{init_pipeline, BackendOptions};
pub use invoker::{generate, generate_candidates, Candidate, ResolvedParameters};
pub use mock::MockGenerator;
pub use registry::{PipelineKey, PipelineRegistry};

/// Pad token id passed to backends that do not know their own.
pub const FALLBACK_PAD_TOKEN_ID: u32 = 50256;

/// The full argument set handed to a generator for one call.
///
/// Decoding fields are optional because callers other than the invoker
/// may supply only a subset; the mock reports exactly the supplied ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineRequest {
    pub max_new_tokens: Option<usize>,
    pub do_sample: Option<bool>,
    pub temperature: Option<f64>,
    pub top_k: Option<usize>,
    pub top_p: Option<f64>,
    pub repetition_penalty: Option<f64>,
    pub num_return_sequences: Option<usize>,
    /// Truncate prompts that do not fit the model context.
    pub truncation: bool,
    /// Echo the prompt in front of the continuation.
    pub return_full_text: bool,
    pub pad_token_id: Option<u32>,
}

/// A text-generation backend.
///
/// Implementations return one record per candidate, in request order. A
/// well-formed record is an object with a `generated_text` string field;
/// callers must not assume that shape and decode through
/// [`Candidate::from_record`].
///
/// Calls are synchronous and may block for a long time on a real model.
pub trait TextGenerator: Send + Sync {
    /// Produce candidate records for `prompt`.
    fn generate(
        &self,
        prompt: &str,
        request: &PipelineRequest,
    ) -> Result<Vec<serde_json::Value>, GenerateError>;

    /// The backend's own pad token id, if it has one.
    fn pad_token_id(&self) -> Option<u32> {
        None
    }

    /// Short backend name for logging.
    fn name(&self) -> &str;
}

/// A generator shared between threads and requests.
pub type SharedGenerator = Arc<dyn TextGenerator>;
