//! Parameter normalization, pipeline invocation, and output decoding.

use serde_json::Value;
use tracing::{debug, warn};

use parley_core::types::{
    GenerationParameters, DEFAULT_DO_SAMPLE, DEFAULT_MAX_NEW_TOKENS,
    DEFAULT_NUM_RETURN_SEQUENCES, DEFAULT_REPETITION_PENALTY, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_K, DEFAULT_TOP_P,
};

use crate::error::GenerateError;
use crate::{PipelineRequest, TextGenerator, FALLBACK_PAD_TOKEN_ID};

// =============================================================================
// Normalization
// =============================================================================

/// Generation parameters with every default applied and every range enforced.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParameters {
    pub max_new_tokens: usize,
    pub do_sample: bool,
    pub temperature: f64,
    pub top_k: usize,
    pub top_p: f64,
    pub repetition_penalty: f64,
    pub num_return_sequences: usize,
}

impl Default for ResolvedParameters {
    fn default() -> Self {
        Self {
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

impl ResolvedParameters {
    /// Apply defaults to unset fields and pull out-of-range values back in.
    pub fn resolve(params: &GenerationParameters) -> Self {
        let max_new_tokens = match params.max_new_tokens {
            None => DEFAULT_MAX_NEW_TOKENS,
            Some(n) if n < 1 => {
                debug!(value = n, "max_new_tokens below 1, using 1");
                1
            }
            Some(n) => n as usize,
        };

        let temperature = match params.temperature {
            None => DEFAULT_TEMPERATURE,
            Some(t) if !t.is_finite() || t <= 0.0 => {
                debug!(value = t, "temperature must be positive, using default");
                DEFAULT_TEMPERATURE
            }
            Some(t) => t,
        };

        let top_k = match params.top_k {
            None => DEFAULT_TOP_K,
            Some(k) if k < 0 => {
                debug!(value = k, "negative top_k, disabling");
                0
            }
            Some(k) => k as usize,
        };

        let top_p = match params.top_p {
            None => DEFAULT_TOP_P,
            Some(p) if !p.is_finite() || p <= 0.0 || p > 1.0 => {
                debug!(value = p, "top_p outside (0, 1], using default");
                DEFAULT_TOP_P
            }
            Some(p) => p,
        };

        let repetition_penalty = match params.repetition_penalty {
            None => DEFAULT_REPETITION_PENALTY,
            Some(r) if !r.is_finite() || r < 1.0 => {
                debug!(value = r, "repetition_penalty below 1, disabling");
                1.0
            }
            Some(r) => r,
        };

        let num_return_sequences = match params.num_return_sequences {
            None => DEFAULT_NUM_RETURN_SEQUENCES,
            Some(n) if n < 1 => {
                debug!(value = n, "num_return_sequences below 1, using 1");
                1
            }
            Some(n) => n as usize,
        };

        Self {
            max_new_tokens,
            do_sample: params.do_sample.unwrap_or(DEFAULT_DO_SAMPLE),
            temperature,
            top_k,
            top_p,
            repetition_penalty,
            num_return_sequences,
        }
    }

    /// Build the full pipeline request: continuation only, truncated prompt.
    pub fn to_request(&self, pad_token_id: u32) -> PipelineRequest {
        PipelineRequest {
            max_new_tokens: Some(self.max_new_tokens),
            do_sample: Some(self.do_sample),
            temperature: Some(self.temperature),
            top_k: Some(self.top_k),
            top_p: Some(self.top_p),
            repetition_penalty: Some(self.repetition_penalty),
            num_return_sequences: Some(self.num_return_sequences),
            truncation: true,
            return_full_text: false,
            pad_token_id: Some(pad_token_id),
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// One decoded backend candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// A well-formed record's `generated_text`.
    Generated(String),
    /// The string form of a record that did not have the expected shape.
    RawFallback(String),
}

impl Candidate {
    /// Decode a backend record. Never fails.
    pub fn from_record(record: &Value) -> Self {
        match record.get("generated_text").and_then(Value::as_str) {
            Some(text) => Candidate::Generated(text.to_string()),
            None => match record {
                Value::String(s) => Candidate::RawFallback(s.clone()),
                other => Candidate::RawFallback(other.to_string()),
            },
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Candidate::Generated(text) | Candidate::RawFallback(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Candidate::Generated(text) | Candidate::RawFallback(text) => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Candidate::RawFallback(_))
    }
}

// =============================================================================
// Invocation
// =============================================================================

/// Call `generator` with normalized parameters and decode each candidate.
pub fn generate_candidates(
    generator: &dyn TextGenerator,
    prompt: &str,
    params: &GenerationParameters,
) -> Result<Vec<Candidate>, GenerateError> {
    let resolved = ResolvedParameters::resolve(params);
    let pad_token_id = generator.pad_token_id().unwrap_or(FALLBACK_PAD_TOKEN_ID);
    let request = resolved.to_request(pad_token_id);

    debug!(
        backend = generator.name(),
        prompt_len = prompt.len(),
        sequences = resolved.num_return_sequences,
        "Invoking generation pipeline"
    );

    let records = generator.generate(prompt, &request)?;

    if records.len() != resolved.num_return_sequences {
        debug!(
            requested = resolved.num_return_sequences,
            returned = records.len(),
            "Backend returned a different number of sequences"
        );
    }

    Ok(records
        .iter()
        .map(|record| {
            let candidate = Candidate::from_record(record);
            if candidate.is_fallback() {
                warn!(
                    backend = generator.name(),
                    "Unexpected generation record shape, using its string form"
                );
            }
            candidate
        })
        .collect())
}

/// Call `generator` and return the candidate texts in backend order.
pub fn generate(
    generator: &dyn TextGenerator,
    prompt: &str,
    params: &GenerationParameters,
) -> Result<Vec<String>, GenerateError> {
    Ok(generate_candidates(generator, prompt, params)?
        .into_iter()
        .map(Candidate::into_text)
        .collect())
}
