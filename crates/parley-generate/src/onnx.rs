//! ONNX Runtime text-generation backend.
//!
//! Loads a causal language model exported to ONNX (e.g. distilgpt2) via ort
//! and tokenizes with the HuggingFace tokenizers crate. The model must take
//! `input_ids` and `attention_mask` as i64 `[batch, seq]` inputs and produce
//! `logits` of shape `[batch, seq, vocab]` as its first output.
//!
//! Decoding runs the full sequence through the model once per new token;
//! there is no key/value cache.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::TensorRef;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use tokenizers::{PaddingParams, Tokenizer};
use tracing::{debug, info, warn};

use crate::error::GenerateError;
use crate::factory::BackendOptions;
use crate::invoker::ResolvedParameters;
use crate::sampling::{select_token, SamplingConfig};
use crate::{PipelineRequest, TextGenerator};

/// Tokens tried, in order, when looking for an end-of-sequence marker.
const EOS_CANDIDATES: [&str; 4] = ["<|endoftext|>", "</s>", "<eos>", "<|end_of_text|>"];

/// ONNX Runtime-backed causal language model.
///
/// Expects a model directory containing:
/// - `model.onnx`: the causal LM export
/// - `tokenizer.json`: the HuggingFace fast-tokenizer file
pub struct OnnxGenerator {
    model_id: String,
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    eos_token_id: Option<u32>,
    pad_token_id: Option<u32>,
    rng: Mutex<StdRng>,
    max_context_tokens: usize,
}

impl std::fmt::Debug for OnnxGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxGenerator")
            .field("model_id", &self.model_id)
            .field("eos_token_id", &self.eos_token_id)
            .field("pad_token_id", &self.pad_token_id)
            .finish()
    }
}

impl OnnxGenerator {
    /// Load a model from the given directory.
    ///
    /// The directory must contain `model.onnx` and `tokenizer.json`. A
    /// non-negative `device_index` selects a CUDA device when the `cuda`
    /// feature is enabled and is otherwise ignored with a warning.
    pub fn from_directory(
        model_id: &str,
        model_dir: &Path,
        device_index: i32,
        options: &BackendOptions,
    ) -> Result<Self, GenerateError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(GenerateError::ModelLoad(format!(
                "ONNX model not found at {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(GenerateError::ModelLoad(format!(
                "Tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }

        let builder = Session::builder()
            .map_err(|e| GenerateError::ModelLoad(format!("ONNX session builder: {}", e)))?;
        let builder = with_device(builder, device_index)?;
        let session = builder
            .commit_from_file(&model_path)
            .map_err(|e| GenerateError::ModelLoad(format!("ONNX load model: {}", e)))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| GenerateError::ModelLoad(format!("Failed to load tokenizer: {}", e)))?;

        let eos_token_id = find_eos_token(&tokenizer);
        let pad_token_id = ensure_pad_token(&mut tokenizer, eos_token_id);

        // Seeding cannot fail for StdRng; the log line keeps runs traceable.
        let rng = StdRng::seed_from_u64(options.seed);
        debug!(seed = options.seed, "Sampler seeded");

        info!(
            model = %model_path.display(),
            device_index,
            eos_token_id = ?eos_token_id,
            pad_token_id = ?pad_token_id,
            "Loaded ONNX generation model"
        );

        Ok(Self {
            model_id: model_id.to_string(),
            session: Mutex::new(session),
            tokenizer,
            eos_token_id,
            pad_token_id,
            rng: Mutex::new(rng),
            max_context_tokens: options.max_context_tokens.max(1),
        })
    }

    /// Logits for the token following `ids`.
    fn next_token_logits(&self, ids: &[i64]) -> Result<Vec<f32>, GenerateError> {
        let seq_len = ids.len();
        let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), ids.to_vec())
            .map_err(|e| GenerateError::Inference(format!("input_ids array: {}", e)))?;
        let mask_array = ndarray::Array2::from_elem((1, seq_len), 1i64);

        let ids_ref = TensorRef::from_array_view(&ids_array)
            .map_err(|e| GenerateError::Inference(format!("TensorRef input_ids: {}", e)))?;
        let mask_ref = TensorRef::from_array_view(&mask_array)
            .map_err(|e| GenerateError::Inference(format!("TensorRef attention_mask: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| GenerateError::Inference(format!("Session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref])
            .map_err(|e| GenerateError::Inference(format!("ONNX inference failed: {}", e)))?;

        // [1, seq_len, vocab] as a flat slice.
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| GenerateError::Inference(format!("Extract logits: {}", e)))?;

        let dims: Vec<i64> = shape.iter().copied().collect();
        let vocab = match dims.as_slice() {
            [_, _, vocab] if *vocab > 0 => *vocab as usize,
            other => {
                return Err(GenerateError::Inference(format!(
                    "Unexpected logits shape: {:?}",
                    other
                )))
            }
        };

        let start = (seq_len - 1) * vocab;
        data.get(start..start + vocab)
            .map(|row| row.to_vec())
            .ok_or_else(|| GenerateError::Inference("Logits shorter than expected".to_string()))
    }

    /// Generate one continuation of `prompt_ids`.
    fn generate_sequence(
        &self,
        prompt_ids: &[u32],
        max_new_tokens: usize,
        sampling: &SamplingConfig,
    ) -> Result<Vec<u32>, GenerateError> {
        let mut sequence: Vec<u32> = prompt_ids.to_vec();
        let mut generated = Vec::with_capacity(max_new_tokens);

        for _ in 0..max_new_tokens {
            // Slide the window once the sequence outgrows the model context.
            let start = sequence.len().saturating_sub(self.max_context_tokens);
            let window: Vec<i64> = sequence[start..].iter().map(|&id| id as i64).collect();
            let logits = self.next_token_logits(&window)?;

            let token = {
                let mut rng = self
                    .rng
                    .lock()
                    .map_err(|e| GenerateError::Inference(format!("Rng lock poisoned: {}", e)))?;
                select_token(&logits, &sequence, sampling, &mut *rng)
            };

            if Some(token) == self.eos_token_id {
                break;
            }
            sequence.push(token);
            generated.push(token);
        }

        Ok(generated)
    }
}

impl TextGenerator for OnnxGenerator {
    fn generate(
        &self,
        prompt: &str,
        request: &PipelineRequest,
    ) -> Result<Vec<serde_json::Value>, GenerateError> {
        let defaults = ResolvedParameters::default();
        let params = ResolvedParameters {
            max_new_tokens: request.max_new_tokens.unwrap_or(defaults.max_new_tokens),
            do_sample: request.do_sample.unwrap_or(defaults.do_sample),
            temperature: request.temperature.unwrap_or(defaults.temperature),
            top_k: request.top_k.unwrap_or(defaults.top_k),
            top_p: request.top_p.unwrap_or(defaults.top_p),
            repetition_penalty: request
                .repetition_penalty
                .unwrap_or(defaults.repetition_penalty),
            num_return_sequences: request
                .num_return_sequences
                .unwrap_or(defaults.num_return_sequences)
                .max(1),
        };
        let sampling = SamplingConfig::from(&params);

        let encoding = self
            .tokenizer
            .encode(prompt, false)
            .map_err(|e| GenerateError::Inference(format!("Tokenization failed: {}", e)))?;
        let mut prompt_ids: Vec<u32> = encoding.get_ids().to_vec();

        let budget = self
            .max_context_tokens
            .saturating_sub(params.max_new_tokens)
            .max(1);
        if request.truncation && prompt_ids.len() > budget {
            debug!(
                prompt_tokens = prompt_ids.len(),
                kept = budget,
                "Truncating prompt to fit model context"
            );
            prompt_ids.drain(..prompt_ids.len() - budget);
        }
        if prompt_ids.is_empty() {
            // An empty context has no position to predict from.
            if let Some(seed_token) = self.eos_token_id.or(request.pad_token_id) {
                prompt_ids.push(seed_token);
            } else {
                return Err(GenerateError::Inference(
                    "Prompt produced no tokens".to_string(),
                ));
            }
        }

        let mut records = Vec::with_capacity(params.num_return_sequences);
        for _ in 0..params.num_return_sequences {
            let new_ids = self.generate_sequence(&prompt_ids, params.max_new_tokens, &sampling)?;
            let continuation = self
                .tokenizer
                .decode(&new_ids, true)
                .map_err(|e| GenerateError::Inference(format!("Decoding failed: {}", e)))?;
            let text = if request.return_full_text {
                format!("{}{}", prompt, continuation)
            } else {
                continuation
            };
            records.push(json!({ "generated_text": text }));
        }

        Ok(records)
    }

    fn pad_token_id(&self) -> Option<u32> {
        self.pad_token_id
    }

    fn name(&self) -> &str {
        &self.model_id
    }
}

#[cfg(feature = "cuda")]
fn with_device(
    builder: ort::session::builder::SessionBuilder,
    device_index: i32,
) -> Result<ort::session::builder::SessionBuilder, GenerateError> {
    use ort::execution_providers::CUDAExecutionProvider;

    if device_index < 0 {
        return Ok(builder);
    }
    builder
        .with_execution_providers([CUDAExecutionProvider::default()
            .with_device_id(device_index)
            .build()])
        .map_err(|e| GenerateError::ModelLoad(format!("CUDA execution provider: {}", e)))
}

#[cfg(not(feature = "cuda"))]
fn with_device(
    builder: ort::session::builder::SessionBuilder,
    device_index: i32,
) -> Result<ort::session::builder::SessionBuilder, GenerateError> {
    if device_index >= 0 {
        warn!(
            device_index,
            "Built without the `cuda` feature; running on CPU"
        );
    }
    Ok(builder)
}

/// Find the tokenizer's end-of-sequence token id.
fn find_eos_token(tokenizer: &Tokenizer) -> Option<u32> {
    EOS_CANDIDATES
        .iter()
        .find_map(|token| tokenizer.token_to_id(token))
}

/// Make sure the tokenizer pads with a real token.
///
/// Keeps an existing padding configuration; otherwise pads with the
/// end-of-sequence token. Returns the pad id in use, if any.
fn ensure_pad_token(tokenizer: &mut Tokenizer, eos_token_id: Option<u32>) -> Option<u32> {
    if let Some(padding) = tokenizer.get_padding() {
        return Some(padding.pad_id);
    }

    let Some(eos_id) = eos_token_id else {
        warn!("Tokenizer has neither a pad nor an end-of-sequence token");
        return None;
    };
    let pad_token = tokenizer
        .id_to_token(eos_id)
        .unwrap_or_else(|| EOS_CANDIDATES[0].to_string());

    tokenizer.with_padding(Some(PaddingParams {
        pad_id: eos_id,
        pad_token,
        ..PaddingParams::default()
    }));
    debug!(pad_id = eos_id, "Tokenizer pad token set to end-of-sequence token");
    Some(eos_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_onnx_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let result = OnnxGenerator::from_directory(
            "missing",
            dir.path(),
            -1,
            &BackendOptions::default(),
        );
        assert!(matches!(result, Err(GenerateError::ModelLoad(_))));
    }

    #[test]
    fn test_onnx_missing_tokenizer() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.onnx"), b"not a model").unwrap();
        let result = OnnxGenerator::from_directory(
            "broken",
            dir.path(),
            -1,
            &BackendOptions::default(),
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Tokenizer not found"));
    }
}
