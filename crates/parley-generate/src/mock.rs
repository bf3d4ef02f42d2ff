//! Deterministic generator for dry runs.

use serde_json::json;

use crate::error::GenerateError;
use crate::{PipelineRequest, TextGenerator};

/// Mock generator that echoes the prompt with a dry-run marker.
///
/// For each requested sequence it returns
/// `"{prompt} [DRY RUN] {flags}(seq {i})"`, where `flags` lists the supplied
/// `sample`, `temp`, `top_k` and `top_p` values in that order, each followed
/// by a space. Output depends only on the inputs.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator;

impl MockGenerator {
    pub fn new() -> Self {
        Self
    }

    fn debug_flags(request: &PipelineRequest) -> String {
        let mut flags = String::new();
        if let Some(sample) = request.do_sample {
            flags.push_str(&format!("sample={} ", flag_bool(sample)));
        }
        if let Some(temp) = request.temperature {
            flags.push_str(&format!("temp={} ", flag_float(temp)));
        }
        if let Some(top_k) = request.top_k {
            flags.push_str(&format!("top_k={} ", top_k));
        }
        if let Some(top_p) = request.top_p {
            flags.push_str(&format!("top_p={} ", flag_float(top_p)));
        }
        flags
    }
}

fn flag_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Shortest round-trip float text with a signed two-digit exponent
/// (`1e-05`, `1.5e+16`) and at least one decimal otherwise.
fn flag_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    let repr = format!("{:?}", value);
    match repr.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => repr,
    }
}

impl TextGenerator for MockGenerator {
    fn generate(
        &self,
        prompt: &str,
        request: &PipelineRequest,
    ) -> Result<Vec<serde_json::Value>, GenerateError> {
        let n = request.num_return_sequences.unwrap_or(1).max(1);
        let flags = Self::debug_flags(request);

        tracing::debug!(sequences = n, "Mock generation");

        Ok((1..=n)
            .map(|i| {
                json!({
                    "generated_text": format!("{} [DRY RUN] {}(seq {})", prompt, flags, i)
                })
            })
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
