//! Next-token selection from raw logits.
//!
//! Applies the decoding controls in the usual order: repetition penalty,
//! temperature, top-k, top-p, then draws from the remaining distribution.
//! Greedy decoding skips everything after the repetition penalty.

use std::collections::HashSet;

use rand::Rng;

use crate::invoker::ResolvedParameters;

/// Decoding controls for a single sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub do_sample: bool,
    pub temperature: f32,
    /// 0 disables top-k filtering.
    pub top_k: usize,
    /// 1.0 disables nucleus filtering.
    pub top_p: f32,
    /// 1.0 disables the penalty.
    pub repetition_penalty: f32,
}

impl From<&ResolvedParameters> for SamplingConfig {
    fn from(params: &ResolvedParameters) -> Self {
        Self {
            do_sample: params.do_sample,
            temperature: params.temperature as f32,
            top_k: params.top_k,
            top_p: params.top_p as f32,
            repetition_penalty: params.repetition_penalty as f32,
        }
    }
}

/// Down-weight every token that already occurs in `seen`.
///
/// Positive logits are divided by the penalty and negative ones multiplied,
/// so the token always becomes less likely.
pub fn apply_repetition_penalty(logits: &mut [f32], seen: &[u32], penalty: f32) {
    if penalty == 1.0 {
        return;
    }
    let unique: HashSet<u32> = seen.iter().copied().collect();
    for id in unique {
        if let Some(logit) = logits.get_mut(id as usize) {
            if *logit > 0.0 {
                *logit /= penalty;
            } else {
                *logit *= penalty;
            }
        }
    }
}

/// Index of the largest logit. Ties resolve to the lowest index.
pub fn argmax(logits: &[f32]) -> u32 {
    let mut best = 0usize;
    for (i, &value) in logits.iter().enumerate() {
        if value > logits[best] {
            best = i;
        }
    }
    best as u32
}

/// Turn logits into the filtered, normalized candidate distribution.
///
/// Returns `(token, probability)` pairs sorted by descending probability.
pub fn candidate_distribution(logits: &[f32], config: &SamplingConfig) -> Vec<(u32, f32)> {
    let temperature = if config.temperature > 0.0 {
        config.temperature
    } else {
        1.0
    };

    let mut scored: Vec<(u32, f32)> = logits
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_finite())
        .map(|(i, &l)| (i as u32, l / temperature))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    if config.top_k > 0 && scored.len() > config.top_k {
        scored.truncate(config.top_k);
    }

    // Softmax, shifted by the max for stability.
    let max = scored.first().map(|(_, l)| *l).unwrap_or(0.0);
    let mut total = 0.0f32;
    for (_, l) in scored.iter_mut() {
        *l = (*l - max).exp();
        total += *l;
    }
    if total > 0.0 {
        for (_, p) in scored.iter_mut() {
            *p /= total;
        }
    }

    if config.top_p < 1.0 {
        let mut cumulative = 0.0f32;
        let mut keep = scored.len();
        for (i, (_, p)) in scored.iter().enumerate() {
            cumulative += *p;
            if cumulative >= config.top_p {
                keep = i + 1;
                break;
            }
        }
        scored.truncate(keep.max(1));
        let kept: f32 = scored.iter().map(|(_, p)| p).sum();
        if kept > 0.0 {
            for (_, p) in scored.iter_mut() {
                *p /= kept;
            }
        }
    }

    scored
}

/// Pick the next token id.
///
/// `history` holds every token already in the sequence (prompt included)
/// and feeds the repetition penalty.
pub fn select_token<R: Rng>(
    logits: &[f32],
    history: &[u32],
    config: &SamplingConfig,
    rng: &mut R,
) -> u32 {
    let mut logits = logits.to_vec();
    apply_repetition_penalty(&mut logits, history, config.repetition_penalty);

    if !config.do_sample {
        return argmax(&logits);
    }

    let distribution = candidate_distribution(&logits, config);
    let Some(&(fallback, _)) = distribution.first() else {
        return argmax(&logits);
    };

    let draw: f32 = rng.random();
    let mut cumulative = 0.0f32;
    for &(token, p) in &distribution {
        cumulative += p;
        if draw < cumulative {
            return token;
        }
    }
    fallback
}
