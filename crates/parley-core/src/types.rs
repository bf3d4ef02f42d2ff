use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Conversation
// =============================================================================

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Prefix used when rendering this role into a prompt.
    pub fn prompt_prefix(self) -> &'static str {
        match self {
            Role::User => "User: ",
            Role::Assistant => "AI: ",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// A single conversation entry. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

// =============================================================================
// Generation
// =============================================================================

pub const DEFAULT_MAX_NEW_TOKENS: usize = 120;
pub const DEFAULT_DO_SAMPLE: bool = true;
pub const DEFAULT_TEMPERATURE: f64 = 0.8;
pub const DEFAULT_TOP_K: usize = 0;
pub const DEFAULT_TOP_P: f64 = 0.92;
pub const DEFAULT_REPETITION_PENALTY: f64 = 1.15;
pub const DEFAULT_NUM_RETURN_SEQUENCES: usize = 1;

/// Caller-supplied generation parameters.
///
/// Every field is optional; unset fields take the documented defaults when
/// the parameters are normalized at the invocation boundary. Integer fields
/// are signed so that out-of-range input survives until normalization.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParameters {
    pub max_new_tokens: Option<i64>,
    pub do_sample: Option<bool>,
    pub temperature: Option<f64>,
    pub top_k: Option<i64>,
    pub top_p: Option<f64>,
    pub repetition_penalty: Option<f64>,
    pub num_return_sequences: Option<i64>,
}
