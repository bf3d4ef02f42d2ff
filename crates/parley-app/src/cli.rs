//! CLI argument definitions for the Parley application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use parley_core::config::{GenerationConfig, ParleyConfig};
use parley_core::types::GenerationParameters;

/// Parley - chat with a local language model from the terminal or over HTTP.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Prompt text (read from stdin when omitted).
    #[arg(short = 'p', long = "prompt")]
    pub prompt: Option<String>,

    /// Read the prompt from a file.
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Model directory or name under the configured models directory.
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Device to run on: cpu, cuda, gpu, or a device index.
    #[arg(short = 'd', long = "device")]
    pub device: Option<String>,

    /// Number of returned sequences.
    #[arg(short = 'n', long = "num-return-sequences", allow_negative_numbers = true)]
    pub num_return_sequences: Option<i64>,

    /// Maximum number of new tokens to generate.
    #[arg(long = "max-new-tokens", allow_negative_numbers = true)]
    pub max_new_tokens: Option<i64>,

    /// Sampling temperature.
    #[arg(long = "temperature", allow_negative_numbers = true)]
    pub temperature: Option<f64>,

    /// Top-k sampling (0 disables).
    #[arg(long = "top-k", allow_negative_numbers = true)]
    pub top_k: Option<i64>,

    /// Top-p (nucleus) sampling.
    #[arg(long = "top-p", allow_negative_numbers = true)]
    pub top_p: Option<f64>,

    /// Repetition penalty.
    #[arg(long = "repetition-penalty", allow_negative_numbers = true)]
    pub repetition_penalty: Option<f64>,

    /// Disable sampling and decode greedily.
    #[arg(long = "no-sample")]
    pub no_sample: bool,

    /// Use the deterministic mock instead of a real model.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Enter the interactive conversation loop.
    #[arg(long = "repl")]
    pub repl: bool,

    /// Speak replies in the conversation loop.
    #[arg(long = "tts")]
    pub tts: bool,

    /// File that persists the conversation loop's history.
    #[arg(long = "history-file")]
    pub history_file: Option<PathBuf>,

    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP chat server.
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on.
    #[arg(long = "port")]
    pub port: Option<u16>,

    /// Address to bind.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// File that persists the server's conversation history.
    #[arg(long = "state-file")]
    pub state_file: Option<PathBuf>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PARLEY_CONFIG env var > ~/.parley/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PARLEY_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log filter directive.
    ///
    /// Priority: --log-level flag > RUST_LOG > config file value. Returns
    /// `None` when RUST_LOG should be used.
    pub fn resolve_log_level(&self, config: &ParleyConfig) -> Option<String> {
        if let Some(ref level) = self.log_level {
            return Some(level.clone());
        }
        if std::env::var("RUST_LOG").is_ok() {
            return None;
        }
        Some(config.general.log_level.clone())
    }

    pub fn resolve_model(&self, config: &GenerationConfig) -> String {
        self.model.clone().unwrap_or_else(|| config.model.clone())
    }

    pub fn resolve_device(&self, config: &GenerationConfig) -> String {
        self.device.clone().unwrap_or_else(|| config.device.clone())
    }

    /// Generation parameters: flags over configured defaults.
    pub fn resolve_parameters(&self, config: &GenerationConfig) -> GenerationParameters {
        let base = config.parameters();
        GenerationParameters {
            max_new_tokens: self.max_new_tokens.or(base.max_new_tokens),
            do_sample: if self.no_sample {
                Some(false)
            } else {
                base.do_sample
            },
            temperature: self.temperature.or(base.temperature),
            top_k: self.top_k.or(base.top_k),
            top_p: self.top_p.or(base.top_p),
            repetition_penalty: self.repetition_penalty.or(base.repetition_penalty),
            num_return_sequences: self.num_return_sequences.or(base.num_return_sequences),
        }
    }

    /// Priority: --history-file flag > config file value.
    pub fn resolve_history_file(&self, config: &ParleyConfig) -> PathBuf {
        self.history_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.conversation.history_file))
    }

    /// Whether replies should be spoken: --tts flag or `[speech] enabled`.
    pub fn resolve_tts(&self, config: &ParleyConfig) -> bool {
        self.tts || config.speech.enabled
    }
}

impl ServeArgs {
    /// Write the serve flags into `config` so the server sees one source.
    pub fn apply_to(&self, config: &mut ParleyConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
    }

    /// Priority: --state-file flag > config file value.
    pub fn resolve_state_file(&self, config: &ParleyConfig) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.conversation.state_file))
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".parley").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".parley").join("config.toml");
    }
    PathBuf::from("config.toml")
}
