//! Parley command-line front end.
//!
//! The binary in `main.rs` parses arguments, sets up logging and hands off
//! to [`run`], which drives single-shot generation or the conversation loop
//! over injected input and output so both can be exercised in tests.

pub mod cli;
pub mod error;
pub mod repl;
pub mod single;

use std::io::{BufRead, Write};

use parley_core::config::ParleyConfig;
use parley_generate::{init_pipeline, BackendOptions};

pub use cli::{CliArgs, Command, ServeArgs};
pub use error::AppError;

/// Where a run reads input from and writes output to.
pub struct Console<R, W> {
    pub input: R,
    pub output: W,
    /// Whether `input` is an interactive terminal.
    pub interactive: bool,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W, interactive: bool) -> Self {
        Self {
            input,
            output,
            interactive,
        }
    }
}

/// Run single-shot generation or the conversation loop.
pub fn run<R: BufRead, W: Write>(
    args: &CliArgs,
    config: &ParleyConfig,
    console: &mut Console<R, W>,
) -> Result<(), AppError> {
    tracing::info!(dry_run = args.dry_run, repl = args.repl, "Starting generation");

    let prompt = if args.repl {
        None
    } else {
        Some(single::resolve_prompt(args, console)?)
    };

    let model = args.resolve_model(&config.generation);
    let device = args.resolve_device(&config.generation);
    let options = BackendOptions::from(&config.generation);

    let (generator, label) = init_pipeline(&model, &device, args.dry_run, &options).map_err(|e| {
        tracing::error!(
            error = %e,
            "Failed to initialize generation pipeline. Build with the `onnx` feature and install the model, or use --dry-run."
        );
        e
    })?;
    tracing::info!(model = %model, device = %label, "Pipeline ready");

    let params = args.resolve_parameters(&config.generation);

    match prompt {
        Some(prompt) => single::run_once(generator.as_ref(), &prompt, &params, console),
        None => repl::run_repl(args, config, generator.as_ref(), &params, console),
    }
}
