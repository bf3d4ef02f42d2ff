//! Interactive conversation loop.
//!
//! Reads `You: ` lines until `exit`, `quit` or end of input. Each line runs
//! one turn through the orchestrator, so the prompt carries the recent
//! history window and every completed turn is persisted.

use std::io::{BufRead, Write};
use std::sync::Arc;

use tracing::{error, info, warn};

use parley_chat::{ChatError, ChatOrchestrator, CommandSpeech, ConversationStore};
use parley_core::config::ParleyConfig;
use parley_core::types::GenerationParameters;
use parley_generate::TextGenerator;

use crate::cli::CliArgs;
use crate::error::AppError;
use crate::Console;

pub const BANNER: &str = "Entering REPL mode. Type 'exit' or Ctrl-C to quit.";

/// What a line of input asks the loop to do.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplInput<'a> {
    Skip,
    Exit,
    Message(&'a str),
}

pub fn classify(line: &str) -> ReplInput<'_> {
    let line = line.trim();
    if line.is_empty() {
        ReplInput::Skip
    } else if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        ReplInput::Exit
    } else {
        ReplInput::Message(line)
    }
}

/// Run the loop until the user exits or input ends.
pub fn run_repl<R: BufRead, W: Write>(
    args: &CliArgs,
    config: &ParleyConfig,
    generator: &dyn TextGenerator,
    params: &GenerationParameters,
    console: &mut Console<R, W>,
) -> Result<(), AppError> {
    let history_path = args.resolve_history_file(config);
    let store = Arc::new(ConversationStore::load(&history_path));
    let mut orchestrator =
        ChatOrchestrator::new(store, &config.conversation).with_history_path(&history_path);

    if args.resolve_tts(config) {
        match CommandSpeech::resolve(&config.speech.command) {
            Ok(speech) => orchestrator = orchestrator.with_speech(Arc::new(speech)),
            Err(e) => warn!(error = %e, "Speech synthesizer not available; TTS disabled"),
        }
    }

    writeln!(console.output, "{}", BANNER)?;

    loop {
        write!(console.output, "You: ")?;
        console.output.flush()?;

        let mut line = String::new();
        if console.input.read_line(&mut line)? == 0 {
            break;
        }

        let message = match classify(&line) {
            ReplInput::Skip => continue,
            ReplInput::Exit => break,
            ReplInput::Message(message) => message,
        };

        let mut printed = Ok(());
        let output = &mut console.output;
        let result = orchestrator.handle_turn_with(generator, message, params, |reply| {
            printed = writeln!(output, "AI: {}", reply);
        });
        printed?;

        match result {
            Ok(_) => {}
            Err(ChatError::Generation(e)) => {
                error!(error = %e, "Generation failed");
                writeln!(console.output, "Error: {}", e)?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        messages = orchestrator.store().len(),
        path = %history_path.display(),
        "Leaving REPL"
    );
    Ok(())
}
