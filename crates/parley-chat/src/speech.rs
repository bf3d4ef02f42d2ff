//! Spoken output for assistant replies.
//!
//! Speech is best effort: callers log a [`SpeechError`] and carry on.

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

/// Errors from a speech synthesizer.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech synthesizer not found: {0}")]
    NotFound(String),
    #[error("speech synthesizer failed to start: {0}")]
    Io(#[from] std::io::Error),
    #[error("speech synthesizer exited with {0}")]
    Failed(String),
}

/// Something that can say a reply out loud.
pub trait SpeechOutput: Send + Sync {
    fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

/// Speech output that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSpeech;

impl SpeechOutput for SilentSpeech {
    fn speak(&self, _text: &str) -> Result<(), SpeechError> {
        Ok(())
    }
}

/// Speaks through an external program such as `espeak` or `say`, passing
/// the text as its final argument.
#[derive(Debug, Clone)]
pub struct CommandSpeech {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandSpeech {
    /// Resolve `command` once at startup.
    ///
    /// `command` may carry leading arguments (`"espeak -s 150"`). The program
    /// is looked up on `PATH` unless it already contains a path separator.
    pub fn resolve(command: &str) -> Result<Self, SpeechError> {
        let mut parts = command.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| SpeechError::NotFound("empty speech command".to_string()))?;
        let program =
            find_program(name).ok_or_else(|| SpeechError::NotFound(name.to_string()))?;
        debug!(program = %program.display(), "Speech synthesizer resolved");
        Ok(Self {
            program,
            args: parts.map(str::to_string).collect(),
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl SpeechOutput for CommandSpeech {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(SpeechError::Failed(status.to_string()))
        }
    }
}

fn find_program(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_speech_is_ok() {
        assert!(SilentSpeech.speak("hello").is_ok());
    }

    #[test]
    fn test_resolve_unknown_program() {
        let result = CommandSpeech::resolve("parley-no-such-synthesizer-xyz");
        assert!(matches!(result, Err(SpeechError::NotFound(_))));
    }

    #[test]
    fn test_resolve_empty_command() {
        assert!(matches!(
            CommandSpeech::resolve("   "),
            Err(SpeechError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_speech_success() {
        let speech = CommandSpeech::resolve("true").unwrap();
        assert!(speech.program().ends_with("true"));
        assert!(speech.speak("hello world").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_speech_failure_status() {
        let speech = CommandSpeech::resolve("false").unwrap();
        assert!(matches!(speech.speak("hi"), Err(SpeechError::Failed(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_keeps_leading_arguments() {
        let speech = CommandSpeech::resolve("true -s 150").unwrap();
        assert_eq!(speech.args, vec!["-s", "150"]);
    }
}
