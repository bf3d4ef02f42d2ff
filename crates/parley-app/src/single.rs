//! Single-shot generation: resolve one prompt, print the candidates.

use std::fs;
use std::io::{BufRead, Read, Write};

use parley_core::types::GenerationParameters;
use parley_generate::{generate, ResolvedParameters, TextGenerator};

use crate::cli::CliArgs;
use crate::error::AppError;
use crate::Console;

/// Find the prompt: --prompt, then --file, then piped stdin, then an
/// interactive `Prompt: ` line.
pub fn resolve_prompt<R: BufRead, W: Write>(
    args: &CliArgs,
    console: &mut Console<R, W>,
) -> Result<String, AppError> {
    if let Some(prompt) = args.prompt.as_ref().filter(|p| !p.trim().is_empty()) {
        return Ok(prompt.clone());
    }

    if let Some(ref path) = args.file {
        let contents = fs::read_to_string(path).map_err(|source| AppError::PromptFile {
            path: path.clone(),
            source,
        })?;
        let prompt = contents.trim();
        if !prompt.is_empty() {
            return Ok(prompt.to_string());
        }
    }

    let mut prompt = String::new();
    if console.interactive {
        write!(console.output, "Prompt: ")?;
        console.output.flush()?;
        console.input.read_line(&mut prompt)?;
    } else {
        console.input.read_to_string(&mut prompt)?;
    }

    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::NoPrompt);
    }
    Ok(prompt.to_string())
}

/// Generate for `prompt` and print the result after a `---` separator.
///
/// One requested sequence prints bare text; several print as numbered
/// `[i] text` blocks.
pub fn run_once<R, W: Write>(
    generator: &dyn TextGenerator,
    prompt: &str,
    params: &GenerationParameters,
    console: &mut Console<R, W>,
) -> Result<(), AppError> {
    let requested = ResolvedParameters::resolve(params).num_return_sequences;
    let outputs = generate(generator, prompt, params)?;

    let out = &mut console.output;
    writeln!(out, "\n---\n")?;
    if requested > 1 {
        for (i, text) in outputs.iter().enumerate() {
            writeln!(out, "[{}] {}\n", i + 1, text.trim())?;
        }
    } else {
        let text = outputs.first().map(|t| t.trim()).unwrap_or_default();
        writeln!(out, "{}", text)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use parley_generate::MockGenerator;
    use std::io::Cursor;

    fn args(list: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("parley").chain(list.iter().copied())).unwrap()
    }

    fn console(input: &str, interactive: bool) -> Console<Cursor<Vec<u8>>, Vec<u8>> {
        Console::new(Cursor::new(input.as_bytes().to_vec()), Vec::new(), interactive)
    }

    #[test]
    fn test_prompt_flag_wins() {
        let mut c = console("from stdin", false);
        let prompt = resolve_prompt(&args(&["-p", "from flag"]), &mut c).unwrap();
        assert_eq!(prompt, "from flag");
    }

    #[test]
    fn test_prompt_from_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        fs::write(&path, "  from file\n").unwrap();

        let mut c = console("from stdin", false);
        let prompt =
            resolve_prompt(&args(&["-f", path.to_str().unwrap()]), &mut c).unwrap();
        assert_eq!(prompt, "from file");
    }

    #[test]
    fn test_unreadable_file() {
        let mut c = console("", false);
        let result = resolve_prompt(&args(&["-f", "/nonexistent/prompt.txt"]), &mut c);
        assert!(matches!(result, Err(AppError::PromptFile { .. })));
    }

    #[test]
    fn test_piped_stdin() {
        let mut c = console("line one\nline two\n", false);
        let prompt = resolve_prompt(&args(&[]), &mut c).unwrap();
        assert_eq!(prompt, "line one\nline two");
        assert!(c.output.is_empty());
    }

    #[test]
    fn test_interactive_prompt_line() {
        let mut c = console("typed\nignored\n", true);
        let prompt = resolve_prompt(&args(&[]), &mut c).unwrap();
        assert_eq!(prompt, "typed");
        assert_eq!(String::from_utf8(c.output).unwrap(), "Prompt: ");
    }

    #[test]
    fn test_no_prompt() {
        let mut c = console("   \n", false);
        assert!(matches!(
            resolve_prompt(&args(&[]), &mut c),
            Err(AppError::NoPrompt)
        ));
    }

    #[test]
    fn test_run_once_single() {
        let mut c = console("", false);
        let params = GenerationParameters {
            do_sample: Some(true),
            ..GenerationParameters::default()
        };
        run_once(&MockGenerator::new(), "Hello", &params, &mut c).unwrap();
        let out = String::from_utf8(c.output).unwrap();
        assert!(out.starts_with("\n---\n\n"));
        assert!(out.ends_with("(seq 1)\n"));
        assert!(!out.contains("[1]"));
    }

    #[test]
    fn test_run_once_numbered_blocks() {
        let mut c = console("", false);
        let params = GenerationParameters {
            num_return_sequences: Some(3),
            ..GenerationParameters::default()
        };
        run_once(&MockGenerator::new(), "Hello", &params, &mut c).unwrap();
        let out = String::from_utf8(c.output).unwrap();
        for k in 1..=3 {
            assert!(out.contains(&format!("[{}] Hello [DRY RUN]", k)));
            assert!(out.contains(&format!("(seq {})\n\n", k)));
        }
    }
}
