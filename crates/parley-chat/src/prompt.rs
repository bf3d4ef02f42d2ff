//! Prompt rendering from a bounded conversation window.

use parley_core::types::Message;

/// Cue appended after the rendered window so the model answers as the AI.
pub const ASSISTANT_CUE: &str = "\nAI:";

/// Render the last `window_size` messages of `history` into a prompt.
///
/// Each message becomes one `User: ...` or `AI: ...` line; the lines are
/// joined with `\n` and followed by [`ASSISTANT_CUE`]. An empty window
/// renders as the bare cue.
pub fn build_prompt(history: &[Message], window_size: usize) -> String {
    let start = history.len().saturating_sub(window_size);
    let mut prompt = history[start..]
        .iter()
        .map(|m| format!("{}{}", m.role.prompt_prefix(), m.text))
        .collect::<Vec<_>>()
        .join("\n");
    prompt.push_str(ASSISTANT_CUE);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_user_message() {
        let history = vec![Message::user("Hi")];
        assert_eq!(build_prompt(&history, 6), "User: Hi\nAI:");
    }

    #[test]
    fn test_empty_history_renders_cue() {
        assert_eq!(build_prompt(&[], 6), "\nAI:");
    }

    #[test]
    fn test_zero_window_renders_cue() {
        let history = vec![Message::user("Hi"), Message::assistant("Hello")];
        assert_eq!(build_prompt(&history, 0), "\nAI:");
    }

    #[test]
    fn test_alternating_roles() {
        let history = vec![
            Message::user("Hi"),
            Message::assistant("Hello there"),
            Message::user("How are you?"),
        ];
        assert_eq!(
            build_prompt(&history, 6),
            "User: Hi\nAI: Hello there\nUser: How are you?\nAI:"
        );
    }

    #[test]
    fn test_window_keeps_last_six_in_order() {
        let history: Vec<Message> = (1..=9)
            .map(|i| {
                if i % 2 == 1 {
                    Message::user(format!("u{}", i))
                } else {
                    Message::assistant(format!("a{}", i))
                }
            })
            .collect();

        let prompt = build_prompt(&history, 6);
        assert_eq!(
            prompt,
            "AI: a4\nUser: u5\nAI: a6\nUser: u7\nAI: a8\nUser: u9\nAI:"
        );
        assert!(!prompt.contains("u3"));
    }

    #[test]
    fn test_deterministic() {
        let history = vec![Message::user("same"), Message::assistant("again")];
        assert_eq!(build_prompt(&history, 6), build_prompt(&history, 6));
    }
}
