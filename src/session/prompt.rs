//! Prompt construction for chat completions
//!
//! The completion endpoint sees one flat text: a fixed preamble, the
//! windowed history as alternating human/bot lines, then the new prompt.

use crate::conversation::Turn;
use std::fmt::Write;

pub const HUMAN_TOKEN: &str = "[H]";
pub const BOT_TOKEN: &str = "[B]";

/// Preamble establishing who is talking
const CHATBOT_PREAMBLE: &str = "The following is a conversation of human [H] with an AI assistant [B]. \
The assistant is helpful, creative, clever, and very friendly. \
Escape all code with ```.\n";

/// Build the augmented prompt for `prompt` given the windowed `history`
pub fn build_chat_prompt(history: &[Turn], prompt: &str) -> String {
    let mut out = String::from(CHATBOT_PREAMBLE);
    for turn in history {
        let _ = write!(
            out,
            "{HUMAN_TOKEN}: {}\n{BOT_TOKEN}: {}\n",
            turn.prompt, turn.response
        );
    }
    let _ = writeln!(out, "{HUMAN_TOKEN}: {prompt}");
    out
}

/// Trim the completion and drop a leading bot marker the model echoed back,
/// along with the one character that follows it
pub fn clean_response(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.strip_prefix(BOT_TOKEN) {
        Some(rest) => {
            let mut chars = rest.chars();
            chars.next();
            chars.as_str().to_string()
        }
        None => trimmed.to_string(),
    }
}

/// Prompt asking the model to rewrite `text` according to `instruction`
pub fn build_edit_prompt(text: &str, instruction: &str) -> String {
    format!("Rewrite the text below following this instruction: {instruction}\n\nText:\n{text}\n\nRewritten text:\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_without_history() {
        let prompt = build_chat_prompt(&[], "hello");
        assert!(prompt.starts_with(CHATBOT_PREAMBLE));
        assert!(prompt.ends_with("[H]: hello\n"));
    }

    #[test]
    fn test_prompt_alternates_turns() {
        let history = vec![Turn::new("p1", "r1"), Turn::new("p2", "r2")];
        let prompt = build_chat_prompt(&history, "p3");
        let body = prompt.strip_prefix(CHATBOT_PREAMBLE).unwrap();
        assert_eq!(body, "[H]: p1\n[B]: r1\n[H]: p2\n[B]: r2\n[H]: p3\n");
    }

    #[test]
    fn test_clean_response() {
        assert_eq!(clean_response("  hi there \n"), "hi there");
        assert_eq!(clean_response("\n[B] hi"), "hi");
        assert_eq!(clean_response("[B]: hi"), " hi");
        assert_eq!(clean_response("[B]x hi"), " hi");
        assert_eq!(clean_response("[B]"), "");
        assert_eq!(clean_response("ok [B] inside"), "ok [B] inside");
    }

    #[test]
    fn test_edit_prompt_mentions_instruction() {
        let prompt = build_edit_prompt("teh cat", "fix spelling");
        assert!(prompt.contains("fix spelling"));
        assert!(prompt.contains("teh cat"));
    }
}
