//! Outbound text shaping
//!
//! Model replies are split on triple backticks into plain and code blocks.
//! Code blocks are rendered as MarkdownV2 `pre` entities; plain blocks are
//! sent as they are. Anything longer than a single message is chunked.

/// Telegram's limit for one message, in characters
pub const MAX_MESSAGE_CHARS: usize = 4096;

const FENCE: &str = "```";

/// A run of reply text that is either all code or all prose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub text: String,
    pub is_code: bool,
}

/// Split `text` on ``` fences; blank blocks are dropped.
///
/// An unterminated fence makes the rest of the text a code block. The
/// language tag after an opening fence stays part of the code text.
pub fn split_to_code_blocks(text: &str) -> Vec<TextBlock> {
    text.split(FENCE)
        .enumerate()
        .filter(|(_, part)| !part.trim().is_empty())
        .map(|(i, part)| TextBlock {
            text: if i % 2 == 1 {
                part.to_string()
            } else {
                part.trim().to_string()
            },
            is_code: i % 2 == 1,
        })
        .collect()
}

/// Escape text placed inside a MarkdownV2 `pre` or `code` entity
pub fn escape_code(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '`' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// MarkdownV2 source for a code block
pub fn render_code_block(code: &str) -> String {
    format!("{FENCE}{}{FENCE}", escape_code(code))
}

/// Split `message` into chunks of at most `max_chars` characters, preferring
/// paragraph, line and word boundaries.
pub fn split_message(message: &str, max_chars: usize) -> Vec<String> {
    if message.chars().count() <= max_chars {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = message;

    while !remaining.is_empty() {
        let Some((limit, _)) = remaining.char_indices().nth(max_chars) else {
            chunks.push(remaining.to_string());
            break;
        };

        let (window, _) = remaining.split_at(limit);
        let split_at = window
            .rfind("\n\n")
            .or_else(|| window.rfind('\n'))
            .or_else(|| window.rfind(' '))
            .filter(|&pos| pos > 0)
            .unwrap_or(limit);

        let (chunk, rest) = remaining.split_at(split_at);
        chunks.push(chunk.to_string());
        remaining = rest.trim_start();
    }

    chunks
}
