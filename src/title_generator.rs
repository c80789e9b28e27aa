//! Topic title generation using a fast/cheap model
//!
//! Backs `/question`: the question is summarized into a short kebab-case
//! topic name before it is answered.

use crate::llm::{LlmRequest, LlmService};
use std::time::Duration;
use tokio::time::timeout;

const TITLE_PROMPT: &str = r#"Generate a very short (2-5 words) topic name for this question. Output only the topic, no quotes or punctuation. Examples:
- "How do I sort a vector of structs in Rust?" -> Sorting Rust Structs
- "What should I cook for dinner with eggs and rice?" -> Egg Rice Dinner

Question: "#;

const TITLE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_TITLE_LENGTH: usize = 60;
const MAX_QUESTION_CHARS: usize = 500;

/// Generate a topic name for `question` using `model`.
///
/// Returns None if generation fails (timeout, error, empty output).
/// The caller should fall back to an auto-generated name in that case.
pub async fn generate_topic_title(
    question: &str,
    llm_service: &dyn LlmService,
    model: &str,
    user: Option<&str>,
) -> Option<String> {
    let truncated: String = if question.chars().count() > MAX_QUESTION_CHARS {
        let head: String = question.chars().take(MAX_QUESTION_CHARS).collect();
        format!("{head}...")
    } else {
        question.to_string()
    };

    let request = LlmRequest {
        model: model.to_string(),
        prompt: format!("{TITLE_PROMPT}\"{truncated}\"\nTopic:"),
        max_tokens: 16,
        temperature: 0.0,
        user: user.map(String::from),
    };

    match timeout(TITLE_TIMEOUT, llm_service.complete(&request)).await {
        Ok(Ok(response)) => {
            let title = sanitize_title(response.text.trim());
            if title.is_empty() {
                None
            } else {
                Some(title)
            }
        }
        Ok(Err(e)) => {
            tracing::warn!("Topic title generation error: {}", e.message);
            None
        }
        Err(_) => {
            tracing::warn!("Topic title generation timed out");
            None
        }
    }
}

/// Sanitize the title for use as a topic name
/// - Replace problematic characters
/// - Convert to lowercase kebab-case
/// - Truncate to max length at a word boundary
fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();

    let kebab: String = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();

    if kebab.chars().count() <= MAX_TITLE_LENGTH {
        return kebab;
    }

    let truncated: String = kebab.chars().take(MAX_TITLE_LENGTH).collect();
    match truncated.rfind('-') {
        Some(last_dash) if last_dash > 0 => truncated.get(..last_dash).unwrap_or(&truncated).to_string(),
        _ => truncated,
    }
}
