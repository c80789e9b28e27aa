//! Per-user chat sessions
//!
//! A session owns the user's conversation store, the active topic, the
//! generation parameters and a log of recent failures. The manager hands
//! out one session per user and serializes access to it.

mod chat;
mod error_log;
mod manager;
mod prompt;

pub use chat::{
    validate_temperature, ChatSession, QueryOverrides, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
    HISTORY_WORD_LIMIT,
};
pub use manager::SessionManager;

use crate::llm::{CHEAP_MODEL, DEFAULT_MODEL};

/// Settings every new session starts from
#[derive(Debug, Clone)]
pub struct SessionDefaults {
    pub model: String,
    pub cheap_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub history_word_limit: usize,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            cheap_model: CHEAP_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            history_word_limit: HISTORY_WORD_LIMIT,
        }
    }
}
