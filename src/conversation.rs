//! Per-user conversation history
//!
//! Topics are named, ordered threads of turns persisted to one JSON file per
//! user. The windower picks how much of a topic is replayed as context.

mod store;
mod window;

#[cfg(test)]
mod proptests;

pub use store::{ConversationStore, DEFAULT_TOPIC_NAME};
pub use window::select_window;

use serde::{Deserialize, Serialize};

/// One prompt/response exchange
///
/// Serialized as a `[prompt, response, timestamp]` triple so existing
/// history files stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct Turn {
    pub prompt: String,
    pub response: String,
    /// Local time, ISO-8601 with microseconds
    pub timestamp: String,
}

impl Turn {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
            timestamp: chrono::Local::now()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
        }
    }

    /// Size of the turn as counted against the history budget
    pub fn weight(&self) -> usize {
        self.prompt.chars().count() + self.response.chars().count()
    }
}

impl From<(String, String, String)> for Turn {
    fn from((prompt, response, timestamp): (String, String, String)) -> Self {
        Self {
            prompt,
            response,
            timestamp,
        }
    }
}

impl From<Turn> for (String, String, String) {
    fn from(turn: Turn) -> Self {
        (turn.prompt, turn.response, turn.timestamp)
    }
}
