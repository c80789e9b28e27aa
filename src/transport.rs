//! Chat transports
//!
//! A transport turns incoming user messages into [`Inbound`] values for an
//! [`InboundHandler`] and delivers the handler's [`Reply`]s back through a
//! [`ReplySink`]. Telegram long polling is the production transport; the
//! console transport reads stdin for local use.

mod console;
pub mod format;
mod queue;
mod telegram;

pub use console::ConsoleChannel;
pub use queue::UserQueues;
pub use telegram::{TelegramChannel, TelegramConfig};

use async_trait::async_trait;

/// Result type for transport operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

impl ChannelError {
    /// Failures that may go away if the same delivery is tried again later
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::RateLimited { .. })
    }
}

/// What the bot sends back for one incoming message
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    /// Prompt with (label, command) buttons; a pressed button comes back as the command text
    Menu {
        prompt: String,
        buttons: Vec<(String, String)>,
    },
}

impl Reply {
    /// Topic changes are pinned so the active topic stays visible in the chat
    pub fn announces_topic(&self) -> bool {
        matches!(self, Self::Text(text) if text.starts_with("Active topic"))
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// One message from a user, or a pressed menu button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Stable key for the user's session and history file
    pub user_id: String,
    /// Where replies go
    pub chat_id: String,
    pub text: String,
}

/// Delivers replies to a chat.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn deliver(&self, chat_id: &str, reply: &Reply) -> ChannelResult<()>;
}

/// Processes incoming messages; replies go out through `sink`.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, sink: &dyn ReplySink, inbound: Inbound);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(ChannelError::Connection("reset".into()).is_transient());
        assert!(ChannelError::RateLimited { retry_after_secs: 3 }.is_transient());
        assert!(!ChannelError::Auth("bad token".into()).is_transient());
        assert!(!ChannelError::InvalidMessage("entities".into()).is_transient());
    }

    #[test]
    fn test_topic_announcements() {
        assert!(Reply::Text("Active topic: work".into()).announces_topic());
        assert!(!Reply::Text("Renamed a to b".into()).announces_topic());
        let menu = Reply::Menu {
            prompt: "Active topic".into(),
            buttons: vec![],
        };
        assert!(!menu.announces_topic());
    }
}
