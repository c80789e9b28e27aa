//! Errors surfaced by chat session operations

use crate::llm::LlmError;
use crate::transport::ChannelError;
use std::fmt::Write;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Topic already exists: {0}")]
    DuplicateTopic(String),
    #[error("Topic not found: {0}")]
    UnknownTopic(String),
    #[error("Both name and index are missing")]
    AmbiguousSelector,
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Conversation history at {path:?} is corrupt: {reason}")]
    CorruptState { path: PathBuf, reason: String },
    #[error("Completion request failed: {0}")]
    CompletionClient(#[from] LlmError),
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Delivery failed: {0}")]
    Transport(#[from] ChannelError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BotResult<T> = Result<T, BotError>;

impl BotError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Whether a single delayed retry of the same request is worthwhile
    pub fn is_transient(&self) -> bool {
        match self {
            Self::CompletionClient(e) => e.kind.is_retryable(),
            Self::Transport(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Render the error and its source chain, one cause per line
    pub fn trace(&self) -> String {
        let mut out = format!("{self:?}");
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let _ = write!(out, "\ncaused by: {cause}");
            source = cause.source();
        }
        out
    }
}
