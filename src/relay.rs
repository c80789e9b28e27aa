//! Message relay: routes user text to commands or chat and reports failures
//!
//! Every message is handled under the user's session lock, so one user's
//! messages are processed strictly in order while other users proceed in
//! parallel. Transient failures get one delayed retry; replies that were
//! computed but failed to deliver are re-sent rather than recomputed.

use crate::commands::{dispatch, parse_query, CommandRegistry};
use crate::error::{BotError, BotResult};
use crate::session::{ChatSession, SessionManager};
use crate::transport::{Inbound, InboundHandler, Reply, ReplySink};
use async_trait::async_trait;
use chrono::Local;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;

/// Wait before retrying a transiently failed message
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

const FUNNY_REASONS: &[&str] = &[
    "the hamsters powering the server went on a coffee break",
    "a cosmic ray flipped exactly the wrong bit",
    "the model got distracted by a particularly interesting cloud",
    "somebody tripped over the network cable",
    "the servers are busy contemplating the meaning of life",
    "the bits got stuck in traffic",
];

const FUNNY_CONSOLATIONS: &[&str] = &[
    "Here's a virtual cookie for your patience",
    "At least the weather is nice somewhere",
    "Tomorrow is another day",
    "Think of it as a chance to stretch your legs",
    "Even the best of us have off days",
];

fn pick(options: &[&'static str]) -> &'static str {
    options
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_default()
}

fn apology(error: &BotError) -> String {
    format!(
        "Sorry, seems {}.\nThere was an error: {error}.\nYou can use /error command to see the details.\n\
Please, accept my sincere apologies. And.. {}.\n\
If the error persists, you can also try /new_topic command to start a new conversation.",
        pick(FUNNY_REASONS),
        pick(FUNNY_CONSOLATIONS).to_lowercase()
    )
}

fn retry_notice() -> String {
    format!("Sorry, {}. Retrying in a moment", pick(FUNNY_REASONS))
}

fn hopeless() -> String {
    format!(
        "Nah, it's hopeless.. {}",
        pick(FUNNY_CONSOLATIONS).to_lowercase()
    )
}

/// Routes incoming messages to chat sessions
pub struct Relay {
    sessions: Arc<SessionManager>,
    registry: CommandRegistry,
    retry_delay: Duration,
}

impl Relay {
    pub fn new(sessions: Arc<SessionManager>, registry: CommandRegistry) -> Self {
        Self {
            sessions,
            registry,
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Compute the reply to `text`: commands are dispatched, anything else is chat
    pub async fn respond(&self, session: &mut ChatSession, text: &str) -> BotResult<Reply> {
        match parse_query(text) {
            Some(parsed) => dispatch(session, &self.registry, &parsed).await,
            None => session.chat(text).await.map(Reply::from),
        }
    }

    async fn respond_with_retry(
        &self,
        sink: &dyn ReplySink,
        session: &mut ChatSession,
        inbound: &Inbound,
    ) -> Option<Reply> {
        let error = match self.respond(session, &inbound.text).await {
            Ok(reply) => return Some(reply),
            Err(e) => e,
        };

        if !error.is_transient() {
            tracing::warn!(user = %inbound.user_id, error = %error, "Message handling failed");
            record(session, &error, &inbound.text);
            notify(sink, &inbound.chat_id, apology(&error)).await;
            return None;
        }

        tracing::warn!(
            user = %inbound.user_id,
            error = %error,
            delay_secs = self.retry_delay.as_secs(),
            "Transient failure, retrying once"
        );
        notify(sink, &inbound.chat_id, retry_notice()).await;
        tokio::time::sleep(self.retry_delay).await;

        match self.respond(session, &inbound.text).await {
            Ok(reply) => Some(reply),
            Err(error) => {
                tracing::error!(user = %inbound.user_id, error = %error, "Retry failed");
                record(session, &error, &inbound.text);
                notify(sink, &inbound.chat_id, hopeless()).await;
                None
            }
        }
    }

    async fn deliver_with_retry(
        &self,
        sink: &dyn ReplySink,
        session: &mut ChatSession,
        inbound: &Inbound,
        reply: &Reply,
    ) {
        let error = match sink.deliver(&inbound.chat_id, reply).await {
            Ok(()) => return,
            Err(e) => BotError::from(e),
        };
        record(session, &error, &inbound.text);

        if error.is_transient() {
            tracing::warn!(user = %inbound.user_id, error = %error, "Delivery failed, re-sending");
            tokio::time::sleep(self.retry_delay).await;
            if let Err(e) = sink.deliver(&inbound.chat_id, reply).await {
                let error = BotError::from(e);
                tracing::error!(user = %inbound.user_id, error = %error, "Re-sending failed");
                record(session, &error, &inbound.text);
                notify(sink, &inbound.chat_id, hopeless()).await;
            }
        } else {
            tracing::warn!(user = %inbound.user_id, error = %error, "Delivery failed");
            notify(sink, &inbound.chat_id, apology(&error)).await;
        }
    }
}

#[async_trait]
impl InboundHandler for Relay {
    async fn handle(&self, sink: &dyn ReplySink, inbound: Inbound) {
        let handle = match self.sessions.get_or_create(&inbound.user_id).await {
            Ok(handle) => handle,
            Err(error) => {
                tracing::error!(user = %inbound.user_id, error = %error, "Cannot open session");
                notify(sink, &inbound.chat_id, apology(&error)).await;
                return;
            }
        };
        let mut session = handle.lock().await;

        if let Some(reply) = self.respond_with_retry(sink, &mut session, &inbound).await {
            self.deliver_with_retry(sink, &mut session, &inbound, &reply)
                .await;
        }
    }
}

fn record(session: &mut ChatSession, error: &BotError, message_text: &str) {
    session.record_error(
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        error.to_string(),
        error.trace(),
        Some(message_text),
    );
}

/// Best-effort status message to the user
async fn notify(sink: &dyn ReplySink, chat_id: &str, text: String) {
    if let Err(e) = sink.deliver(chat_id, &Reply::Text(text)).await {
        tracing::warn!(chat_id = %chat_id, error = %e, "Could not notify user");
    }
}
