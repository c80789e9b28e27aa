//! Telegram Bot API transport
//!
//! Long-polls `getUpdates`, queues each message or button press behind the
//! sender's earlier ones and implements [`ReplySink`] over `sendMessage`.
//! A reply that fails part way through resumes after the messages that
//! already went out when it is delivered again.

use super::format::{render_code_block, split_message, split_to_code_blocks, MAX_MESSAGE_CHARS};
use super::{ChannelError, ChannelResult, Inbound, InboundHandler, Reply, ReplySink, UserQueues};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Seconds Telegram holds a `getUpdates` request open
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll before trying again
const POLL_BACKOFF: Duration = Duration::from_secs(5);

/// Buttons per inline keyboard row
const MENU_COLUMNS: usize = 2;

const MARKDOWN_FALLBACK_PREFIX: &str =
    "Unable to parse markdown in this response. Here's the raw text:\n\n";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

// ============================================================================
// Bot API wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    username: Option<String>,
}

impl User {
    /// Username when set, numeric id otherwise
    fn session_key(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    message: Option<Message>,
    data: Option<String>,
}

#[derive(Debug, Serialize)]
struct BotCommand {
    command: String,
    description: String,
}

#[derive(Debug, Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

// ============================================================================
// Channel
// ============================================================================

/// One Bot API message of a rendered reply
#[derive(Debug, PartialEq, Eq)]
enum Outgoing<'a> {
    Plain(String),
    Markdown(String),
    Menu {
        prompt: &'a str,
        buttons: &'a [(String, String)],
    },
}

fn outgoing(reply: &Reply) -> Vec<Outgoing<'_>> {
    match reply {
        Reply::Menu { prompt, buttons } => vec![Outgoing::Menu { prompt, buttons }],
        Reply::Text(text) => split_to_code_blocks(text)
            .into_iter()
            .flat_map(|block| {
                let is_code = block.is_code;
                split_message(&block.text, MAX_MESSAGE_CHARS)
                    .into_iter()
                    .map(move |chunk| {
                        if is_code {
                            Outgoing::Markdown(render_code_block(&chunk))
                        } else {
                            Outgoing::Plain(chunk)
                        }
                    })
            })
            .collect(),
    }
}

pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    /// Per chat: a reply whose delivery failed part way, and how many of its messages were sent
    partial: Mutex<HashMap<String, (Reply, usize)>>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> ChannelResult<Self> {
        let client = reqwest::Client::builder()
            // Must outlive the long-poll timeout
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS * 2))
            .build()
            .map_err(|e| ChannelError::Connection(e.to_string()))?;
        Ok(Self {
            config,
            client,
            partial: Mutex::new(HashMap::new()),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    /// POST a Bot API method and unwrap its `result`
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> ChannelResult<T> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;

        let parsed: ApiResponse<T> = serde_json::from_str(&text).map_err(|e| {
            ChannelError::SendFailed(format!("{method}: unreadable response ({status}): {e}"))
        })?;

        match parsed {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                description,
                parameters,
                ..
            } => Err(error_for(
                method,
                status,
                description.unwrap_or_default(),
                parameters.and_then(|p| p.retry_after),
            )),
        }
    }

    /// Verify the token and publish the command menu
    pub async fn init(&self, commands: Vec<(String, String)>) -> ChannelResult<()> {
        let me: User = self.call("getMe", &json!({})).await.map_err(|e| match e {
            ChannelError::SendFailed(msg) | ChannelError::InvalidMessage(msg) => {
                ChannelError::Auth(msg)
            }
            other => other,
        })?;

        let commands: Vec<BotCommand> = commands
            .into_iter()
            .map(|(command, description)| BotCommand {
                command,
                description,
            })
            .collect();
        let count = commands.len();
        let _: bool = self
            .call("setMyCommands", &json!({ "commands": commands }))
            .await?;

        tracing::info!(
            bot = me.username.as_deref().unwrap_or("-"),
            commands = count,
            "Telegram channel initialized"
        );
        Ok(())
    }

    /// Poll for updates until the surrounding task is dropped
    pub async fn run(self: Arc<Self>, handler: Arc<dyn InboundHandler>) {
        let sink: Arc<dyn ReplySink> = self.clone();
        let queues = UserQueues::new(sink, handler);
        let mut offset: i64 = 0;
        tracing::info!("Telegram channel listening for messages");

        loop {
            let body = json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message", "callback_query"],
            });

            let updates: Vec<Update> = match self.call("getUpdates", &body).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %e, "Telegram poll failed");
                    tokio::time::sleep(POLL_BACKOFF).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(inbound) = self.inbound_from(update).await else {
                    continue;
                };

                tracing::info!(
                    channel = "telegram",
                    user_id = %inbound.user_id,
                    chat_id = %inbound.chat_id,
                    "Message received"
                );

                queues.push(inbound).await;
            }
        }
    }

    async fn inbound_from(&self, update: Update) -> Option<Inbound> {
        if let Some(query) = update.callback_query {
            // Stop the client's loading spinner; the reply itself is a new message
            let ack = self
                .call::<bool>("answerCallbackQuery", &json!({ "callback_query_id": query.id }))
                .await;
            if let Err(e) = ack {
                tracing::debug!(error = %e, "answerCallbackQuery failed");
            }
            return Some(Inbound {
                user_id: query.from.session_key(),
                chat_id: query.message?.chat.id.to_string(),
                text: query.data?,
            });
        }

        let message = update.message?;
        Some(Inbound {
            user_id: message.from?.session_key(),
            chat_id: message.chat.id.to_string(),
            text: message.text?,
        })
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> ChannelResult<Message> {
        self.call("sendMessage", &json!({ "chat_id": chat_id, "text": text }))
            .await
    }

    /// Send MarkdownV2, falling back to plain text when Telegram rejects the entities
    async fn send_markdown(&self, chat_id: &str, markdown: &str) -> ChannelResult<Message> {
        let body = json!({
            "chat_id": chat_id,
            "text": markdown,
            "parse_mode": "MarkdownV2",
        });
        match self.call("sendMessage", &body).await {
            Err(ChannelError::InvalidMessage(reason)) => {
                tracing::warn!(reason = %reason, "Markdown rejected, resending as plain text");
                self.send_text(chat_id, &format!("{MARKDOWN_FALLBACK_PREFIX}{markdown}"))
                    .await
            }
            other => other,
        }
    }

    async fn send_menu(
        &self,
        chat_id: &str,
        prompt: &str,
        buttons: &[(String, String)],
    ) -> ChannelResult<Message> {
        let body = json!({
            "chat_id": chat_id,
            "text": prompt,
            "reply_markup": { "inline_keyboard": inline_keyboard(buttons) },
        });
        self.call("sendMessage", &body).await
    }

    async fn send(&self, chat_id: &str, message: &Outgoing<'_>) -> ChannelResult<Message> {
        match message {
            Outgoing::Plain(text) => self.send_text(chat_id, text).await,
            Outgoing::Markdown(markdown) => self.send_markdown(chat_id, markdown).await,
            Outgoing::Menu { prompt, buttons } => self.send_menu(chat_id, prompt, buttons).await,
        }
    }

    /// Messages of `reply` already sent to `chat_id` by an earlier, interrupted delivery
    fn resume_point(&self, chat_id: &str, reply: &Reply) -> usize {
        let partial = self.partial.lock().unwrap_or_else(PoisonError::into_inner);
        partial
            .get(chat_id)
            .filter(|(pending, _)| pending == reply)
            .map_or(0, |(_, sent)| *sent)
    }

    fn record_progress(&self, chat_id: &str, reply: &Reply, sent: usize) {
        let mut partial = self.partial.lock().unwrap_or_else(PoisonError::into_inner);
        if sent == 0 {
            partial.remove(chat_id);
        } else {
            partial.insert(chat_id.to_string(), (reply.clone(), sent));
        }
    }

    async fn pin(&self, chat_id: &str, message_id: i64) {
        let body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "disable_notification": true,
        });
        // Pinning needs admin rights in groups; a failure is not worth surfacing
        if let Err(e) = self.call::<bool>("pinChatMessage", &body).await {
            tracing::debug!(chat_id = %chat_id, error = %e, "pinChatMessage failed");
        }
    }
}

#[async_trait]
impl ReplySink for TelegramChannel {
    async fn deliver(&self, chat_id: &str, reply: &Reply) -> ChannelResult<()> {
        let messages = outgoing(reply);
        let skip = self.resume_point(chat_id, reply);
        if skip > 0 {
            tracing::info!(chat_id = %chat_id, skipped = skip, "Resuming interrupted reply");
        }

        let mut last = None;
        for (idx, message) in messages.iter().enumerate().skip(skip) {
            match self.send(chat_id, message).await {
                Ok(sent) => last = Some(sent),
                Err(e) => {
                    self.record_progress(chat_id, reply, idx);
                    return Err(e);
                }
            }
        }
        self.record_progress(chat_id, reply, 0);

        if reply.announces_topic() {
            if let Some(message) = last {
                self.pin(chat_id, message.message_id).await;
            }
        }
        Ok(())
    }
}

fn inline_keyboard(buttons: &[(String, String)]) -> Vec<Vec<InlineButton<'_>>> {
    buttons
        .chunks(MENU_COLUMNS)
        .map(|row| {
            row.iter()
                .map(|(label, command)| InlineButton {
                    text: label,
                    callback_data: command,
                })
                .collect()
        })
        .collect()
}

fn error_for(
    method: &str,
    status: u16,
    description: String,
    retry_after: Option<u64>,
) -> ChannelError {
    match status {
        401 | 403 | 404 => ChannelError::Auth(format!("{method}: {description}")),
        429 => ChannelError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(1),
        },
        400 if description.contains("can't parse entities") => {
            ChannelError::InvalidMessage(description)
        }
        500..=599 => ChannelError::Connection(format!("{method}: {description}")),
        _ => ChannelError::SendFailed(format!("{method}: {description}")),
    }
}
