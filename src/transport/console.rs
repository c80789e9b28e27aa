//! Console transport for local sessions
//!
//! Reads one message per stdin line and prints replies prefixed with `[B]:`.

use super::{ChannelResult, Inbound, InboundHandler, Reply, ReplySink};
use async_trait::async_trait;
use std::fmt::Write;
use tokio::io::{self, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

const CONSOLE_CHAT_ID: &str = "console";

pub struct ConsoleChannel<W = io::Stdout> {
    user_id: String,
    out: Mutex<W>,
}

impl ConsoleChannel {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self::with_writer(user_id, io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> ConsoleChannel<W> {
    pub fn with_writer(user_id: impl Into<String>, out: W) -> Self {
        Self {
            user_id: user_id.into(),
            out: Mutex::new(out),
        }
    }

    /// Handle stdin lines one at a time until EOF or `/quit`
    pub async fn run(&self, handler: &dyn InboundHandler) -> ChannelResult<()> {
        let mut lines = BufReader::new(io::stdin()).lines();
        tracing::info!(user = %self.user_id, "Console channel reading stdin");

        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "/quit" || line == "/exit" {
                break;
            }

            let inbound = Inbound {
                user_id: self.user_id.clone(),
                chat_id: CONSOLE_CHAT_ID.to_string(),
                text: line.to_string(),
            };
            handler.handle(self, inbound).await;
        }
        Ok(())
    }
}

fn render(reply: &Reply) -> String {
    match reply {
        Reply::Text(text) => format!("[B]: {text}\n"),
        Reply::Menu { prompt, buttons } => {
            let mut out = format!("[B]: {prompt}\n");
            for (label, command) in buttons {
                let _ = writeln!(out, "  {label}: {command}");
            }
            out
        }
    }
}

async fn write_flushed<W: AsyncWrite + Unpin>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    out.write_all(bytes).await?;
    out.flush().await
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ReplySink for ConsoleChannel<W> {
    async fn deliver(&self, _chat_id: &str, reply: &Reply) -> ChannelResult<()> {
        let mut out = self.out.lock().await;
        write_flushed(&mut *out, render(reply).as_bytes())
            .await
            .map_err(|e| super::ChannelError::SendFailed(e.to_string()))
    }
}
