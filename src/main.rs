//! Enhancer bot - chat relay in front of a hosted completion API
//!
//! Each user gets named conversation topics persisted as flat JSON files.
//! Messages arrive over Telegram (or stdin in console mode), are routed to
//! commands or to the completion model, and the replies are sent back.

mod commands;
mod config;
mod conversation;
mod error;
mod heartbeat;
mod llm;
mod relay;
mod session;
mod title_generator;
mod transport;

#[cfg(test)]
mod testing;

use clap::Parser;
use commands::CommandRegistry;
use config::BotConfig;
use llm::{LlmConfig, LlmService, LoggingService, OpenAIService, EXPENSIVE_MODEL};
use relay::Relay;
use session::{SessionDefaults, SessionManager};
use std::path::PathBuf;
use std::sync::Arc;
use transport::{ConsoleChannel, InboundHandler, TelegramChannel, TelegramConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "enhancer-bot")]
#[command(about = "Chat relay with per-user conversation topics", long_about = None)]
struct Cli {
    /// Use the expensive model by default instead of the cheap one
    #[arg(long)]
    expensive: bool,

    /// Read messages from stdin instead of Telegram
    #[arg(long)]
    console: bool,

    /// User name for console mode
    #[arg(long, default_value = "console")]
    console_user: String,

    /// Directory holding per-user history files
    #[arg(long)]
    history_dir: Option<PathBuf>,

    /// Liveness file touched every minute
    #[arg(long)]
    heartbeat_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "enhancer_bot=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = BotConfig::from_env().with_overrides(cli.history_dir, cli.heartbeat_path);
    let llm_config = LlmConfig::from_env();
    let openai: Arc<dyn LlmService> = Arc::new(OpenAIService::new(&llm_config)?);
    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(openai));

    let mut defaults = SessionDefaults::default();
    if cli.expensive {
        defaults.model = EXPENSIVE_MODEL.to_string();
    }
    tracing::info!(
        model = %defaults.model,
        history_dir = %config.history_dir.display(),
        "Starting enhancer bot"
    );

    let sessions = Arc::new(SessionManager::new(llm, defaults, &config.history_dir));
    let relay = Arc::new(Relay::new(sessions, CommandRegistry::new()));
    let heartbeat = heartbeat::spawn(config.heartbeat_path.clone(), heartbeat::HEARTBEAT_INTERVAL);

    if cli.console {
        ConsoleChannel::new(cli.console_user).run(relay.as_ref()).await?;
    } else {
        let token = config
            .telegram_token
            .ok_or("TELEGRAM_BOT_TOKEN is not set (use --console for a local session)")?;
        let channel = Arc::new(TelegramChannel::new(TelegramConfig::new(token))?);
        channel.init(relay.registry().bot_commands()).await?;

        let handler: Arc<dyn InboundHandler> = relay;
        tokio::select! {
            () = channel.run(handler) => {}
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Shutting down");
            }
        }
    }

    heartbeat.abort();
    Ok(())
}
