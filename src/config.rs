//! Process configuration from the environment

use std::path::PathBuf;

const DEFAULT_HISTORY_DIR: &str = "history";
const HEARTBEAT_FILE: &str = "heartbeat/chatgpt_enhancer_last_alive";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    /// Required for the Telegram transport only
    pub telegram_token: Option<String>,
    pub history_dir: PathBuf,
    pub heartbeat_path: PathBuf,
}

impl BotConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let history_dir = non_empty("ENHANCER_HISTORY_DIR")
            .map_or_else(|| PathBuf::from(DEFAULT_HISTORY_DIR), PathBuf::from);
        let heartbeat_path = non_empty("ENHANCER_HEARTBEAT_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(HEARTBEAT_FILE)
            },
            PathBuf::from,
        );

        Self {
            telegram_token: non_empty("TELEGRAM_BOT_TOKEN"),
            history_dir,
            heartbeat_path,
        }
    }

    /// Apply command-line values on top of the environment
    pub fn with_overrides(
        mut self,
        history_dir: Option<PathBuf>,
        heartbeat_path: Option<PathBuf>,
    ) -> Self {
        if let Some(dir) = history_dir {
            self.history_dir = dir;
        }
        if let Some(path) = heartbeat_path {
            self.heartbeat_path = path;
        }
        self
    }
}
