//! Registry of live chat sessions, one per user

use super::{ChatSession, SessionDefaults};
use crate::conversation::ConversationStore;
use crate::error::BotResult;
use crate::llm::LlmService;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Hex digits of the digest that disambiguate escaped user ids
const USER_DIGEST_CHARS: usize = 12;

/// Shared handle to one user's session; holding the lock serializes that user's messages
pub type SessionHandle = Arc<Mutex<ChatSession>>;

/// Manager for all chat sessions
pub struct SessionManager {
    llm: Arc<dyn LlmService>,
    defaults: SessionDefaults,
    history_dir: PathBuf,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(
        llm: Arc<dyn LlmService>,
        defaults: SessionDefaults,
        history_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            llm,
            defaults,
            history_dir: history_dir.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Path of the history file backing `user`
    pub fn history_path(&self, user: &str) -> PathBuf {
        self.history_dir
            .join(format!("history_{}.json", file_key(user)))
    }

    /// Get the session for `user`, loading it from disk on first use
    pub async fn get_or_create(&self, user: &str) -> BotResult<SessionHandle> {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(user) {
                return Ok(Arc::clone(handle));
            }
        }

        let mut sessions = self.sessions.write().await;
        // Another task may have loaded it while we waited for the write lock
        if let Some(handle) = sessions.get(user) {
            return Ok(Arc::clone(handle));
        }

        let store = ConversationStore::load(self.history_path(user))?;
        let session = ChatSession::new(user, store, Arc::clone(&self.llm), &self.defaults);
        tracing::info!(
            user = %user,
            active_topic = %session.active_topic(),
            open_sessions = sessions.len() + 1,
            "Opened chat session"
        );

        let handle = Arc::new(Mutex::new(session));
        sessions.insert(user.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// File-name-safe form of `user`. Ids that needed escaping also get a
/// digest suffix, so two ids never collapse onto the same file.
fn file_key(user: &str) -> String {
    let safe: String = user
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe == user {
        return safe;
    }

    let mut hasher = Sha256::new();
    hasher.update(user.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    let short = digest.get(..USER_DIGEST_CHARS).unwrap_or(&digest);
    format!("{safe}-{short}")
}
