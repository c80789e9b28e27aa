//! Chat session state and operations

use super::error_log::{ErrorLog, ErrorRecord};
use super::prompt::{build_chat_prompt, build_edit_prompt, clean_response};
use super::SessionDefaults;
use crate::conversation::{select_window, ConversationStore, Turn};
use crate::error::{BotError, BotResult};
use crate::llm::{all_models, token_limit, LlmRequest, LlmService, ModelInfo};
use crate::title_generator::generate_topic_title;
use chrono::Local;
use rand::seq::SliceRandom;
use std::fmt::Write;
use std::sync::Arc;

/// Characters of history replayed as context by default
pub const HISTORY_WORD_LIMIT: usize = 1000;

/// Upper bound for history budget plus response length
pub const MAX_HISTORY_WORD_LIMIT: usize = 4096;

pub const DEFAULT_TEMPERATURE: f32 = 0.9;
pub const DEFAULT_MAX_TOKENS: u32 = 500;

const DEFAULT_TOPIC_LIST_LIMIT: usize = 10;
const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Telegram rejects callback data longer than this
const MAX_CALLBACK_DATA_BYTES: usize = 64;

const WELCOME_MESSAGE: &str = "Hi! I relay your messages to a language model and remember the conversation.

Every conversation lives in a topic. Use /new_topic to start a clean one, \
/topics to list them and /switch_topic to go back to an older one.
Use /help to see every command.";

/// Words used to label a session's auto-generated topic names
const SESSION_WORDS: &[&str] = &[
    "autumn", "river", "mountain", "forest", "meadow", "ocean", "desert", "valley", "sunrise",
    "sunset", "thunder", "rainbow", "crystal", "shadow", "ancient", "swift", "quiet", "brave",
    "golden", "silver", "azure", "emerald", "comet", "dragon", "falcon", "walrus", "raven",
    "tiger", "eagle", "fox", "dream", "spark", "flame", "frost", "storm", "breeze", "tide",
    "star", "pebble", "lantern",
];

/// Model parameters sent with every completion request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Per-request parameter overrides for raw queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOverrides {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl QueryOverrides {
    fn apply(&self, params: &GenerationParams) -> GenerationParams {
        GenerationParams {
            model: self.model.clone().unwrap_or_else(|| params.model.clone()),
            temperature: self.temperature.unwrap_or(params.temperature),
            max_tokens: self.max_tokens.unwrap_or(params.max_tokens),
        }
    }
}

/// Reject temperatures outside `[0, 1]`
pub fn validate_temperature(temperature: f32) -> BotResult<f32> {
    if (0.0..=1.0).contains(&temperature) {
        Ok(temperature)
    } else {
        Err(BotError::invalid("Temperature must be in [0, 1]"))
    }
}

/// One user's conversational state
pub struct ChatSession {
    user: String,
    llm: Arc<dyn LlmService>,
    params: GenerationParams,
    cheap_model: String,
    history_word_limit: usize,
    store: ConversationStore,
    active_topic: String,
    topic_count: usize,
    session_label: String,
    errors: ErrorLog,
    models: Option<Vec<ModelInfo>>,
}

impl ChatSession {
    pub fn new(
        user: impl Into<String>,
        store: ConversationStore,
        llm: Arc<dyn LlmService>,
        defaults: &SessionDefaults,
    ) -> Self {
        // Fresh stores start with "General"; older files may have renamed it away.
        let active_topic = if store.contains(crate::conversation::DEFAULT_TOPIC_NAME) {
            crate::conversation::DEFAULT_TOPIC_NAME.to_string()
        } else {
            store
                .topic_from_end(1)
                .unwrap_or(crate::conversation::DEFAULT_TOPIC_NAME)
                .to_string()
        };

        let session_label = SESSION_WORDS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("session")
            .to_string();

        Self {
            user: user.into(),
            llm,
            params: GenerationParams {
                model: defaults.model.clone(),
                temperature: defaults.temperature,
                max_tokens: defaults.max_tokens,
            },
            cheap_model: defaults.cheap_model.clone(),
            history_word_limit: defaults.history_word_limit,
            store,
            active_topic,
            topic_count: 0,
            session_label,
            errors: ErrorLog::default(),
            models: None,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn active_topic(&self) -> &str {
        &self.active_topic
    }

    #[cfg(test)]
    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    #[cfg(test)]
    pub fn history_word_limit(&self) -> usize {
        self.history_word_limit
    }

    pub fn start(&self) -> &'static str {
        WELCOME_MESSAGE
    }

    // ==================== Model configuration ====================

    pub fn active_model(&self) -> String {
        format!("Active model: {}", self.params.model)
    }

    pub fn set_temperature(&mut self, temperature: f32) -> BotResult<String> {
        self.params.temperature = validate_temperature(temperature)?;
        Ok(format!("Temperature set to {temperature}"))
    }

    /// Response length; together with the history budget it must fit the model
    pub fn set_max_output_tokens(&mut self, max_tokens: u32) -> BotResult<String> {
        let limit = i64::from(token_limit(&self.params.model));
        let budget = i64::try_from(self.history_word_limit).unwrap_or(i64::MAX);
        if i64::from(max_tokens) > limit - budget {
            return Err(BotError::invalid(format!(
                "Max tokens combined with history word limit ({}) should not exceed {limit}",
                self.history_word_limit
            )));
        }
        self.params.max_tokens = max_tokens;
        Ok(format!("Response max tokens length set to {max_tokens}"))
    }

    /// How many characters of history are replayed as context
    pub fn set_history_word_limit(&mut self, limit: usize) -> BotResult<String> {
        let max = MAX_HISTORY_WORD_LIMIT.saturating_sub(self.params.max_tokens as usize);
        if limit > max {
            return Err(BotError::invalid(format!(
                "Limit must be at most {max} with max tokens set to {}",
                self.params.max_tokens
            )));
        }
        self.history_word_limit = limit;
        Ok(format!("History word limit set to {limit}"))
    }

    async fn models(&mut self) -> BotResult<&[ModelInfo]> {
        if self.models.is_none() {
            let mut models = self.llm.list_models().await?;
            models.sort_by(|a, b| a.id.cmp(&b.id));
            self.models = Some(models);
        }
        Ok(self.models.as_deref().unwrap_or_default())
    }

    pub async fn list_models(&mut self) -> BotResult<String> {
        let models = self.models().await?;
        let lines: Vec<String> = models
            .iter()
            .map(|m| match all_models().iter().find(|def| def.id == m.id) {
                Some(def) => format!("{} - {}", m.id, def.description),
                None => m.id.clone(),
            })
            .collect();
        Ok(lines.join("\n"))
    }

    pub async fn model_info(&mut self, model_id: &str) -> BotResult<String> {
        let models = self.models().await?;
        let info = models.iter().find(|m| m.id == model_id).ok_or_else(|| {
            BotError::invalid(format!(
                "Model {model_id} is not in the list, use /list_models to see available models"
            ))
        })?;
        let mut text = serde_json::to_string_pretty(info)
            .map_err(|e| BotError::invalid(format!("Cannot render model info: {e}")))?;
        let _ = write!(text, "\ntoken limit: {}", token_limit(&info.id));
        Ok(text)
    }

    pub async fn switch_model(&mut self, model: Option<&str>) -> BotResult<String> {
        let model = model.ok_or_else(|| {
            BotError::invalid("Model is required, use /list_models to see available models")
        })?;
        if !self.models().await?.iter().any(|m| m.id == model) {
            return Err(BotError::invalid(format!(
                "Model {model} is not in the list, use /list_models to see available models"
            )));
        }
        self.params.model = model.to_string();
        tracing::info!(user = %self.user, model = %model, "Switched model");
        Ok(self.active_model())
    }

    // ==================== Topics ====================

    fn generate_topic_name(&self) -> String {
        let today = Local::now().format("%Y%b%d");
        format!("{today}-{}-{}", self.session_label, self.topic_count)
    }

    /// Start a fresh topic and make it active
    pub fn new_topic(&mut self, name: Option<&str>) -> BotResult<String> {
        let name = match name {
            Some(n) if n.trim().is_empty() => {
                return Err(BotError::invalid("Topic name must not be empty"))
            }
            Some(n) => n.to_string(),
            None => self.generate_topic_name(),
        };
        self.store.create_topic(&name)?;
        self.active_topic = name;
        self.topic_count += 1;
        tracing::info!(user = %self.user, topic = %self.active_topic, "Created topic");
        Ok(format!("Active topic: {}", self.active_topic))
    }

    /// Most recent topic names, oldest first; `Some(0)` lists all
    pub fn list_topics(&self, limit: Option<usize>) -> Vec<&str> {
        self.store
            .list_topics(Some(limit.unwrap_or(DEFAULT_TOPIC_LIST_LIMIT)))
    }

    /// Topic list with the active topic highlighted
    pub fn list_topics_text(&self, limit: Option<usize>) -> String {
        self.list_topics(limit)
            .into_iter()
            .map(|t| {
                if t == self.active_topic {
                    format!("*{t}*")
                } else {
                    t.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// (label, command) pairs for a topic picker
    pub fn topics_menu(&self) -> Vec<(String, String)> {
        let topics = self.list_topics(None);
        let count = topics.len();
        topics
            .into_iter()
            .enumerate()
            .map(|(pos, topic)| {
                let label = if topic == self.active_topic {
                    format!("*{topic}*")
                } else {
                    topic.to_string()
                };
                let by_name = format!("/switch_topic {topic}");
                let command = if by_name.len() <= MAX_CALLBACK_DATA_BYTES
                    && !topic.contains(|c: char| c.is_whitespace() || c == '=')
                {
                    by_name
                } else {
                    format!("/switch_topic index={}", count - pos)
                };
                (label, command)
            })
            .collect()
    }

    /// Make another topic active, by name (exact, index or fuzzy) or by index
    pub fn switch_topic(&mut self, name: Option<&str>, index: Option<usize>) -> BotResult<String> {
        let mut index = index;

        if let Some(name) = name {
            if self.store.contains(name) {
                return Ok(self.activate(name.to_string()));
            }
            if let Ok(i) = name.parse::<usize>() {
                if let Some(topic) = self.store.topic_from_end(i).map(str::to_string) {
                    return Ok(self.activate(topic));
                }
            }
            if let Some(guess) = self.store.resolve_topic_by_fuzzy_name(name) {
                return Ok(self.activate(guess));
            }
            if index.is_none() {
                return Err(BotError::UnknownTopic(name.to_string()));
            }
        }

        match index {
            Some(i) => {
                let topic = self
                    .store
                    .topic_from_end(i)
                    .ok_or_else(|| BotError::UnknownTopic(format!("#{i}")))?
                    .to_string();
                Ok(self.activate(topic))
            }
            None => Err(BotError::AmbiguousSelector),
        }
    }

    fn activate(&mut self, topic: String) -> String {
        tracing::debug!(user = %self.user, topic = %topic, "Switched topic");
        self.active_topic = topic;
        format!("Active topic: {}", self.active_topic)
    }

    /// Rename `topic` (default: the active one) to `new_name`
    pub fn rename_topic(&mut self, new_name: &str, topic: Option<&str>) -> BotResult<String> {
        if new_name.trim().is_empty() {
            return Err(BotError::invalid("Topic name must not be empty"));
        }
        let target = topic.unwrap_or(&self.active_topic).to_string();
        self.store.rename_topic(&target, new_name)?;

        if target == self.active_topic {
            self.active_topic = new_name.to_string();
            Ok(format!("Active topic: {new_name}"))
        } else {
            Ok(format!("Renamed {target} to {new_name}"))
        }
    }

    /// The last `limit` turns of `topic` (default: active); `Some(0)` gives all
    pub fn get_history(&self, topic: Option<&str>, limit: Option<usize>) -> BotResult<&[Turn]> {
        let topic = topic.unwrap_or(&self.active_topic);
        self.store
            .history(topic, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
    }

    pub fn history_text(&self, topic: Option<&str>, limit: Option<usize>) -> BotResult<String> {
        let turns = self.get_history(topic, limit)?;
        Ok(turns
            .iter()
            .map(|t| format!("{}\n[Human]: {}\n[Bot]: {}", t.timestamp, t.prompt, t.response))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    // ==================== Completions ====================

    async fn complete(&self, prompt: String, params: &GenerationParams) -> BotResult<String> {
        let request = LlmRequest {
            model: params.model.clone(),
            prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            user: Some(self.user.clone()),
        };
        let response = self.llm.complete(&request).await?;
        if response.is_truncated() {
            tracing::warn!(user = %self.user, model = %params.model, "Completion hit max_tokens");
        }
        Ok(response.text)
    }

    /// Answer `prompt` in the context of the active topic and record the turn
    pub async fn chat(&mut self, prompt: &str) -> BotResult<String> {
        if prompt.trim().is_empty() {
            return Err(BotError::invalid("Prompt is empty"));
        }
        if prompt.starts_with('/') {
            return Err(BotError::invalid(format!(
                "{prompt} looks like a command, not a chat message"
            )));
        }

        let turns = self.store.turns(&self.active_topic)?;
        let window = select_window(turns, self.history_word_limit);
        let augmented = build_chat_prompt(window, prompt);
        tracing::debug!(
            user = %self.user,
            topic = %self.active_topic,
            history_turns = window.len(),
            "Built chat prompt"
        );

        let raw = self.complete(augmented, &self.params).await?;
        let text = clean_response(&raw);

        self.store.append_turn(&self.active_topic, prompt, &text)?;
        Ok(text)
    }

    /// Send `prompt` as-is, without history
    pub async fn raw_query(&self, prompt: &str, overrides: &QueryOverrides) -> BotResult<String> {
        if prompt.trim().is_empty() {
            return Err(BotError::invalid("Prompt is empty"));
        }
        let params = overrides.apply(&self.params);
        Ok(self.complete(prompt.to_string(), &params).await?.trim().to_string())
    }

    /// Send `prompt` as-is to the cheap model
    pub async fn cheap(&self, prompt: &str, overrides: &QueryOverrides) -> BotResult<String> {
        let overrides = QueryOverrides {
            model: Some(
                overrides
                    .model
                    .clone()
                    .unwrap_or_else(|| self.cheap_model.clone()),
            ),
            ..overrides.clone()
        };
        self.raw_query(prompt, &overrides).await
    }

    /// Rewrite `text` following `instruction` (default: the first line of `text`)
    pub async fn edit(
        &self,
        text: &str,
        instruction: Option<&str>,
        overrides: &QueryOverrides,
    ) -> BotResult<String> {
        let (instruction, text) = match instruction {
            Some(instruction) => (instruction, text),
            None => text.split_once('\n').unwrap_or((text, "")),
        };
        if instruction.trim().is_empty() {
            return Err(BotError::invalid("Edit instruction is empty"));
        }
        self.raw_query(&build_edit_prompt(text, instruction), overrides)
            .await
    }

    /// Open a topic named after the question, then answer it there
    pub async fn question(&mut self, prompt: &str) -> BotResult<String> {
        if prompt.trim().is_empty() {
            return Err(BotError::invalid("Prompt is empty"));
        }
        let title =
            generate_topic_title(prompt, self.llm.as_ref(), &self.cheap_model, Some(&self.user))
                .await
                .filter(|t| !self.store.contains(t));
        let previous = self.active_topic.clone();
        let header = self.new_topic(title.as_deref())?;
        match self.chat(prompt).await {
            Ok(answer) => Ok(format!("{header}\n{answer}")),
            Err(error) => {
                self.discard_topic(previous);
                Err(error)
            }
        }
    }

    /// Drop the freshly created active topic and return to `previous`
    fn discard_topic(&mut self, previous: String) {
        match self.store.delete_topic(&self.active_topic) {
            Ok(()) => {
                tracing::debug!(user = %self.user, topic = %self.active_topic, "Discarded unanswered topic");
                self.active_topic = previous;
                self.topic_count -= 1;
            }
            Err(e) => {
                tracing::warn!(user = %self.user, topic = %self.active_topic, error = %e, "Could not discard topic");
            }
        }
    }

    // ==================== Errors ====================

    pub fn record_error(
        &mut self,
        timestamp: impl Into<String>,
        error: impl Into<String>,
        trace: impl Into<String>,
        message_text: Option<&str>,
    ) {
        self.errors.push(ErrorRecord {
            timestamp: timestamp.into(),
            error: error.into(),
            trace: trace.into(),
            message_text: message_text.map(String::from),
        });
    }

    pub fn describe_errors(&self, limit: Option<usize>) -> String {
        let text = self.errors.describe(limit.unwrap_or(1));
        if text.is_empty() {
            "No errors recorded".to_string()
        } else {
            text
        }
    }

    #[cfg(test)]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::DEFAULT_TOPIC_NAME;
    use crate::llm::LlmError;
    use crate::testing::MockLlmClient;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> (ChatSession, Arc<MockLlmClient>) {
        let llm = Arc::new(MockLlmClient::new());
        let store = ConversationStore::load(dir.path().join("history_alice.json")).unwrap();
        let session = ChatSession::new("alice", store, llm.clone(), &SessionDefaults::default());
        (session, llm)
    }

    #[tokio::test]
    async fn test_chat_records_turn() {
        let dir = TempDir::new().unwrap();
        let (mut session, llm) = session(&dir);
        llm.queue_text("hi");

        let reply = session.chat("hello").await.unwrap();
        assert_eq!(reply, "hi");

        let history = session.get_history(None, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].prompt, "hello");
        assert_eq!(history[0].response, "hi");
        assert_eq!(session.active_topic(), DEFAULT_TOPIC_NAME);

        let request = &llm.recorded_requests()[0];
        assert_eq!(request.user.as_deref(), Some("alice"));
        assert!(request.prompt.ends_with("[H]: hello\n"));
    }

    #[tokio::test]
    async fn test_chat_replays_history_and_strips_marker() {
        let dir = TempDir::new().unwrap();
        let (mut session, llm) = session(&dir);
        llm.queue_text("first answer");
        llm.queue_text("[B] second answer");

        session.chat("first").await.unwrap();
        let reply = session.chat("second").await.unwrap();
        assert_eq!(reply, "second answer");

        let prompt = &llm.recorded_requests()[1].prompt;
        assert!(prompt.contains("[H]: first\n[B]: first answer\n[H]: second\n"));
    }

    #[tokio::test]
    async fn test_chat_failure_records_nothing() {
        let dir = TempDir::new().unwrap();
        let (mut session, llm) = session(&dir);
        llm.queue_error(LlmError::server_error("overloaded"));

        let err = session.chat("hello").await.unwrap_err();
        assert!(matches!(err, BotError::CompletionClient(_)));
        assert!(session.get_history(None, None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_rejects_commands_and_empty() {
        let dir = TempDir::new().unwrap();
        let (mut session, llm) = session(&dir);
        assert!(matches!(
            session.chat("/new_topic").await,
            Err(BotError::InvalidParameter(_))
        ));
        assert!(matches!(
            session.chat("   ").await,
            Err(BotError::InvalidParameter(_))
        ));
        assert!(llm.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_chat_persists_to_file() {
        let dir = TempDir::new().unwrap();
        let (mut session, llm) = session(&dir);
        llm.queue_text("hi");
        session.chat("hello").await.unwrap();

        let reloaded = ConversationStore::load(dir.path().join("history_alice.json")).unwrap();
        assert_eq!(reloaded.turns(DEFAULT_TOPIC_NAME).unwrap().len(), 1);
    }

    #[test]
    fn test_new_topic_duplicate() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session(&dir);
        assert_eq!(
            session.new_topic(Some("project-x")).unwrap(),
            "Active topic: project-x"
        );
        assert!(matches!(
            session.new_topic(Some("project-x")),
            Err(BotError::DuplicateTopic(_))
        ));
        assert_eq!(session.active_topic(), "project-x");
    }

    #[test]
    fn test_auto_topic_names_are_unique() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session(&dir);
        session.new_topic(None).unwrap();
        let first = session.active_topic().to_string();
        session.new_topic(None).unwrap();
        let second = session.active_topic().to_string();

        assert_ne!(first, second);
        assert!(first.ends_with("-0"));
        assert!(second.ends_with("-1"));
        assert!(first.contains(&format!("-{}-", session.session_label)));
    }

    #[test]
    fn test_list_topics_in_creation_order() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session(&dir);
        session.new_topic(Some("n1")).unwrap();
        session.new_topic(Some("n2")).unwrap();
        assert_eq!(session.list_topics(None), vec!["General", "n1", "n2"]);
        assert_eq!(session.list_topics_text(None), "General\nn1\n*n2*");
    }

    #[test]
    fn test_switch_topic() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session(&dir);
        session.new_topic(Some("rust-lifetimes")).unwrap();
        session.new_topic(Some("cooking")).unwrap();

        session.switch_topic(Some("rust-lifetimes"), None).unwrap();
        assert_eq!(session.active_topic(), "rust-lifetimes");

        session.switch_topic(None, Some(1)).unwrap();
        assert_eq!(session.active_topic(), "cooking");

        session.switch_topic(Some("3"), None).unwrap();
        assert_eq!(session.active_topic(), "General");

        session.switch_topic(Some("lifetimes"), None).unwrap();
        assert_eq!(session.active_topic(), "rust-lifetimes");
    }

    #[test]
    fn test_switch_topic_failures() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session(&dir);
        assert!(matches!(
            session.switch_topic(Some("doesnotexist"), None),
            Err(BotError::UnknownTopic(_))
        ));
        assert!(matches!(
            session.switch_topic(None, None),
            Err(BotError::AmbiguousSelector)
        ));
        assert!(matches!(
            session.switch_topic(None, Some(5)),
            Err(BotError::UnknownTopic(_))
        ));
        assert_eq!(session.active_topic(), DEFAULT_TOPIC_NAME);
    }

    #[tokio::test]
    async fn test_rename_round_trip() {
        let dir = TempDir::new().unwrap();
        let (mut session, llm) = session(&dir);
        llm.queue_text("hi");
        session.chat("hello").await.unwrap();
        let before: Vec<Turn> = session.get_history(None, Some(0)).unwrap().to_vec();

        session.new_topic(Some("other")).unwrap();
        assert_eq!(
            session.rename_topic("greetings", Some("General")).unwrap(),
            "Renamed General to greetings"
        );
        assert_eq!(session.active_topic(), "other");

        session.switch_topic(Some("greetings"), None).unwrap();
        assert_eq!(session.get_history(None, Some(0)).unwrap(), before.as_slice());
    }

    #[test]
    fn test_rename_active_topic_follows() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session(&dir);
        assert_eq!(
            session.rename_topic("main", None).unwrap(),
            "Active topic: main"
        );
        assert_eq!(session.active_topic(), "main");

        session.new_topic(Some("side")).unwrap();
        // Naming the active topic explicitly still moves the active pointer.
        session.rename_topic("side-2", Some("side")).unwrap();
        assert_eq!(session.active_topic(), "side-2");
    }

    #[test]
    fn test_rename_failures() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session(&dir);
        session.new_topic(Some("taken")).unwrap();
        assert!(matches!(
            session.rename_topic("taken", Some("General")),
            Err(BotError::DuplicateTopic(_))
        ));
        assert!(matches!(
            session.rename_topic("fresh", Some("missing")),
            Err(BotError::UnknownTopic(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_rename_keeps_active_topic_usable() {
        let dir = TempDir::new().unwrap();
        let (mut session, llm) = session(&dir);
        let blocker = dir.path().join("history_alice.json.tmp");
        std::fs::create_dir(&blocker).unwrap();

        assert!(matches!(
            session.rename_topic("renamed", None),
            Err(BotError::Io(_))
        ));
        assert_eq!(session.active_topic(), DEFAULT_TOPIC_NAME);
        assert_eq!(session.list_topics(Some(0)), vec![DEFAULT_TOPIC_NAME]);

        std::fs::remove_dir(&blocker).unwrap();
        llm.queue_text("hi");
        assert_eq!(session.chat("hello").await.unwrap(), "hi");
    }

    #[test]
    fn test_set_temperature_bounds() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session(&dir);
        for bad in [-0.01f32, 1.01, f32::NAN] {
            assert!(matches!(
                session.set_temperature(bad),
                Err(BotError::InvalidParameter(_))
            ));
        }
        for good in [0.0f32, 0.5, 1.0] {
            session.set_temperature(good).unwrap();
            assert!((session.params().temperature - good).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_set_max_output_tokens() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session(&dir);
        // text-ada-001: 2048 total, 1000 of it reserved for history.
        session.set_max_output_tokens(1048).unwrap();
        assert_eq!(session.params().max_tokens, 1048);
        assert!(matches!(
            session.set_max_output_tokens(1049),
            Err(BotError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_set_history_word_limit() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session(&dir);
        // 4096 minus the default 500 response tokens.
        session.set_history_word_limit(3596).unwrap();
        assert_eq!(session.history_word_limit(), 3596);
        assert!(matches!(
            session.set_history_word_limit(3597),
            Err(BotError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_switch_model_checks_endpoint_list() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session(&dir);
        assert_eq!(
            session.switch_model(Some("text-davinci-003")).await.unwrap(),
            "Active model: text-davinci-003"
        );
        assert!(matches!(
            session.switch_model(Some("gpt-imaginary")).await,
            Err(BotError::InvalidParameter(_))
        ));
        assert!(matches!(
            session.switch_model(None).await,
            Err(BotError::InvalidParameter(_))
        ));
        let listing = session.list_models().await.unwrap();
        assert!(listing.starts_with("text-ada-001 - "));
        assert!(session.model_info("text-curie-001").await.unwrap().contains("token limit: 2048"));
    }

    #[tokio::test]
    async fn test_raw_query_and_cheap_use_overrides() {
        let dir = TempDir::new().unwrap();
        let (session, llm) = session(&dir);
        llm.queue_text(" raw ");
        llm.queue_text("cheap");

        let overrides = QueryOverrides {
            temperature: Some(0.1),
            ..QueryOverrides::default()
        };
        assert_eq!(session.raw_query("tell me", &overrides).await.unwrap(), "raw");
        assert_eq!(session.cheap("tell me", &QueryOverrides::default()).await.unwrap(), "cheap");

        let requests = llm.recorded_requests();
        assert_eq!(requests[0].prompt, "tell me");
        assert!((requests[0].temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(requests[1].model, "text-curie-001");
        assert!(session.get_history(None, None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_splits_instruction() {
        let dir = TempDir::new().unwrap();
        let (session, llm) = session(&dir);
        llm.queue_text("the cat");
        session
            .edit("fix spelling\nteh cat", None, &QueryOverrides::default())
            .await
            .unwrap();
        let prompt = &llm.recorded_requests()[0].prompt;
        assert!(prompt.contains("instruction: fix spelling"));
        assert!(prompt.contains("Text:\nteh cat\n"));
    }

    #[tokio::test]
    async fn test_question_opens_named_topic() {
        let dir = TempDir::new().unwrap();
        let (mut session, llm) = session(&dir);
        llm.queue_text("Egg Rice Dinner");
        llm.queue_text("Fried rice!");

        let reply = session.question("what to cook with eggs and rice?").await.unwrap();
        assert_eq!(reply, "Active topic: egg-rice-dinner\nFried rice!");
        assert_eq!(session.active_topic(), "egg-rice-dinner");
        assert_eq!(session.get_history(None, None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_question_falls_back_to_generated_name() {
        let dir = TempDir::new().unwrap();
        let (mut session, llm) = session(&dir);
        llm.queue_text("?!");
        llm.queue_text("answer");

        session.question("anything").await.unwrap();
        assert!(session.active_topic().ends_with("-0"));
    }

    #[tokio::test]
    async fn test_unanswered_question_leaves_no_topic() {
        let dir = TempDir::new().unwrap();
        let (mut session, llm) = session(&dir);
        llm.queue_text("Egg Rice");
        llm.queue_error(LlmError::network("connection reset"));

        assert!(session.question("eggs?").await.is_err());
        assert_eq!(session.active_topic(), DEFAULT_TOPIC_NAME);
        assert_eq!(session.list_topics(Some(0)), vec![DEFAULT_TOPIC_NAME]);

        // A retry gets the same title instead of a generated fallback.
        llm.queue_text("Egg Rice");
        llm.queue_text("Boil");
        let reply = session.question("eggs?").await.unwrap();
        assert_eq!(reply, "Active topic: egg-rice\nBoil");
        assert_eq!(session.list_topics(Some(0)), vec![DEFAULT_TOPIC_NAME, "egg-rice"]);
    }

    #[test]
    fn test_topics_menu_marks_active() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session(&dir);
        session.new_topic(Some("notes")).unwrap();
        session.new_topic(Some(&"x".repeat(70))).unwrap();

        let menu = session.topics_menu();
        assert_eq!(menu[0], ("General".to_string(), "/switch_topic General".to_string()));
        assert_eq!(menu[1].1, "/switch_topic notes");
        assert!(menu[2].0.starts_with('*'));
        assert_eq!(menu[2].1, "/switch_topic index=1");
    }

    #[test]
    fn test_topics_menu_selects_names_with_equals_by_index() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session(&dir);
        session.new_topic(Some("a=b")).unwrap();
        session.new_topic(Some("later")).unwrap();

        let menu = session.topics_menu();
        assert_eq!(menu[1], ("a=b".to_string(), "/switch_topic index=2".to_string()));
    }

    #[test]
    fn test_describe_errors() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) = session(&dir);
        assert_eq!(session.describe_errors(None), "No errors recorded");

        session.record_error("t1", "first", "trace", Some("msg1"));
        session.record_error("t2", "second", "trace", None);
        let latest = session.describe_errors(None);
        assert!(latest.contains("second"));
        assert!(!latest.contains("first"));
        assert!(session.describe_errors(Some(2)).contains("first"));
        assert_eq!(session.error_count(), 2);
    }

    #[test]
    fn test_history_text_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history_alice.json");
        std::fs::write(
            &path,
            r#"{"General": [["hello", "hi", "2023-01-03T10:11:12.123456"]]}"#,
        )
        .unwrap();
        let store = ConversationStore::load(&path).unwrap();
        let session = ChatSession::new(
            "alice",
            store,
            Arc::new(MockLlmClient::new()),
            &SessionDefaults::default(),
        );
        assert_eq!(
            session.history_text(None, None).unwrap(),
            "2023-01-03T10:11:12.123456\n[Human]: hello\n[Bot]: hi"
        );
        assert!(matches!(
            session.history_text(Some("nope"), None),
            Err(BotError::UnknownTopic(_))
        ));
    }
}
