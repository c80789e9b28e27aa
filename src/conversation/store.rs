//! Flat-file conversation store
//!
//! One JSON object per user mapping topic name to an array of
//! `[prompt, response, timestamp]` triples. Topic order in the file is the
//! creation order and is preserved across load/save.

use super::Turn;
use crate::error::{BotError, BotResult};
use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Topic every fresh store starts with
pub const DEFAULT_TOPIC_NAME: &str = "General";

/// Insertion-ordered topic map as it appears on disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TopicMap(Vec<(String, Vec<Turn>)>);

impl TopicMap {
    fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|(n, _)| n == name)
    }
}

impl Serialize for TopicMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, turns) in &self.0 {
            map.serialize_entry(name, turns)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TopicMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TopicMapVisitor;

        impl<'de> Visitor<'de> for TopicMapVisitor {
            type Value = TopicMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping topic names to turn arrays")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TopicMap, A::Error> {
                let mut topics = TopicMap::default();
                while let Some((name, turns)) = access.next_entry::<String, Vec<Turn>>()? {
                    // A repeated key keeps its first position and its last value.
                    match topics.position(&name) {
                        Some(idx) => topics.0[idx].1 = turns,
                        None => topics.0.push((name, turns)),
                    }
                }
                Ok(topics)
            }
        }

        deserializer.deserialize_map(TopicMapVisitor)
    }
}

/// A user's topics, bound to the file they persist to
#[derive(Debug, Clone)]
pub struct ConversationStore {
    path: PathBuf,
    topics: TopicMap,
}

impl ConversationStore {
    /// Load the store at `path`, or start a fresh one if the file is missing
    pub fn load(path: impl Into<PathBuf>) -> BotResult<Self> {
        let path = path.into();
        let topics = match fs::read_to_string(&path) {
            Ok(content) => {
                serde_json::from_str::<TopicMap>(&content).map_err(|e| BotError::CorruptState {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TopicMap::default(),
            Err(e) => return Err(e.into()),
        };

        let mut store = Self { path, topics };
        if store.topics.0.is_empty() {
            store
                .topics
                .0
                .push((DEFAULT_TOPIC_NAME.to_string(), Vec::new()));
        }

        tracing::debug!(
            path = %store.path.display(),
            topics = store.topics.0.len(),
            "Loaded conversation store"
        );
        Ok(store)
    }

    /// Rewrite the whole file through a sibling temp file and a rename
    pub fn save(&self) -> BotResult<()> {
        let json = serde_json::to_vec_pretty(&self.topics)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = temp_path_for(&self.path);
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, name: &str) -> bool {
        self.topics.position(name).is_some()
    }

    /// All turns of a topic, oldest first
    pub fn turns(&self, topic: &str) -> BotResult<&[Turn]> {
        self.topics
            .0
            .iter()
            .find(|(n, _)| n == topic)
            .map(|(_, turns)| turns.as_slice())
            .ok_or_else(|| BotError::UnknownTopic(topic.to_string()))
    }

    /// The last `limit` turns of a topic; `0` means all
    pub fn history(&self, topic: &str, limit: usize) -> BotResult<&[Turn]> {
        let turns = self.turns(topic)?;
        Ok(tail(turns, limit))
    }

    /// Append a turn stamped with the current time and persist
    pub fn append_turn(&mut self, topic: &str, prompt: &str, response: &str) -> BotResult<()> {
        let idx = self
            .topics
            .position(topic)
            .ok_or_else(|| BotError::UnknownTopic(topic.to_string()))?;
        self.topics.0[idx].1.push(Turn::new(prompt, response));
        self.save_or_undo(|topics| {
            topics.0[idx].1.pop();
        })
    }

    /// Add an empty topic at the end of the order and persist
    pub fn create_topic(&mut self, name: &str) -> BotResult<()> {
        if self.contains(name) {
            return Err(BotError::DuplicateTopic(name.to_string()));
        }
        self.topics.0.push((name.to_string(), Vec::new()));
        self.save_or_undo(|topics| {
            topics.0.pop();
        })
    }

    /// Remove a topic and its turns and persist; the last topic cannot go
    pub fn delete_topic(&mut self, name: &str) -> BotResult<()> {
        let idx = self
            .topics
            .position(name)
            .ok_or_else(|| BotError::UnknownTopic(name.to_string()))?;
        if self.topics.0.len() == 1 {
            return Err(BotError::invalid("Cannot delete the only topic"));
        }
        let removed = self.topics.0.remove(idx);
        self.save_or_undo(move |topics| topics.0.insert(idx, removed))
    }

    /// Move `old`'s turns under `new`, which lands at the end of the order
    pub fn rename_topic(&mut self, old: &str, new: &str) -> BotResult<()> {
        if self.contains(new) {
            return Err(BotError::DuplicateTopic(new.to_string()));
        }
        let idx = self
            .topics
            .position(old)
            .ok_or_else(|| BotError::UnknownTopic(old.to_string()))?;
        let (_, turns) = self.topics.0.remove(idx);
        self.topics.0.push((new.to_string(), turns));
        let old = old.to_string();
        self.save_or_undo(move |topics| {
            if let Some((_, turns)) = topics.0.pop() {
                topics.0.insert(idx, (old, turns));
            }
        })
    }

    /// Persist, or revert the in-memory change with `undo` when the write fails
    fn save_or_undo(&mut self, undo: impl FnOnce(&mut TopicMap)) -> BotResult<()> {
        let result = self.save();
        if let Err(e) = &result {
            tracing::warn!(path = %self.path.display(), error = %e, "Save failed, change reverted");
            undo(&mut self.topics);
        }
        result
    }

    /// The most recently created `limit` topic names, oldest first; `0` means all
    pub fn list_topics(&self, limit: Option<usize>) -> Vec<&str> {
        let names: Vec<&str> = self.topics.0.iter().map(|(n, _)| n.as_str()).collect();
        tail(&names, limit.unwrap_or(0)).to_vec()
    }

    /// Topic at a 1-based position counted from the most recent one
    pub fn topic_from_end(&self, index: usize) -> Option<&str> {
        let len = self.topics.0.len();
        if index == 0 || index > len {
            return None;
        }
        Some(self.topics.0[len - index].0.as_str())
    }

    /// Best-effort guess at which topic `text` refers to.
    ///
    /// A case-insensitive exact match wins outright; otherwise the topic
    /// names are fuzzy-scored and the single best one is returned. No
    /// candidates, or a tie for the best score, gives `None`.
    pub fn resolve_topic_by_fuzzy_name(&self, text: &str) -> Option<String> {
        let needle = text.trim();
        if needle.is_empty() {
            return None;
        }

        let exact: Vec<&str> = self
            .topics
            .0
            .iter()
            .map(|(n, _)| n.as_str())
            .filter(|n| n.eq_ignore_ascii_case(needle))
            .collect();
        if let [only] = exact.as_slice() {
            return Some((*only).to_string());
        }

        let mut matcher = Matcher::new(Config::DEFAULT);
        let pattern = Pattern::parse(needle, CaseMatching::Ignore, Normalization::Smart);
        let mut matches = pattern.match_list(self.topics.0.iter().map(|(n, _)| n.as_str()), &mut matcher);
        matches.sort_by(|a, b| b.1.cmp(&a.1));

        match matches.as_slice() {
            [] => None,
            [(best, _)] => Some((*best).to_string()),
            [(best, top), (_, second), ..] if top > second => Some((*best).to_string()),
            _ => None,
        }
    }
}

fn tail<T>(items: &[T], limit: usize) -> &[T] {
    if limit == 0 || limit >= items.len() {
        items
    } else {
        &items[items.len() - limit..]
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
