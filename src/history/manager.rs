//! History Manager - bounded, persisted conversation transcripts
//!
//! Information Hiding:
//! - The in-memory map is only reachable through this type
//! - Every mutation is persisted under the write lock, so concurrent
//!   callers never interleave a read-modify-write-persist sequence
//! - A failed write never rolls back memory; it is logged, and only
//!   `clear` and `save` report it to the caller

use super::{
    truncate_text, ChatMessage, ConversationSummary, HistoryMap, Role, Turn, SUMMARY_MAX_CHARS,
};
use crate::config::HistorySettings;
use crate::storage::{FileSystemStorage, HistoryStorage, StorageError};
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct HistoryManager {
    storage: Arc<dyn HistoryStorage>,
    max_history: usize,
    history: RwLock<HistoryMap>,
}

impl HistoryManager {
    pub fn new(storage: Arc<dyn HistoryStorage>, max_history: usize) -> Self {
        Self {
            storage,
            max_history,
            history: RwLock::new(HistoryMap::new()),
        }
    }

    /// Manager backed by the JSON file named in the settings
    pub fn from_settings(settings: &HistorySettings) -> Self {
        Self::new(
            Arc::new(FileSystemStorage::new(&settings.history_file)),
            settings.max_history,
        )
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Replace in-memory state with whatever the storage holds.
    /// Unsaved in-memory changes are discarded.
    pub async fn load(&self) {
        let loaded = self.storage.load().await;
        tracing::info!("[HistoryManager] Loaded {} conversations", loaded.len());
        *self.history.write().await = loaded;
    }

    /// Persist the current state
    pub async fn save(&self) -> Result<(), StorageError> {
        let history = self.history.read().await;
        self.storage.save(&history).await
    }

    /// Append a turn to `conversation_id`, evicting the oldest turns beyond
    /// `max_history`, then persist.
    pub async fn add_message(&self, conversation_id: &str, role: Role, content: impl Into<String>) {
        let mut history = self.history.write().await;

        let turns = history.entry(conversation_id.to_string()).or_default();
        turns.push(Turn::new(role, content));
        if turns.len() > self.max_history {
            let excess = turns.len() - self.max_history;
            turns.drain(..excess);
        }
        tracing::debug!(
            "[HistoryManager] Conversation '{}' now has {} turns",
            conversation_id,
            turns.len()
        );

        // Best effort: the conversation keeps going in memory
        let _ = self.persist(&history).await;
    }

    /// Role/content pairs for a conversation, oldest first
    pub async fn get_messages(&self, conversation_id: &str) -> Vec<ChatMessage> {
        let history = self.history.read().await;
        history
            .get(conversation_id)
            .map(|turns| turns.iter().map(ChatMessage::from).collect())
            .unwrap_or_default()
    }

    /// Summaries of every non-empty conversation, most recently active first
    pub async fn get_conversations(&self) -> Vec<ConversationSummary> {
        let history = self.history.read().await;

        let mut active: Vec<(&String, &Vec<Turn>)> = history
            .iter()
            .filter(|(_, turns)| !turns.is_empty())
            .collect();
        active.sort_by(|(_, a), (_, b)| last_timestamp(b).cmp(last_timestamp(a)));

        active
            .into_iter()
            .map(|(id, turns)| ConversationSummary {
                id: id.clone(),
                last_message: turns
                    .last()
                    .map(|turn| truncate_text(&turn.content, SUMMARY_MAX_CHARS))
                    .unwrap_or_default(),
                message_count: turns.len(),
            })
            .collect()
    }

    /// Every known conversation id, including emptied ones
    pub async fn conversation_ids(&self) -> Vec<String> {
        self.history.read().await.keys().cloned().collect()
    }

    pub async fn message_count(&self, conversation_id: &str) -> usize {
        self.history
            .read()
            .await
            .get(conversation_id)
            .map_or(0, Vec::len)
    }

    /// Remove one conversation, or all of them when `conversation_id` is `None`,
    /// then persist. The in-memory removal stands even if the write fails.
    pub async fn clear(&self, conversation_id: Option<&str>) -> Result<(), StorageError> {
        let mut history = self.history.write().await;

        match conversation_id {
            Some(id) => {
                if history.remove(id).is_some() {
                    tracing::info!("[HistoryManager] Cleared conversation '{}'", id);
                } else {
                    tracing::debug!("[HistoryManager] No conversation '{}' to clear", id);
                }
            }
            None => {
                history.clear();
                tracing::info!("[HistoryManager] Cleared all conversations");
            }
        }

        self.persist(&history).await
    }

    async fn persist(&self, history: &HistoryMap) -> Result<(), StorageError> {
        self.storage.save(history).await.map_err(|e| {
            tracing::warn!(
                "[HistoryManager] History kept in memory only, persistence failed: {}",
                e
            );
            e
        })
    }
}

fn last_timestamp(turns: &[Turn]) -> &str {
    turns.last().map_or("", |turn| turn.timestamp.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use tempfile::TempDir;
    use tokio::time::{sleep, Duration};

    fn manager(max_history: usize) -> HistoryManager {
        HistoryManager::new(Arc::new(InMemoryStorage::new()), max_history)
    }

    fn turn(role: Role, content: &str, timestamp: &str) -> Turn {
        Turn {
            role,
            content: content.to_string(),
            timestamp: timestamp.to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_and_get_messages() {
        let history = manager(10);
        history.add_message("c1", Role::User, "hello").await;
        history.add_message("c1", Role::Assistant, "hi").await;

        let messages = history.get_messages("c1").await;
        assert_eq!(
            messages,
            vec![
                ChatMessage::new(Role::User, "hello"),
                ChatMessage::new(Role::Assistant, "hi"),
            ]
        );
    }

    #[tokio::test]
    async fn test_get_messages_missing_conversation() {
        let history = manager(10);
        assert!(history.get_messages("nope").await.is_empty());
    }

    #[tokio::test]
    async fn test_fifo_bound_keeps_most_recent() {
        let history = manager(3);
        for i in 0..5 {
            history.add_message("c1", Role::User, format!("m{}", i)).await;
        }

        let contents: Vec<String> = history
            .get_messages("c1")
            .await
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_zero_max_history_keeps_nothing() {
        let history = manager(0);
        history.add_message("c1", Role::User, "gone").await;

        assert!(history.get_messages("c1").await.is_empty());
        assert!(history.get_conversations().await.is_empty());
        assert_eq!(history.conversation_ids().await, vec!["c1".to_string()]);
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let history = manager(2);
        history.add_message("b", Role::User, "keep me").await;
        for i in 0..4 {
            history.add_message("a", Role::User, format!("a{}", i)).await;
        }

        assert_eq!(history.message_count("a").await, 2);
        assert_eq!(
            history.get_messages("b").await,
            vec![ChatMessage::new(Role::User, "keep me")]
        );
    }

    #[tokio::test]
    async fn test_clear_single_and_missing() {
        let history = manager(10);
        history.add_message("c1", Role::User, "one").await;
        history.add_message("c2", Role::User, "two").await;

        history.clear(Some("missing-id")).await.unwrap();
        assert_eq!(history.message_count("c1").await, 1);
        assert_eq!(history.message_count("c2").await, 1);

        history.clear(Some("c1")).await.unwrap();
        assert!(history.get_messages("c1").await.is_empty());
        assert_eq!(history.message_count("c2").await, 1);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let history = manager(10);
        history.add_message("c1", Role::User, "one").await;
        history.add_message("c2", Role::User, "two").await;

        history.clear(None).await.unwrap();
        assert!(history.get_conversations().await.is_empty());
        assert!(history.conversation_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_summary_truncation() {
        let history = manager(10);
        let short = "s".repeat(50);
        let long = "l".repeat(80);
        history.add_message("short", Role::User, short.clone()).await;
        history.add_message("long", Role::User, long).await;

        let summaries = history.get_conversations().await;
        let by_id = |id: &str| summaries.iter().find(|s| s.id == id).unwrap().clone();

        assert_eq!(by_id("short").last_message, short);
        let truncated = by_id("long").last_message;
        assert_eq!(truncated.chars().count(), 50);
        assert_eq!(truncated, format!("{}...", "l".repeat(47)));
    }

    #[tokio::test]
    async fn test_conversations_ordered_by_latest_activity() {
        let history = manager(10);
        history.add_message("c1", Role::User, "a").await;
        sleep(Duration::from_millis(5)).await;
        history.add_message("c1", Role::Assistant, "b").await;
        sleep(Duration::from_millis(5)).await;
        history.add_message("c2", Role::User, "c").await;

        let summaries = history.get_conversations().await;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, "c2");
        assert_eq!(summaries[0].message_count, 1);
        assert_eq!(summaries[0].last_message, "c");
        assert_eq!(summaries[1].id, "c1");
        assert_eq!(summaries[1].message_count, 2);
        assert_eq!(summaries[1].last_message, "b");
    }

    #[tokio::test]
    async fn test_sort_uses_stored_timestamps() {
        let mut seeded = HistoryMap::new();
        seeded.insert(
            "old".to_string(),
            vec![turn(Role::User, "x", "2023-01-01T00:00:00.000000")],
        );
        seeded.insert(
            "new".to_string(),
            vec![
                turn(Role::User, "y", "2022-01-01T00:00:00.000000"),
                turn(Role::Assistant, "z", "2024-01-01T00:00:00.000000"),
            ],
        );
        seeded.insert("empty".to_string(), vec![]);

        let history = HistoryManager::new(Arc::new(InMemoryStorage::with_history(seeded)), 10);
        history.load().await;

        let ids: Vec<String> = history
            .get_conversations()
            .await
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_every_mutation_is_persisted() {
        let storage = InMemoryStorage::new();
        let history = HistoryManager::new(Arc::new(storage.clone()), 10);

        history.add_message("c1", Role::User, "hello").await;
        assert_eq!(storage.snapshot().await["c1"].len(), 1);

        history.clear(Some("c1")).await.unwrap();
        assert!(storage.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_through_file() {
        let temp_dir = TempDir::new().unwrap();
        let settings = HistorySettings {
            history_file: temp_dir.path().join("data").join("history.json"),
            max_history: 10,
        };

        let first = HistoryManager::from_settings(&settings);
        first.add_message("c1", Role::User, "question").await;
        first.add_message("c1", Role::Assistant, "answer").await;
        first.add_message("c2", Role::System, "context").await;

        let second = HistoryManager::from_settings(&settings);
        second.load().await;

        assert_eq!(second.get_messages("c1").await, first.get_messages("c1").await);
        assert_eq!(second.get_messages("c2").await, first.get_messages("c2").await);
        assert_eq!(
            second.get_conversations().await,
            first.get_conversations().await
        );
    }

    #[tokio::test]
    async fn test_corrupted_file_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history.json");
        std::fs::write(&path, "not json").unwrap();

        let history = HistoryManager::new(Arc::new(FileSystemStorage::new(&path)), 10);
        history.load().await;

        assert!(history.conversation_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_failure_keeps_memory_state() {
        let temp_dir = TempDir::new().unwrap();
        let history =
            HistoryManager::new(Arc::new(FileSystemStorage::new(temp_dir.path())), 10);

        history.add_message("c1", Role::User, "still here").await;

        assert_eq!(history.message_count("c1").await, 1);
        assert!(history.save().await.is_err());
    }

    #[tokio::test]
    async fn test_clear_reports_save_failure() {
        let temp_dir = TempDir::new().unwrap();
        let history =
            HistoryManager::new(Arc::new(FileSystemStorage::new(temp_dir.path())), 10);
        history.add_message("c1", Role::User, "one").await;
        history.add_message("c2", Role::User, "two").await;

        assert!(history.clear(Some("c1")).await.is_err());
        assert_eq!(history.message_count("c1").await, 0);
        assert_eq!(history.message_count("c2").await, 1);
    }

    #[tokio::test]
    async fn test_clear_writes_file_once() {
        let storage = InMemoryStorage::new();
        let history = HistoryManager::new(Arc::new(storage.clone()), 10);
        history.add_message("c1", Role::User, "one").await;
        history.add_message("c2", Role::User, "two").await;
        let saves_before = storage.save_count();

        history.clear(Some("c1")).await.unwrap();

        let snapshot = storage.snapshot().await;
        assert_eq!(storage.save_count(), saves_before + 1);
        assert!(!snapshot.contains_key("c1"));
        assert!(snapshot.contains_key("c2"));
    }

    #[tokio::test]
    async fn test_malformed_turn_survives_next_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history.json");
        std::fs::write(
            &path,
            r#"{
  "keep": [
    {"role": "user", "content": "important", "timestamp": "2024-05-01T10:00:00.000000"}
  ],
  "odd": [
    {"role": "tool", "content": "unsupported", "timestamp": "2024-05-01T10:00:01.000000"}
  ]
}"#,
        )
        .unwrap();

        let history = HistoryManager::new(Arc::new(FileSystemStorage::new(&path)), 10);
        history.load().await;
        assert_eq!(history.message_count("keep").await, 1);

        history.add_message("new", Role::User, "hello").await;

        let reloaded = HistoryManager::new(Arc::new(FileSystemStorage::new(&path)), 10);
        reloaded.load().await;
        assert_eq!(
            reloaded.get_messages("keep").await,
            vec![ChatMessage::new(Role::User, "important")]
        );
        assert_eq!(reloaded.message_count("new").await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history.json");
        let history = Arc::new(HistoryManager::new(
            Arc::new(FileSystemStorage::new(&path)),
            100,
        ));

        let mut handles = Vec::new();
        for i in 0..20 {
            let history = Arc::clone(&history);
            handles.push(tokio::spawn(async move {
                let id = if i % 2 == 0 { "even" } else { "odd" };
                history.add_message(id, Role::User, format!("msg {}", i)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let reloaded = HistoryManager::new(Arc::new(FileSystemStorage::new(&path)), 100);
        reloaded.load().await;
        assert_eq!(reloaded.message_count("even").await, 10);
        assert_eq!(reloaded.message_count("odd").await, 10);
    }
}
