//! In-Memory History Storage
//!
//! Information Hiding:
//! - Snapshot storage hidden behind async interface
//! - Suitable for testing and ephemeral sessions

use super::{HistoryStorage, StorageError};
use crate::history::HistoryMap;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage holding the last saved snapshot.
/// Data is lost when process terminates.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    snapshot: Arc<RwLock<HistoryMap>>,
    saves: Arc<AtomicUsize>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the storage as if `history` had been saved earlier
    pub fn with_history(history: HistoryMap) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(history)),
            saves: Arc::default(),
        }
    }

    /// Copy of the last saved snapshot
    pub async fn snapshot(&self) -> HistoryMap {
        self.snapshot.read().await.clone()
    }

    /// Number of successful `save` calls so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryStorage for InMemoryStorage {
    async fn load(&self) -> HistoryMap {
        let history = self.snapshot.read().await.clone();
        tracing::debug!("[InMemoryStorage] Loaded {} conversations", history.len());
        history
    }

    async fn save(&self, history: &HistoryMap) -> Result<(), StorageError> {
        *self.snapshot.write().await = history.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("[InMemoryStorage] Saved {} conversations", history.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{Role, Turn};

    #[tokio::test]
    async fn test_save_and_load() {
        let storage = InMemoryStorage::new();
        let mut history = HistoryMap::new();
        history.insert(
            "test-session".to_string(),
            vec![Turn::new(Role::User, "Hello"), Turn::new(Role::Assistant, "Hi there")],
        );

        storage.save(&history).await.unwrap();
        let loaded = storage.load().await;

        assert_eq!(loaded["test-session"].len(), 2);
        assert_eq!(loaded["test-session"][0].content, "Hello");
        assert_eq!(loaded["test-session"][1].content, "Hi there");
    }

    #[tokio::test]
    async fn test_load_empty() {
        let storage = InMemoryStorage::new();
        assert!(storage.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_snapshot() {
        let storage = InMemoryStorage::new();
        let observer = storage.clone();
        let mut history = HistoryMap::new();
        history.insert("a".to_string(), vec![Turn::new(Role::User, "x")]);

        storage.save(&history).await.unwrap();
        assert_eq!(observer.snapshot().await, history);
        assert_eq!(observer.save_count(), 1);
    }
}
