//! File System History Storage
//!
//! Information Hiding:
//! - File path and JSON serialization format hidden from users
//! - Parent directory creation handled on save
//! - Corrupted or missing files degrade to an empty history

use super::{HistoryStorage, StorageError};
use crate::history::{HistoryMap, Turn};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;

/// File system storage - all conversations live in one JSON file
pub struct FileSystemStorage {
    path: PathBuf,
}

impl FileSystemStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn write(&self, history: &HistoryMap) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }

        let json = serde_json::to_string_pretty(history)?;
        fs::write(&self.path, json)
            .await
            .map_err(|e| self.io_error(e))
    }
}

#[async_trait]
impl HistoryStorage for FileSystemStorage {
    async fn load(&self) -> HistoryMap {
        if !self.path.exists() {
            tracing::debug!("[FileSystemStorage] No history file at {:?}", self.path);
            return HistoryMap::new();
        }

        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(
                    "[FileSystemStorage] Could not read history {:?}: {}. Starting fresh.",
                    self.path,
                    e
                );
                return HistoryMap::new();
            }
        };

        if json.trim().is_empty() {
            return HistoryMap::new();
        }

        // Only the outer shape is required; turns are checked one by one
        let raw = match serde_json::from_str::<BTreeMap<String, Vec<Value>>>(&json) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    "[FileSystemStorage] Could not parse history {:?}: {}. Starting fresh.",
                    self.path,
                    e
                );
                return HistoryMap::new();
            }
        };

        let history: HistoryMap = raw
            .into_iter()
            .map(|(id, turns)| {
                let turns = turns
                    .into_iter()
                    .filter_map(|turn| match serde_json::from_value::<Turn>(turn) {
                        Ok(turn) => Some(turn),
                        Err(e) => {
                            tracing::warn!(
                                "[FileSystemStorage] Skipping malformed turn in '{}': {}",
                                id,
                                e
                            );
                            None
                        }
                    })
                    .collect();
                (id, turns)
            })
            .collect();

        tracing::debug!(
            "[FileSystemStorage] Loaded {} conversations from {:?}",
            history.len(),
            self.path
        );
        history
    }

    async fn save(&self, history: &HistoryMap) -> Result<(), StorageError> {
        match self.write(history).await {
            Ok(()) => {
                tracing::debug!(
                    "[FileSystemStorage] Saved {} conversations to {:?}",
                    history.len(),
                    self.path
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[FileSystemStorage] Could not save history: {}", e);
                Err(e)
            }
        }
    }
}
