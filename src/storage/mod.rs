//! Conversation Storage Abstraction
//!
//! Information Hiding:
//! - Storage backend implementation details hidden behind trait
//! - The whole conversation map is loaded and saved as one document
//! - Backends hold no state of their own beyond where the document lives

use crate::history::HistoryMap;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

pub mod filesystem;
pub mod memory;

pub use filesystem::FileSystemStorage;
pub use memory::InMemoryStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize conversation history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Trait defining conversation history persistence
///
/// Implementations must tolerate a missing or unreadable store on `load`
/// by returning an empty map; only `save` reports failure.
#[async_trait]
pub trait HistoryStorage: Send + Sync {
    /// Load every conversation. Never fails: problems yield an empty map.
    async fn load(&self) -> HistoryMap;

    /// Overwrite the stored document with `history`
    async fn save(&self, history: &HistoryMap) -> Result<(), StorageError>;
}
