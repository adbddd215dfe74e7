//! Store traits describing the two persistence tiers.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::tasks::TaskRecord;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("stored payload could not be decoded: {0}")]
    Serialization(String),
    #[error("store unreachable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }

    pub fn serialization(err: impl std::fmt::Display) -> Self {
        Self::Serialization(err.to_string())
    }

    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// The tier an operation ended up touching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTier {
    Hot,
    Archive,
}

/// Capacity-bounded key-value tier holding the recent tasks.
///
/// The whole hot set lives under one key as a JSON array; there is no
/// partial-update primitive. Every mutation reads the full set, modifies it
/// in memory, and writes the full set back, so writers are last-writer-wins
/// with no concurrency check at the store.
#[async_trait]
pub trait HotStore: Send + Sync {
    /// Parse the stored blob, or return the empty set when the key is absent.
    async fn read(&self) -> Result<Vec<TaskRecord>, StoreError>;

    /// Serialize and store, fully overwriting prior content.
    async fn write(&self, tasks: &[TaskRecord]) -> Result<(), StoreError>;

    /// Remove the key entirely.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Connectivity probe, used at boot and by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Unbounded document tier holding migrated tasks, addressed by the task's
/// own `id` field.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn insert_many(&self, tasks: &[TaskRecord]) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<TaskRecord>, StoreError>;

    /// Deleting an absent id is a successful no-op; the flag reports whether
    /// a stored task matched.
    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError>;

    /// `completed` is the only mutable task field.
    async fn update_completed(&self, id: &str, completed: bool) -> Result<(), StoreError>;

    async fn list_all(&self) -> Result<Vec<TaskRecord>, StoreError>;
}
