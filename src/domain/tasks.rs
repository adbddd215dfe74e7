//! The task entity shared by both storage tiers.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A single todo item, shaped exactly like its persisted record.
///
/// The same serialized form travels everywhere: the hot store's JSON blob,
/// the archive's documents, and every wire frame. `id` is a UUID rendered to
/// a string at creation and treated as an opaque equality key afterwards.
/// `created_at` is milliseconds since the Unix epoch and the sole sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub text: String,
    pub completed: bool,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl TaskRecord {
    /// Build a fresh task: new id, not completed, stamped with the current
    /// wall-clock time.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            completed: false,
            created_at: epoch_millis_now(),
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn epoch_millis_now() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Sort newest first. Ties keep their relative order, which callers must not
/// rely on.
pub fn sort_newest_first(tasks: &mut [TaskRecord]) {
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
