//! The two-tier todo controller.
//!
//! One coordinator owns both store handles and keeps a single logical list
//! coherent across them: recent tasks live in the hot tier, and the add path
//! drains everything past the threshold into the archive. Lookups are
//! hot-first and exclusive; the archive is consulted only when an id is
//! absent from the hot set.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::stores::{ArchiveStore, HotStore, StoreError, StoreTier};
use crate::domain::tasks::{TaskRecord, sort_newest_first};

const SOURCE: &str = "application::todos::TodoService";

const METRIC_MIGRATION_TOTAL: &str = "tasktide_migration_total";
const METRIC_MIGRATION_MOVED_TOTAL: &str = "tasktide_migration_moved_total";
const METRIC_ARCHIVE_FAILURE_TOTAL: &str = "tasktide_archive_failure_total";

/// Result of an add: the created task, plus the migration report when the
/// threshold was crossed.
#[derive(Debug)]
pub struct AddOutcome {
    pub task: TaskRecord,
    pub migration: Option<MigrationReport>,
}

/// What a threshold-triggered migration actually did.
#[derive(Debug)]
pub struct MigrationReport {
    /// Tasks handed to the archive; zero when the bulk insert failed.
    pub moved: usize,
    pub archive_error: Option<StoreError>,
}

/// Result of a delete or toggle.
///
/// `applied` names the tier that accepted the change; `None` means the id
/// matched nothing reachable and the call was a no-op. A swallowed archive
/// failure is carried in `archive_error` so callers can see what the log
/// already recorded.
#[derive(Debug)]
pub struct MutationOutcome {
    pub applied: Option<StoreTier>,
    pub archive_error: Option<StoreError>,
}

impl MutationOutcome {
    fn applied(tier: StoreTier) -> Self {
        Self {
            applied: Some(tier),
            archive_error: None,
        }
    }

    fn miss() -> Self {
        Self {
            applied: None,
            archive_error: None,
        }
    }

    fn archive_failed(err: StoreError) -> Self {
        Self {
            applied: None,
            archive_error: Some(err),
        }
    }
}

/// The merged view of both tiers, newest first. A failed archive read leaves
/// only the hot tasks and records the error.
#[derive(Debug)]
pub struct MergedList {
    pub tasks: Vec<TaskRecord>,
    pub archive_error: Option<StoreError>,
}

/// Coordinator for the hot and cold tiers.
///
/// Holds the store handles injected at startup. An absent archive handle IS
/// the degraded hot-only mode: it is decided once at boot and never
/// reconsidered. Mutations serialize behind a process-local mutex so the
/// read-modify-write cycle on the single hot blob cannot lose updates within
/// this process; across processes the blob stays last-writer-wins.
pub struct TodoService {
    hot: Arc<dyn HotStore>,
    archive: Option<Arc<dyn ArchiveStore>>,
    max_hot_items: usize,
    write_guard: Mutex<()>,
}

impl TodoService {
    pub fn new(
        hot: Arc<dyn HotStore>,
        archive: Option<Arc<dyn ArchiveStore>>,
        max_hot_items: usize,
    ) -> Self {
        Self {
            hot,
            archive,
            max_hot_items,
            write_guard: Mutex::new(()),
        }
    }

    /// Whether the cold tier was reachable at startup. Permanent for the
    /// process lifetime.
    pub fn archive_available(&self) -> bool {
        self.archive.is_some()
    }

    /// Probe the hot tier. Used by the health endpoint; the controller owns
    /// the store handles, so the probe goes through it.
    pub async fn ping_hot(&self) -> Result<(), StoreError> {
        self.hot.ping().await
    }

    /// Create a task, append it to the hot set, and drain the old hot set
    /// into the archive when the threshold is crossed.
    ///
    /// Only hot-tier failures escape as `Err`; a failed bulk insert is
    /// reported inside the outcome and never blocks the new task's write.
    pub async fn add(&self, text: &str) -> Result<AddOutcome, StoreError> {
        let _guard = self.write_guard.lock().await;

        let task = TaskRecord::new(text);
        let mut hot = self.hot.read().await?;
        hot.push(task.clone());

        let migration = if hot.len() > self.max_hot_items {
            match self.archive.as_deref() {
                Some(archive) => {
                    // Everything read before the append moves out; the new
                    // task stays behind as the only hot entry.
                    let outgoing: Vec<TaskRecord> = hot.drain(..hot.len() - 1).collect();
                    Some(self.migrate(archive, outgoing).await)
                }
                None => {
                    debug!(
                        size = hot.len(),
                        threshold = self.max_hot_items,
                        "Archive offline, hot set growing past threshold"
                    );
                    None
                }
            }
        } else {
            None
        };

        self.hot.write(&hot).await?;
        Ok(AddOutcome { task, migration })
    }

    /// Remove a task by id: from the hot set if present there, otherwise
    /// best-effort from the archive. A miss in both tiers is a no-op.
    pub async fn delete(&self, id: &str) -> Result<MutationOutcome, StoreError> {
        let _guard = self.write_guard.lock().await;

        let mut hot = self.hot.read().await?;
        if let Some(index) = hot.iter().position(|task| task.id == id) {
            hot.remove(index);
            self.hot.write(&hot).await?;
            return Ok(MutationOutcome::applied(StoreTier::Hot));
        }

        let Some(archive) = self.archive.as_deref() else {
            return Ok(MutationOutcome::miss());
        };

        match archive.delete_by_id(id).await {
            Ok(true) => Ok(MutationOutcome::applied(StoreTier::Archive)),
            Ok(false) => Ok(MutationOutcome::miss()),
            Err(err) => {
                archive_failure("delete_by_id", &err);
                Ok(MutationOutcome::archive_failed(err))
            }
        }
    }

    /// Flip a task's `completed` flag: in the hot set if present there,
    /// otherwise best-effort in the archive.
    pub async fn toggle(&self, id: &str) -> Result<MutationOutcome, StoreError> {
        let _guard = self.write_guard.lock().await;

        let mut hot = self.hot.read().await?;
        if let Some(task) = hot.iter_mut().find(|task| task.id == id) {
            task.completed = !task.completed;
            self.hot.write(&hot).await?;
            return Ok(MutationOutcome::applied(StoreTier::Hot));
        }

        let Some(archive) = self.archive.as_deref() else {
            return Ok(MutationOutcome::miss());
        };

        let found = match archive.find_by_id(id).await {
            Ok(found) => found,
            Err(err) => {
                archive_failure("find_by_id", &err);
                return Ok(MutationOutcome::archive_failed(err));
            }
        };
        let Some(task) = found else {
            return Ok(MutationOutcome::miss());
        };

        match archive.update_completed(id, !task.completed).await {
            Ok(()) => Ok(MutationOutcome::applied(StoreTier::Archive)),
            Err(err) => {
                archive_failure("update_completed", &err);
                Ok(MutationOutcome::archive_failed(err))
            }
        }
    }

    /// The merged view: hot plus archive, newest first. An archive read
    /// failure degrades to hot-only for this call and is recorded in the
    /// outcome.
    pub async fn list(&self) -> Result<MergedList, StoreError> {
        let mut tasks = self.hot.read().await?;
        let mut archive_error = None;

        if let Some(archive) = self.archive.as_deref() {
            match archive.list_all().await {
                Ok(cold) => tasks.extend(cold),
                Err(err) => {
                    archive_failure("list_all", &err);
                    archive_error = Some(err);
                }
            }
        }

        sort_newest_first(&mut tasks);
        Ok(MergedList {
            tasks,
            archive_error,
        })
    }

    async fn migrate(
        &self,
        archive: &dyn ArchiveStore,
        outgoing: Vec<TaskRecord>,
    ) -> MigrationReport {
        metrics::counter!(METRIC_MIGRATION_TOTAL).increment(1);

        if let Err(err) = archive.insert_many(&outgoing).await {
            metrics::counter!(METRIC_ARCHIVE_FAILURE_TOTAL, "operation" => "insert_many")
                .increment(1);
            warn!(
                source = SOURCE,
                error = %err,
                count = outgoing.len(),
                "Migration bulk insert failed; dropping the old hot set and keeping the new task"
            );
            return MigrationReport {
                moved: 0,
                archive_error: Some(err),
            };
        }

        // The key is rewritten right after; a failed clear only costs the
        // brief window where the old blob is still visible.
        if let Err(err) = self.hot.clear().await {
            warn!(
                source = SOURCE,
                error = %err,
                "Hot clear after migration failed; overwriting instead"
            );
        }

        metrics::counter!(METRIC_MIGRATION_MOVED_TOTAL).increment(outgoing.len() as u64);
        info!(moved = outgoing.len(), "Moved todos to the archive");
        MigrationReport {
            moved: outgoing.len(),
            archive_error: None,
        }
    }
}

fn archive_failure(operation: &'static str, err: &StoreError) {
    metrics::counter!(METRIC_ARCHIVE_FAILURE_TOTAL, "operation" => operation).increment(1);
    warn!(
        source = SOURCE,
        operation,
        error = %err,
        "Archive operation failed; continuing without it"
    );
}

// =============================================================================
// Tests
// =============================================================================
