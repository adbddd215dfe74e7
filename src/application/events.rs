//! Broadcast fan-out of the merged list to connected clients.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::tasks::TaskRecord;

const METRIC_BROADCAST_TOTAL: &str = "tasktide_broadcast_total";

/// One full snapshot of the merged list. Snapshots are self-contained, so a
/// subscriber that misses one has lost nothing once the next arrives.
pub type TaskSnapshot = Arc<[TaskRecord]>;

/// Fan-out handle pushing the merged list to every connected client.
///
/// Wraps a broadcast channel and is cheap to clone. Publishing with no
/// subscribers drops the snapshot silently.
#[derive(Clone)]
pub struct TodoFeed {
    tx: broadcast::Sender<TaskSnapshot>,
}

impl TodoFeed {
    /// Create a feed with the given buffer capacity per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, tasks: Vec<TaskRecord>) {
        let snapshot: TaskSnapshot = Arc::from(tasks);
        metrics::counter!(METRIC_BROADCAST_TOTAL).increment(1);
        debug!(
            tasks = snapshot.len(),
            subscribers = self.tx.receiver_count(),
            "Publishing list snapshot"
        );
        let _ = self.tx.send(snapshot);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskSnapshot> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
