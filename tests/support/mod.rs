//! In-memory store fakes shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use tasktide::application::stores::{ArchiveStore, HotStore, StoreError};
use tasktide::application::todos::TodoService;
use tasktide::domain::tasks::TaskRecord;

/// Hot-tier fake with switchable read and ping failures.
#[derive(Default)]
pub struct MemoryHot {
    tasks: Mutex<Vec<TaskRecord>>,
    fail_reads: AtomicBool,
    fail_pings: AtomicBool,
}

impl MemoryHot {
    pub fn snapshot(&self) -> Vec<TaskRecord> {
        self.tasks.lock().expect("hot lock").clone()
    }

    pub fn seed(&self, tasks: Vec<TaskRecord>) {
        *self.tasks.lock().expect("hot lock") = tasks;
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_pings(&self) {
        self.fail_pings.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl HotStore for MemoryHot {
    async fn read(&self) -> Result<Vec<TaskRecord>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("read refused".to_string()));
        }
        Ok(self.snapshot())
    }

    async fn write(&self, tasks: &[TaskRecord]) -> Result<(), StoreError> {
        *self.tasks.lock().expect("hot lock") = tasks.to_vec();
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.tasks.lock().expect("hot lock").clear();
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.fail_pings.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("ping refused".to_string()));
        }
        Ok(())
    }
}

/// Archive fake with a switchable bulk-insert failure.
#[derive(Default)]
pub struct MemoryArchive {
    tasks: Mutex<Vec<TaskRecord>>,
    fail_inserts: AtomicBool,
}

impl MemoryArchive {
    pub fn snapshot(&self) -> Vec<TaskRecord> {
        self.tasks.lock().expect("archive lock").clone()
    }

    pub fn seed(&self, tasks: Vec<TaskRecord>) {
        *self.tasks.lock().expect("archive lock") = tasks;
    }

    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArchiveStore for MemoryArchive {
    async fn insert_many(&self, tasks: &[TaskRecord]) -> Result<(), StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("insert refused".to_string()));
        }
        self.tasks
            .lock()
            .expect("archive lock")
            .extend(tasks.iter().cloned());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.snapshot().into_iter().find(|task| task.id == id))
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.lock().expect("archive lock");
        let before = tasks.len();
        tasks.retain(|task| task.id != id);
        Ok(tasks.len() < before)
    }

    async fn update_completed(&self, id: &str, completed: bool) -> Result<(), StoreError> {
        let mut tasks = self.tasks.lock().expect("archive lock");
        if let Some(task) = tasks.iter_mut().find(|task| task.id == id) {
            task.completed = completed;
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<TaskRecord>, StoreError> {
        Ok(self.snapshot())
    }
}

/// A service wired to fresh in-memory stores, returned alongside the store
/// handles so tests can inspect and seed tier contents directly.
pub fn service_with_stores(
    archive: bool,
    max_hot_items: usize,
) -> (Arc<TodoService>, Arc<MemoryHot>, Option<Arc<MemoryArchive>>) {
    let hot = Arc::new(MemoryHot::default());
    let cold = archive.then(|| Arc::new(MemoryArchive::default()));
    let service = Arc::new(TodoService::new(
        Arc::clone(&hot) as Arc<dyn HotStore>,
        cold.clone().map(|cold| cold as Arc<dyn ArchiveStore>),
        max_hot_items,
    ));
    (service, hot, cold)
}

pub fn task_at(id: &str, created_at: i64) -> TaskRecord {
    TaskRecord {
        id: id.to_string(),
        text: format!("task {id}"),
        completed: false,
        created_at,
    }
}
