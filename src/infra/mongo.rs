//! MongoDB-backed archive store.
//!
//! Documents carry the task record shape verbatim and are addressed by the
//! task's own `id` field; the collection's `_id` values are never consulted.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use tracing::debug;

use crate::application::stores::{ArchiveStore, StoreError};
use crate::config::ArchiveSettings;
use crate::domain::tasks::TaskRecord;

pub struct MongoArchive {
    tasks: Collection<TaskRecord>,
}

impl MongoArchive {
    /// Connect, then force a round trip so an unreachable server surfaces
    /// now rather than on first use. A failure here leaves the process in
    /// hot-only mode for its remaining lifetime.
    pub async fn connect(settings: &ArchiveSettings) -> Result<Self, StoreError> {
        let Some(uri) = settings.uri.as_deref() else {
            return Err(StoreError::Unavailable(
                "no archive uri configured".to_string(),
            ));
        };

        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(StoreError::unavailable)?;
        options.connect_timeout = Some(settings.connect_timeout);
        options.server_selection_timeout = Some(settings.server_selection_timeout);
        options.direct_connection = Some(settings.direct_connection);

        let client = Client::with_options(options).map_err(StoreError::unavailable)?;
        let database = client.database(&settings.database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(StoreError::unavailable)?;

        debug!(
            database = %settings.database,
            collection = %settings.collection,
            "Archive store connected"
        );
        Ok(Self {
            tasks: database.collection(&settings.collection),
        })
    }
}

#[async_trait]
impl ArchiveStore for MongoArchive {
    async fn insert_many(&self, tasks: &[TaskRecord]) -> Result<(), StoreError> {
        self.tasks
            .insert_many(tasks)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
        self.tasks
            .find_one(doc! { "id": id })
            .await
            .map_err(StoreError::backend)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let result = self
            .tasks
            .delete_one(doc! { "id": id })
            .await
            .map_err(StoreError::backend)?;
        Ok(result.deleted_count > 0)
    }

    async fn update_completed(&self, id: &str, completed: bool) -> Result<(), StoreError> {
        self.tasks
            .update_one(doc! { "id": id }, doc! { "$set": { "completed": completed } })
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<TaskRecord>, StoreError> {
        let cursor = self
            .tasks
            .find(doc! {})
            .await
            .map_err(StoreError::backend)?;
        cursor.try_collect().await.map_err(StoreError::backend)
    }
}
