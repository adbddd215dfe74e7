//! Redis-backed hot store.
//!
//! The whole hot set lives under a single string key as a JSON array, so
//! every operation here moves the full blob. One multiplexed connection is
//! established at boot and cloned per call.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use crate::application::stores::{HotStore, StoreError};
use crate::config::HotStoreSettings;
use crate::domain::tasks::TaskRecord;

pub struct RedisHotStore {
    connection: redis::aio::MultiplexedConnection,
    key: String,
}

impl RedisHotStore {
    /// Connect and verify the server responds. A failure here is fatal to
    /// the process.
    pub async fn connect(settings: &HotStoreSettings) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(connection_info(settings)).map_err(StoreError::unavailable)?;
        let mut connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::unavailable)?;
        let _pong: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(StoreError::unavailable)?;

        debug!(
            host = %settings.host,
            port = settings.port,
            key = %settings.key,
            "Hot store connected"
        );
        Ok(Self {
            connection,
            key: settings.key.clone(),
        })
    }
}

#[async_trait]
impl HotStore for RedisHotStore {
    async fn read(&self) -> Result<Vec<TaskRecord>, StoreError> {
        let mut connection = self.connection.clone();
        let blob: Option<String> = connection
            .get(&self.key)
            .await
            .map_err(StoreError::backend)?;
        decode_blob(blob)
    }

    async fn write(&self, tasks: &[TaskRecord]) -> Result<(), StoreError> {
        let blob = serde_json::to_string(tasks).map_err(StoreError::serialization)?;
        let mut connection = self.connection.clone();
        let _: () = connection
            .set(&self.key, blob)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: () = connection
            .del(&self.key)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _pong: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }
}

fn connection_info(settings: &HotStoreSettings) -> redis::ConnectionInfo {
    redis::ConnectionInfo {
        addr: redis::ConnectionAddr::Tcp(settings.host.clone(), settings.port),
        redis: redis::RedisConnectionInfo {
            username: settings.username.clone(),
            password: settings.password.clone(),
            ..Default::default()
        },
    }
}

/// An absent key reads as the empty set; anything stored must decode.
fn decode_blob(blob: Option<String>) -> Result<Vec<TaskRecord>, StoreError> {
    match blob {
        Some(blob) => serde_json::from_str(&blob).map_err(StoreError::serialization),
        None => Ok(Vec::new()),
    }
}
