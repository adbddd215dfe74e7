use thiserror::Error;

use crate::application::stores::StoreError;

/// Infrastructure failures that abort startup or the serve loop. Archive
/// trouble never lands here; the controller degrades to hot-only instead.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("hot store error: {0}")]
    HotStore(#[source] StoreError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn hot_store(err: StoreError) -> Self {
        Self::HotStore(err)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
