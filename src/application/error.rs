use std::{error::Error as StdError, iter};

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::infra::error::InfraError;

/// Diagnostics for a failed response, carried on the response extensions
/// until the logging middleware drains it.
///
/// Handlers keep their public payloads terse; everything operators need,
/// the originating call site plus the full error chain, travels here.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    /// Captures `error` and every nested source, outermost first.
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let messages = iter::successors(Some(error), |&err| err.source())
            .map(|err| err.to_string())
            .collect();
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Failures surfaced by the startup and serve paths. Request handlers
/// respond through [`ErrorReport`] instead; this enum never crosses HTTP.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
