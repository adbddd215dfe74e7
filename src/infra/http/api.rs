//! JSON endpoints: the read-only fetch route and the hot-store health probe.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::application::stores::StoreError;

use super::{AppState, hot_health_response};

const HOT_STORE_CODE: &str = "hot_store_error";

/// Machine-readable failure envelope, `{"error":{"code","message","hint"}}`.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// The one failure the JSON surface can produce. Archive trouble never
/// reaches here; the controller swallows it into degraded outcomes.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn hot_store(err: StoreError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: HOT_STORE_CODE,
            message: "Hot store request failed",
            hint: Some(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = format!(
            "{}: {}",
            self.code,
            self.hint.as_deref().unwrap_or(self.message)
        );
        let body = Json(ErrorEnvelope {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        });
        let mut response = (self.status, body).into_response();
        ErrorReport::from_message("infra::http::api", self.status, detail).attach(&mut response);
        response
    }
}

/// The full merged list, newest first, as a bare JSON array.
///
/// A failed archive read has already degraded the listing to hot-only
/// inside the controller; only a hot-tier failure becomes an error here.
pub async fn fetch_all_tasks(State(state): State<AppState>) -> Result<Response, ApiError> {
    let listing = state.todos.list().await.map_err(ApiError::hot_store)?;
    Ok(Json(listing.tasks).into_response())
}

pub async fn hot_health(State(state): State<AppState>) -> Response {
    hot_health_response(state.todos.ping_hot().await)
}
