pub mod api;
mod middleware;
mod ws;

pub use middleware::RequestContext;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Router, middleware as axum_middleware};

use crate::application::error::ErrorReport;
use crate::application::events::TodoFeed;
use crate::application::stores::StoreError;
use crate::application::todos::TodoService;

use middleware::{log_responses, set_request_context};

/// Shared state behind every route: the controller and the push-channel feed.
#[derive(Clone)]
pub struct AppState {
    pub todos: Arc<TodoService>,
    pub feed: TodoFeed,
}

/// Assemble the service router: the read-only fetch endpoint, the hot-store
/// health probe, and the WebSocket push channel.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/fetchAllTasks", get(api::fetch_all_tasks))
        .route("/_health/hot", get(api::hot_health))
        .route("/ws", get(ws::upgrade))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

fn hot_health_response(result: Result<(), StoreError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::hot_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
