use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

/// Correlation id minted once per request and mirrored onto the response
/// extensions so later layers and tests can read it back.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

impl RequestContext {
    fn issue() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::issue();
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Emits one structured event per failed response, folding in whatever
/// `ErrorReport` the handler attached. Successful responses stay quiet.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let query = request.uri().query().unwrap_or_default().to_owned();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let elapsed_ms = started.elapsed().as_millis();
    let (source, chain) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = chain
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    if status.is_server_error() {
        error!(
            target = "tasktide::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            query = %query,
            elapsed_ms = elapsed_ms,
            source = source,
            detail = %detail,
            chain = ?chain,
            request_id = request_id,
            "request failed",
        );
    } else {
        warn!(
            target = "tasktide::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            query = %query,
            elapsed_ms = elapsed_ms,
            source = source,
            detail = %detail,
            chain = ?chain,
            request_id = request_id,
            "client request error",
        );
    }

    response
}
