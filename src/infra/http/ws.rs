//! The push channel: WebSocket sessions speaking `event`-tagged JSON frames.
//!
//! Every mutation frame is applied through the controller; on success the
//! initiating session re-reads the merged list and publishes it to the feed,
//! so all connected clients (the initiator included) receive the same
//! snapshot. Failures are reported to the initiating connection only.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::events::TaskSnapshot;
use crate::domain::tasks::TaskRecord;

use super::AppState;

const METRIC_WS_CLIENTS: &str = "tasktide_ws_clients";

const ADD_FAILED: &str = "Failed to add todo item";
const DELETE_FAILED: &str = "Failed to delete todo item";
const TOGGLE_FAILED: &str = "Failed to toggle todo item";
const UNRECOGNIZED: &str = "Unrecognized message";

/// Mutation frames sent by clients.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum ClientFrame {
    Add { text: String },
    Delete { id: String },
    Toggle { id: String },
}

/// Frames pushed to clients.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum ServerFrame<'a> {
    Todos { todos: &'a [TaskRecord] },
    Error { message: &'a str },
}

pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| session(state, socket))
}

async fn session(state: AppState, socket: WebSocket) {
    let connection_id = Uuid::new_v4().to_string();
    let mut feed_rx = state.feed.subscribe();
    let (mut sink, mut stream) = socket.split();

    metrics::gauge!(METRIC_WS_CLIENTS).increment(1.0);
    debug!(connection_id, "Push channel client connected");

    loop {
        tokio::select! {
            inbound = stream.next() => {
                if !handle_inbound(&state, &connection_id, &mut sink, inbound).await {
                    break;
                }
            }
            snapshot = feed_rx.recv() => {
                match snapshot {
                    Ok(snapshot) => {
                        if send_snapshot(&mut sink, &snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Every snapshot is self-contained; the skipped ones
                        // were stale the moment the next arrived.
                        debug!(connection_id, skipped, "Subscriber lagged behind the feed");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    metrics::gauge!(METRIC_WS_CLIENTS).decrement(1.0);
    debug!(connection_id, "Push channel client disconnected");
}

/// Process one item off the socket stream. Returns false when the session
/// should end.
async fn handle_inbound(
    state: &AppState,
    connection_id: &str,
    sink: &mut SplitSink<WebSocket, Message>,
    inbound: Option<Result<Message, axum::Error>>,
) -> bool {
    match inbound {
        Some(Ok(Message::Text(frame))) => {
            if let Some(message) = apply_frame(state, connection_id, frame.as_str()).await {
                return send_error(sink, message).await.is_ok();
            }
            true
        }
        // Protocol-level frames need no application response.
        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_))) => true,
        Some(Ok(Message::Close(_))) | None => false,
        Some(Err(err)) => {
            debug!(connection_id, error = %err, "Push channel transport error");
            false
        }
    }
}

/// Apply one client frame; on success broadcast the refreshed merged list.
/// Returns the error message owed to the initiating client, if any.
async fn apply_frame(state: &AppState, connection_id: &str, raw: &str) -> Option<&'static str> {
    let frame: ClientFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(err) => {
            debug!(connection_id, error = %err, "Discarding unparseable frame");
            return Some(UNRECOGNIZED);
        }
    };

    let (operation, failure_message, result) = match frame {
        ClientFrame::Add { text } => ("add", ADD_FAILED, state.todos.add(&text).await.map(|_| ())),
        ClientFrame::Delete { id } => (
            "delete",
            DELETE_FAILED,
            state.todos.delete(&id).await.map(|_| ()),
        ),
        ClientFrame::Toggle { id } => (
            "toggle",
            TOGGLE_FAILED,
            state.todos.toggle(&id).await.map(|_| ()),
        ),
    };

    if let Err(err) = result {
        warn!(connection_id, operation, error = %err, "Mutation failed");
        return Some(failure_message);
    }

    match state.todos.list().await {
        Ok(listing) => {
            state.feed.publish(listing.tasks);
            None
        }
        Err(err) => {
            warn!(connection_id, operation, error = %err, "Post-mutation list failed");
            Some(failure_message)
        }
    }
}

async fn send_snapshot(
    sink: &mut SplitSink<WebSocket, Message>,
    snapshot: &TaskSnapshot,
) -> Result<(), axum::Error> {
    let todos: &[TaskRecord] = snapshot;
    send_frame(sink, &ServerFrame::Todos { todos }).await
}

async fn send_error(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &str,
) -> Result<(), axum::Error> {
    send_frame(sink, &ServerFrame::Error { message }).await
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &ServerFrame<'_>,
) -> Result<(), axum::Error> {
    let encoded = match serde_json::to_string(frame) {
        Ok(encoded) => encoded,
        Err(err) => {
            warn!(error = %err, "Failed to encode outbound frame");
            return Ok(());
        }
    };
    sink.send(Message::Text(encoded.into())).await
}
