//! HTTP and WebSocket control surface

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::{Html, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use rocktimer_core::{CheckpointId, CommandResult, RecordId, RockTimerError, RockTimerResult};
use rocktimer_state::{SessionView, TimingRecord};
use rocktimer_time::SensorStatus;
use rocktimer_wire::{ControlMessage, ObserverEnvelope};

use crate::{StateSnapshot, TimerNode};

/// Records returned by `/api/times` when no limit is given
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// An observer that cannot take a frame within this long is disconnected
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

const INDEX_HTML: &str = "<!doctype html>\n<title>RockTimer</title>\n<h1>RockTimer</h1>\n";

type NodeState = State<Arc<TimerNode>>;

/// Result of a history mutation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Build the control surface router
pub fn router(node: Arc<TimerNode>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/arm", post(arm))
        .route("/api/disarm", post(disarm))
        .route("/api/status", get(status))
        .route("/api/current", get(current))
        .route("/api/sensors", get(sensors))
        .route("/api/times", get(times).delete(clear_times))
        .route("/api/times/:id", delete(delete_time))
        .route("/api/clear", post(clear_times))
        .route("/ws", get(ws_upgrade))
        .with_state(node)
}

/// Serve until the listener fails
pub async fn serve(listener: TcpListener, node: Arc<TimerNode>) -> RockTimerResult<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "HTTP listening");
    }
    axum::serve(listener, router(node))
        .await
        .map_err(|e| RockTimerError::TransportError(e.to_string()))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn arm(State(node): NodeState) -> Json<CommandResult> {
    Json(node.arm())
}

async fn disarm(State(node): NodeState) -> Json<CommandResult> {
    Json(node.disarm())
}

async fn status(State(node): NodeState) -> Json<StateSnapshot> {
    Json(node.snapshot())
}

async fn current(State(node): NodeState) -> Json<SessionView> {
    Json(node.current())
}

async fn sensors(
    State(node): NodeState,
) -> Json<std::collections::BTreeMap<CheckpointId, SensorStatus>> {
    Json(node.sensors())
}

async fn times(State(node): NodeState, Query(query): Query<HistoryQuery>) -> Json<Vec<TimingRecord>> {
    Json(node.history(query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT)))
}

async fn delete_time(State(node): NodeState, Path(id): Path<u64>) -> Json<Ack> {
    Json(Ack {
        success: node.delete_record(RecordId::new(id)),
    })
}

async fn clear_times(State(node): NodeState) -> Json<Ack> {
    node.clear_history();
    Json(Ack { success: true })
}

async fn ws_upgrade(State(node): NodeState, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| observe(socket, node))
}

fn state_update(snapshot: &StateSnapshot) -> Option<String> {
    serde_json::to_string(&ObserverEnvelope::StateUpdate(snapshot)).ok()
}

/// Push every snapshot to one observer and apply its control commands
async fn observe(socket: WebSocket, node: Arc<TimerNode>) {
    let (mut sink, mut stream) = socket.split();
    let mut subscription = node.subscribe();
    let id = subscription.id();
    tracing::info!(observer = id.0, "observer connected");

    let mut pending = Some(subscription.current());
    loop {
        if let Some(snapshot) = pending.take() {
            let Some(text) = state_update(&snapshot) else {
                continue;
            };
            match tokio::time::timeout(SEND_TIMEOUT, sink.send(Message::Text(text))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(observer = id.0, "send failed: {}", e);
                    break;
                }
                Err(_) => {
                    tracing::warn!(observer = id.0, "observer too slow, disconnecting");
                    break;
                }
            }
        }

        tokio::select! {
            update = subscription.recv() => match update {
                Some(snapshot) => pending = Some(snapshot),
                None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => match ControlMessage::parse(&text) {
                    Some(ControlMessage::Arm) => {
                        node.arm();
                    }
                    Some(ControlMessage::Disarm) => {
                        node.disarm();
                    }
                    None => tracing::debug!(observer = id.0, "ignoring frame: {}", text),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(observer = id.0, "receive failed: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!(observer = id.0, "observer disconnected");
}
