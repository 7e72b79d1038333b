//! WebSocket upgrade handler: validates the stream exists and is running,
//! then hands the socket to [`StreamRegistry::attach_client`].

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};

use crate::api::AppState;
use crate::error::FanoutError;

/// `GET /ws/:stream_id` — one consumer connection.
///
/// Existence and liveness are checked before the upgrade so a client asking
/// for an unknown or stopped stream gets a normal HTTP 404/503 instead of a
/// websocket that opens and immediately closes.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(stream_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let stream = match state.registry.lookup(&stream_id) {
        Ok(stream) => stream,
        Err(e) => return e.into_response(),
    };
    if !stream.is_running() {
        return FanoutError::NotRunning(stream_id).into_response();
    }

    ws.on_upgrade(move |socket| async move {
        if let Err(e) = state.registry.attach_client(&stream_id, socket) {
            log::warn!("[WS] attach failed for stream {}: {}", stream_id, e);
        }
    })
}
