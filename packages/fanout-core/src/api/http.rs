//! Control API surface: thin HTTP handlers that parse requests, call
//! [`StreamRegistry`] operations, and render the result as JSON or raw
//! bytes.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::api::ws::ws_handler;
use crate::api::AppState;
use crate::protocol_constants::GET_LATEST_FRAME_TIMEOUT_SECS;

/// Builds the full router: REST control surface, the WebSocket push
/// endpoint, and a permissive CORS layer (consumers are arbitrary browser
/// viewers, not a single known origin).
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/streams", post(create_stream).get(list_streams))
        .route("/api/streams/start-with-url", post(start_with_url))
        .route("/api/streams/:stream_id", delete(stop_stream))
        .route("/api/streams/:stream_id/force", delete(force_stop_stream))
        .route("/api/streams/:stream_id/stats", get(stream_stats))
        .route("/api/streams/:stream_id/frame", get(latest_frame))
        .route("/ws/:stream_id", get(ws_handler))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CreateStreamRequest {
    stream_id: String,
    rtsp_url: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Serialize)]
struct CreateStreamResponse {
    success: bool,
    stream_id: String,
    message: String,
}

async fn create_stream(
    State(state): State<AppState>,
    Json(req): Json<CreateStreamRequest>,
) -> Response {
    let (default_width, default_height) = {
        let d = state.registry.defaults();
        (d.default_width, d.default_height)
    };
    let width = req.width.unwrap_or(default_width);
    let height = req.height.unwrap_or(default_height);

    match state
        .registry
        .create(req.stream_id.clone(), req.rtsp_url, width, height)
    {
        Ok(()) => Json(CreateStreamResponse {
            success: true,
            stream_id: req.stream_id,
            message: "stream created".to_string(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct StartWithUrlRequest {
    rtsp_url: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Serialize)]
struct StartWithUrlResponse {
    success: bool,
    stream_id: String,
    message: String,
}

async fn start_with_url(
    State(state): State<AppState>,
    Json(req): Json<StartWithUrlRequest>,
) -> Response {
    let (default_width, default_height) = {
        let d = state.registry.defaults();
        (d.default_width, d.default_height)
    };
    let width = req.width.unwrap_or(default_width);
    let height = req.height.unwrap_or(default_height);

    match state.registry.start_with_url(req.rtsp_url, width, height) {
        Ok((stream_id, created)) => {
            let message = if created {
                "stream created".to_string()
            } else {
                "already running".to_string()
            };
            Json(StartWithUrlResponse {
                success: true,
                stream_id,
                message,
            })
            .into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Serialize)]
struct StreamsResponse {
    streams: Vec<crate::stream::StreamSummary>,
}

async fn list_streams(State(state): State<AppState>) -> Response {
    Json(StreamsResponse {
        streams: state.registry.list(),
    })
    .into_response()
}

async fn stop_stream(State(state): State<AppState>, Path(stream_id): Path<String>) -> Response {
    match state.registry.stop(&stream_id).await {
        Ok(()) => Json(serde_json::json!({"success": true})).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn force_stop_stream(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
) -> Response {
    match state.registry.force_stop(&stream_id).await {
        Ok(()) => Json(serde_json::json!({"success": true})).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn stream_stats(State(state): State<AppState>, Path(stream_id): Path<String>) -> Response {
    match state.registry.stats(&stream_id) {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn latest_frame(State(state): State<AppState>, Path(stream_id): Path<String>) -> Response {
    let timeout = Duration::from_secs(GET_LATEST_FRAME_TIMEOUT_SECS);
    match state.registry.get_latest_frame(&stream_id, timeout).await {
        Ok(Some(frame)) => {
            let timestamp_nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                    ("x-frame-timestamp".to_string(), timestamp_nanos.to_string()),
                ],
                frame.to_vec(),
            )
                .into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: u128,
}

async fn health_check() -> Response {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    Json(HealthResponse {
        status: "healthy",
        timestamp,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamDefaults;
    use crate::stream::StreamRegistry;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            registry: StreamRegistry::new(StreamDefaults::default()),
        }
    }

    #[tokio::test]
    async fn health_check_returns_200() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn stats_for_missing_stream_is_404() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/streams/missing/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_then_list_reflects_the_new_stream() {
        let state = test_state();
        state
            .registry
            .create("cam1".into(), "rtsp://example/cam1".into(), 64, 48)
            .unwrap();
        let app = create_router(state);
        let response = app
            .oneshot(Request::builder().uri("/api/streams").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
