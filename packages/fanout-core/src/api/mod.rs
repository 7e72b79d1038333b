//! HTTP/WebSocket API layer.
//!
//! This module contains thin handlers that delegate to [`StreamRegistry`].
//! It provides the router construction and server startup functionality.

use std::sync::Arc;

use thiserror::Error;

use crate::stream::StreamRegistry;

pub mod http;
pub mod ws;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds a reference to the registry. All
/// business logic lives in [`StreamRegistry`] and `Stream` itself.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<StreamRegistry>,
}

/// Starts the HTTP server on `bind_port`.
pub async fn start_server(state: AppState, bind_port: u16) -> Result<(), ServerError> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], bind_port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Server listening on http://0.0.0.0:{}", bind_port);

    let app = http::create_router(state);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
