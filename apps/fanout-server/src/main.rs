//! Fanout Server - standalone RTSP single-ingest, multi-consumer fan-out
//! server.
//!
//! One ffmpeg decode per camera feeds an in-process Frame Pipe; any number
//! of WebSocket consumers attach to pull raw frames from it.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fanout_core::api::AppState;
use fanout_core::{bootstrap_services, start_server};
use tokio::signal;

use crate::config::ServerConfig;

/// Fanout Server - headless RTSP fan-out server.
#[derive(Parser, Debug)]
#[command(name = "fanout-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "FANOUT_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "FANOUT_BIND_PORT")]
    port: Option<u16>,

    /// Transcoder binary path (overrides config file).
    #[arg(short = 't', long, env = "FANOUT_TRANSCODER_PATH")]
    transcoder_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Fanout Server v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(transcoder_path) = args.transcoder_path {
        config.streaming.transcoder_path = transcoder_path;
    }

    log::info!(
        "Configuration: bind_port={}, transcoder_path={}",
        config.bind_port,
        config.streaming.transcoder_path
    );

    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config).context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    let app_state = AppState {
        registry: services.registry.clone(),
    };

    let bind_port = services.bind_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state, bind_port).await {
            log::error!("Server error: {}", e);
        }
    });

    log::info!("HTTP server started on port {}", bind_port);

    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    services.shutdown().await;
    server_handle.abort();

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
