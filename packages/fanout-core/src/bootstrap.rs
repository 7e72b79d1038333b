//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where the
//! registry is instantiated and handed to the API layer.

use std::sync::Arc;

use crate::config::Config;
use crate::error::{FanoutError, FanoutResult};
use crate::stream::StreamRegistry;

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Process-wide stream registry.
    pub registry: Arc<StreamRegistry>,
    /// Port the HTTP/WS server should bind to.
    pub bind_port: u16,
}

impl BootstrappedServices {
    /// Initiates graceful shutdown of all services: stops every Stream
    /// (tearing down its Ingestor, Broadcaster, Health Monitor, and
    /// attached Clients).
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");
        let stopped = self.registry.clear_all().await;
        log::info!("[Bootstrap] Stopped {} stream(s)", stopped);
        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Bootstraps all application services with their dependencies.
///
/// This is the composition root. Wiring order:
///
/// 1. Validate the streaming configuration
/// 2. Create the Stream Registry (holds no streams until requests arrive)
///
/// # Errors
///
/// Returns an error if `config.streaming` fails validation.
pub fn bootstrap_services(config: &Config) -> FanoutResult<BootstrappedServices> {
    config
        .streaming
        .validate()
        .map_err(FanoutError::InvalidRequest)?;

    let registry = StreamRegistry::new(config.streaming.clone());

    Ok(BootstrappedServices {
        registry,
        bind_port: config.bind_port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_rejects_invalid_streaming_config() {
        let mut config = Config::default();
        config.streaming.transcoder_path = String::new();
        assert!(bootstrap_services(&config).is_err());
    }

    #[test]
    fn bootstrap_succeeds_with_defaults() {
        let config = Config::default();
        let services = bootstrap_services(&config).unwrap();
        assert_eq!(services.bind_port, config.bind_port);
        assert!(services.registry.list().is_empty());
    }
}
