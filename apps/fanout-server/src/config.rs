//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use fanout_core::StreamDefaults;
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to.
    /// Override: `FANOUT_BIND_PORT`
    pub bind_port: u16,

    /// Stream lifecycle and buffering tuning knobs.
    pub streaming: StreamDefaults,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_port: 8091,
            streaming: StreamDefaults::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("FANOUT_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("FANOUT_TRANSCODER_PATH") {
            self.streaming.transcoder_path = val;
        }
    }

    /// Converts to fanout-core's Config type.
    pub fn to_core_config(&self) -> fanout_core::Config {
        fanout_core::Config {
            bind_port: self.bind_port,
            streaming: self.streaming.clone(),
        }
    }
}
