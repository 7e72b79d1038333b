//! Tunable configuration for the fan-out core.
//!
//! Mirrors the defaults in [`crate::protocol_constants`] but allows a
//! deployment to override them (via the server binary's config layering)
//! without recompiling.

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    CLIENT_QUEUE_CAPACITY, DEFAULT_BIND_PORT, DEFAULT_HEIGHT, DEFAULT_TRANSCODER_PATH,
    DEFAULT_WIDTH, FRAME_PIPE_CAPACITY, GRACEFUL_DELAY_MS, HEALTH_INTERVAL_SECS,
    RESTART_DELAY_SECS, STALL_THRESHOLD_SECS,
};

/// Tuning knobs for the stream lifecycle and the two buffering stages.
///
/// Validated once at bootstrap via [`StreamDefaults::validate`]; invalid
/// values are a configuration error, not a per-request error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamDefaults {
    /// Path to the transcoder binary (resolved via `PATH` if not absolute).
    pub transcoder_path: String,
    /// Frame width used when a create request omits one.
    pub default_width: u32,
    /// Frame height used when a create request omits one.
    pub default_height: u32,
    /// Capacity of the Frame Pipe (drop-oldest).
    pub frame_pipe_capacity: usize,
    /// Capacity of each Client Queue (drop-newest).
    pub client_queue_capacity: usize,
    /// Health Monitor tick interval, seconds.
    pub health_interval_secs: u64,
    /// Time-since-last-frame threshold before a stream is considered stalled, seconds.
    pub stall_threshold_secs: u64,
    /// Delay between transcoder restart attempts, seconds.
    pub restart_delay_secs: u64,
    /// Delay between firing cancel and closing the Frame Pipe during stop, milliseconds.
    pub graceful_delay_ms: u64,
}

impl Default for StreamDefaults {
    fn default() -> Self {
        Self {
            transcoder_path: DEFAULT_TRANSCODER_PATH.to_string(),
            default_width: DEFAULT_WIDTH,
            default_height: DEFAULT_HEIGHT,
            frame_pipe_capacity: FRAME_PIPE_CAPACITY,
            client_queue_capacity: CLIENT_QUEUE_CAPACITY,
            health_interval_secs: HEALTH_INTERVAL_SECS,
            stall_threshold_secs: STALL_THRESHOLD_SECS,
            restart_delay_secs: RESTART_DELAY_SECS,
            graceful_delay_ms: GRACEFUL_DELAY_MS,
        }
    }
}

impl StreamDefaults {
    /// Validates the configuration, returning a human-readable error on
    /// the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.transcoder_path.trim().is_empty() {
            return Err("transcoder_path must not be empty".into());
        }
        if self.default_width == 0 || self.default_height == 0 {
            return Err("default_width and default_height must be positive".into());
        }
        if self.frame_pipe_capacity == 0 {
            return Err("frame_pipe_capacity must be positive".into());
        }
        if self.client_queue_capacity == 0 {
            return Err("client_queue_capacity must be positive".into());
        }
        if self.health_interval_secs == 0 {
            return Err("health_interval_secs must be positive".into());
        }
        if self.stall_threshold_secs <= self.health_interval_secs {
            return Err("stall_threshold_secs should exceed health_interval_secs".into());
        }
        Ok(())
    }
}

/// Top-level configuration for the fan-out core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the HTTP/WS server binds to.
    pub bind_port: u16,
    /// Stream lifecycle and buffering tuning knobs.
    pub streaming: StreamDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_port: DEFAULT_BIND_PORT,
            streaming: StreamDefaults::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(StreamDefaults::default().validate().is_ok());
    }

    #[test]
    fn rejects_empty_transcoder_path() {
        let mut d = StreamDefaults::default();
        d.transcoder_path = String::new();
        assert!(d.validate().is_err());
    }

    #[test]
    fn rejects_zero_geometry() {
        let mut d = StreamDefaults::default();
        d.default_width = 0;
        assert!(d.validate().is_err());
    }

    #[test]
    fn rejects_stall_threshold_not_exceeding_health_interval() {
        let mut d = StreamDefaults::default();
        d.stall_threshold_secs = d.health_interval_secs;
        assert!(d.validate().is_err());
    }
}
