//! Fixed protocol and tuning constants.
//!
//! These values are either dictated by the external transcoder/transport
//! contract or are the default tuning knobs for the fan-out pipeline. The
//! latter are also exposed through [`crate::config::StreamDefaults`] so a
//! deployment can override them without a rebuild.

// ─────────────────────────────────────────────────────────────────────────────
// Frame Pipe / Client Queue capacities
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity of the Frame Pipe between Ingestor and Broadcaster.
///
/// Bounds per-stream memory at roughly `FRAME_PIPE_CAPACITY * width * height * 3`
/// bytes. Overflow drops the oldest queued frame.
pub const FRAME_PIPE_CAPACITY: usize = 100;

/// Capacity of each Client's output queue.
///
/// Overflow drops the newest frame for that client only, so one slow
/// consumer never penalizes its siblings.
pub const CLIENT_QUEUE_CAPACITY: usize = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle timing
// ─────────────────────────────────────────────────────────────────────────────

/// How often the Health Monitor checks for a stalled stream (seconds).
pub const HEALTH_INTERVAL_SECS: u64 = 5;

/// How long a stream may go without a frame before it is considered stalled
/// (seconds).
pub const STALL_THRESHOLD_SECS: u64 = 10;

/// Delay between transcoder restart attempts after an unexpected exit
/// (seconds).
pub const RESTART_DELAY_SECS: u64 = 2;

/// Delay between signaling cancellation and closing the Frame Pipe during
/// stop, to let the Ingestor observe cancellation first (milliseconds).
pub const GRACEFUL_DELAY_MS: u64 = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Client transport
// ─────────────────────────────────────────────────────────────────────────────

/// Per-write deadline for the Client writer (seconds).
pub const WRITE_DEADLINE_SECS: u64 = 10;

/// Interval between liveness pings sent to a consumer (seconds).
pub const PING_INTERVAL_SECS: u64 = 54;

/// Read deadline for the Client reader, extended on pong receipt (seconds).
pub const READ_DEADLINE_SECS: u64 = 60;

/// Maximum size of an inbound message accepted from a consumer (bytes).
///
/// Consumer-to-server payloads are never interpreted; this only bounds the
/// size of frames the Reader loop will buffer while detecting closure.
pub const MAX_INBOUND_MESSAGE_BYTES: usize = 512;

// ─────────────────────────────────────────────────────────────────────────────
// Pull endpoint
// ─────────────────────────────────────────────────────────────────────────────

/// Wall-clock timeout for `GET /api/streams/:id/frame` (seconds).
pub const GET_LATEST_FRAME_TIMEOUT_SECS: u64 = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Frame geometry defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Default frame width (pixels) when a create request omits one.
pub const DEFAULT_WIDTH: u32 = 640;

/// Default frame height (pixels) when a create request omits one.
pub const DEFAULT_HEIGHT: u32 = 480;

// ─────────────────────────────────────────────────────────────────────────────
// Application identity / networking
// ─────────────────────────────────────────────────────────────────────────────

/// Default HTTP bind port.
pub const DEFAULT_BIND_PORT: u16 = 8091;

/// Default path to the transcoder binary, resolved via `PATH`.
pub const DEFAULT_TRANSCODER_PATH: &str = "ffmpeg";
