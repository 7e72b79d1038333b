//! The Stream: one camera's fan-out state, owning its Frame Pipe, its
//! attached Clients, and the cancellation signals that drive its lifecycle.

mod broadcaster;
mod client;
mod health;
mod ingestor;
mod pipe;
mod registry;

pub use client::{spawn_reader, spawn_writer, Client, ClientQueue};
pub use registry::{StreamRegistry, StreamSummary};

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use pipe::{frame_pipe, FramePipeReceiver, FramePipeSender};

struct LifecycleState {
    running: bool,
    frame_count: u64,
    last_frame_time: Option<Instant>,
}

/// One camera's worth of fan-out state. See [`StreamRegistry`] for creation
/// and teardown.
pub struct Stream {
    pub stream_id: String,
    pub source_url: String,
    pub width: u32,
    pub height: u32,

    /// Attached consumers, keyed by client_id. This is the single source of
    /// truth for the client set; no registry-level mirror is kept (see
    /// Dual registry maps in the design notes).
    pub clients: DashMap<String, Arc<Client>>,

    state: RwLock<LifecycleState>,
    pipe_tx: FramePipeSender,
    pipe_rx: FramePipeReceiver,
    cancel: RwLock<CancellationToken>,
    health_stop: CancellationToken,
}

impl Stream {
    fn new(
        stream_id: String,
        source_url: String,
        width: u32,
        height: u32,
        capacity: usize,
    ) -> Arc<Self> {
        let (pipe_tx, pipe_rx) = frame_pipe(capacity);
        Arc::new(Self {
            stream_id,
            source_url,
            width,
            height,
            clients: DashMap::new(),
            state: RwLock::new(LifecycleState {
                running: false,
                frame_count: 0,
                last_frame_time: None,
            }),
            pipe_tx,
            pipe_rx,
            cancel: RwLock::new(CancellationToken::new()),
            health_stop: CancellationToken::new(),
        })
    }

    /// Size in bytes of one frame for this Stream's geometry.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Records a successful frame read: enqueues into the Frame Pipe
    /// (drop-oldest on overflow), bumps `frame_count`, stamps
    /// `last_frame_time`, and marks the stream Running.
    fn record_frame(&self, frame: Bytes) {
        {
            let mut state = self.state.write();
            state.running = true;
            state.frame_count += 1;
            state.last_frame_time = Some(Instant::now());
        }
        self.pipe_tx.push(frame);
    }

    fn mark_not_running(&self) {
        self.state.write().running = false;
    }

    fn liveness(&self) -> (bool, Option<Instant>) {
        let state = self.state.read();
        (state.running, state.last_frame_time)
    }

    fn current_cancel(&self) -> CancellationToken {
        self.cancel.read().clone()
    }

    /// Fires the current cancel token and installs a fresh one, returning
    /// it so the caller can launch a new Ingestor against it.
    fn rotate_cancel(&self) -> CancellationToken {
        let mut slot = self.cancel.write();
        slot.cancel();
        let fresh = CancellationToken::new();
        *slot = fresh.clone();
        fresh
    }

    /// Consumes one frame from the Frame Pipe, waiting up to `timeout`.
    pub async fn get_latest_frame(&self, timeout: std::time::Duration) -> Option<Bytes> {
        self.pipe_rx.recv_timeout(timeout).await
    }

    pub fn is_running(&self) -> bool {
        self.state.read().running
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn stats(&self) -> StreamStats {
        let state = self.state.read();
        StreamStats {
            stream_id: self.stream_id.clone(),
            source_url: self.source_url.clone(),
            running: state.running,
            frame_count: state.frame_count,
            last_frame_time_nanos: state.last_frame_time.map(instant_to_nanos_ago),
            client_count: self.clients.len(),
            pipe_depth: self.pipe_tx.depth(),
        }
    }
}

/// `last_frame_time` surfaced as "nanoseconds ago" relative to now, since
/// `Instant` itself has no wall-clock representation worth serializing.
fn instant_to_nanos_ago(t: Instant) -> u128 {
    t.elapsed().as_nanos()
}

/// JSON-serializable stats snapshot for `GET /api/streams/:id/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStats {
    pub stream_id: String,
    pub source_url: String,
    pub running: bool,
    pub frame_count: u64,
    pub last_frame_time_nanos: Option<u128>,
    pub client_count: usize,
    pub pipe_depth: usize,
}

pub(crate) use broadcaster::spawn_broadcaster;
pub(crate) use health::spawn_health_monitor;
pub(crate) use ingestor::spawn_ingestor;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_bytes_is_width_height_times_three() {
        let s = Stream::new("s1".into(), "rtsp://x".into(), 64, 48, 100);
        assert_eq!(s.frame_bytes(), 64 * 48 * 3);
    }

    #[test]
    fn record_frame_marks_running_and_bumps_counters() {
        let s = Stream::new("s1".into(), "rtsp://x".into(), 2, 2, 4);
        assert!(!s.is_running());
        s.record_frame(Bytes::from_static(b"abcdefghijkl"));
        assert!(s.is_running());
        assert_eq!(s.stats().frame_count, 1);
    }

    #[test]
    fn rotate_cancel_fires_old_and_returns_distinct_token() {
        let s = Stream::new("s1".into(), "rtsp://x".into(), 2, 2, 4);
        let old = s.current_cancel();
        let fresh = s.rotate_cancel();
        assert!(old.is_cancelled());
        assert!(!fresh.is_cancelled());
    }
}
