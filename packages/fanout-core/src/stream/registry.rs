//! Stream Registry: the process-wide mapping of `stream_id` to [`Stream`],
//! and the only place that creates, looks up, attaches to, or tears down a
//! Stream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

use crate::config::StreamDefaults;
use crate::error::{FanoutError, FanoutResult};
use crate::stream::{
    spawn_broadcaster, spawn_health_monitor, spawn_ingestor, spawn_reader, spawn_writer, Client,
    Stream, StreamStats,
};
use axum::extract::ws::WebSocket;

/// Process-wide singleton mapping `stream_id` to `Stream`.
pub struct StreamRegistry {
    streams: DashMap<String, Arc<Stream>>,
    client_id_counter: AtomicU64,
    defaults: Arc<StreamDefaults>,
}

/// Summary row for `GET /api/streams`.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    pub stream_id: String,
    pub source_url: String,
    pub running: bool,
    pub client_count: usize,
    pub frame_count: u64,
}

impl StreamRegistry {
    pub fn new(defaults: StreamDefaults) -> Arc<Self> {
        Arc::new(Self {
            streams: DashMap::new(),
            client_id_counter: AtomicU64::new(0),
            defaults: Arc::new(defaults),
        })
    }

    /// Creates a new Stream and launches its Ingestor, Broadcaster, and
    /// Health Monitor. Fails with `AlreadyExists` if `stream_id` is taken.
    pub fn create(
        &self,
        stream_id: String,
        source_url: String,
        width: u32,
        height: u32,
    ) -> FanoutResult<()> {
        use dashmap::mapref::entry::Entry;

        let stream = match self.streams.entry(stream_id.clone()) {
            Entry::Occupied(_) => return Err(FanoutError::AlreadyExists(stream_id)),
            Entry::Vacant(slot) => {
                let stream = Stream::new(
                    stream_id.clone(),
                    source_url,
                    width,
                    height,
                    self.defaults.frame_pipe_capacity,
                );
                slot.insert(stream.clone());
                stream
            }
        };

        let cancel = stream.current_cancel();
        spawn_ingestor(stream.clone(), self.defaults.clone(), cancel);
        spawn_broadcaster(stream.clone());
        spawn_health_monitor(stream, self.defaults.clone());

        log::info!("[Registry] created stream {stream_id}");
        Ok(())
    }

    /// Derives a deterministic `stream_id` from `rtsp_url` and creates the
    /// stream if it does not already exist. Returns `(stream_id, created)`.
    pub fn start_with_url(
        &self,
        rtsp_url: String,
        width: u32,
        height: u32,
    ) -> FanoutResult<(String, bool)> {
        let stream_id = derive_stream_id(&rtsp_url);
        match self.create(stream_id.clone(), rtsp_url, width, height) {
            Ok(()) => Ok((stream_id, true)),
            Err(FanoutError::AlreadyExists(_)) => Ok((stream_id, false)),
            Err(e) => Err(e),
        }
    }

    pub fn lookup(&self, stream_id: &str) -> FanoutResult<Arc<Stream>> {
        self.streams
            .get(stream_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| FanoutError::NotFound(stream_id.to_string()))
    }

    pub fn list(&self) -> Vec<StreamSummary> {
        self.streams
            .iter()
            .map(|entry| {
                let s = entry.value();
                let stats = s.stats();
                StreamSummary {
                    stream_id: stats.stream_id,
                    source_url: stats.source_url,
                    running: stats.running,
                    client_count: stats.client_count,
                    frame_count: stats.frame_count,
                }
            })
            .collect()
    }

    pub fn stats(&self, stream_id: &str) -> FanoutResult<StreamStats> {
        Ok(self.lookup(stream_id)?.stats())
    }

    /// Safe stop: fails with `ConsumerBusy` if any client is attached.
    pub async fn stop(&self, stream_id: &str) -> FanoutResult<()> {
        let stream = self.lookup(stream_id)?;
        let client_count = stream.client_count();
        if client_count > 0 {
            return Err(FanoutError::ConsumerBusy(stream_id.to_string(), client_count));
        }
        self.teardown(stream_id, stream).await;
        Ok(())
    }

    /// Unconditional stop, regardless of attached clients.
    pub async fn force_stop(&self, stream_id: &str) -> FanoutResult<()> {
        let stream = self.lookup(stream_id)?;
        self.teardown(stream_id, stream).await;
        Ok(())
    }

    async fn teardown(&self, stream_id: &str, stream: Arc<Stream>) {
        stream.cancel.read().cancel();
        stream.health_stop.cancel();
        tokio::time::sleep(Duration::from_millis(self.defaults.graceful_delay_ms)).await;

        stream.pipe_tx.close();

        // Snapshot the Arcs before removing: `Client::remove` reaches back
        // into `stream.clients` to remove itself, which would deadlock
        // against the read guard `iter()` holds on the same shard.
        let clients: Vec<_> = stream.clients.iter().map(|e| e.value().clone()).collect();
        for client in clients {
            client.remove();
        }

        self.streams.remove(stream_id);
        log::info!("[Registry] stopped stream {stream_id}");
    }

    /// Attaches a new consumer to `stream_id`'s push channel, spawning its
    /// Reader and Writer tasks against `socket`.
    pub fn attach_client(&self, stream_id: &str, socket: WebSocket) -> FanoutResult<()> {
        let stream = self.lookup(stream_id)?;
        if !stream.is_running() {
            return Err(FanoutError::NotRunning(stream_id.to_string()));
        }

        let client_id = self.client_id_counter.fetch_add(1, Ordering::SeqCst).to_string();
        let client = Client::new(
            client_id.clone(),
            stream_id.to_string(),
            self.defaults.client_queue_capacity,
            Arc::downgrade(&stream),
        );
        stream.clients.insert(client_id, client.clone());

        use futures::StreamExt as _;
        let (sink, stream_half) = socket.split();
        spawn_writer(client.clone(), sink);
        spawn_reader(client, stream_half);
        Ok(())
    }

    pub async fn get_latest_frame(
        &self,
        stream_id: &str,
        timeout: Duration,
    ) -> FanoutResult<Option<bytes::Bytes>> {
        let stream = self.lookup(stream_id)?;
        if !stream.is_running() {
            return Err(FanoutError::NotRunning(stream_id.to_string()));
        }
        Ok(stream.get_latest_frame(timeout).await)
    }

    pub fn defaults(&self) -> &StreamDefaults {
        &self.defaults
    }

    /// Stops every Stream, used during process shutdown.
    pub async fn clear_all(&self) -> usize {
        let ids: Vec<String> = self.streams.iter().map(|e| e.key().clone()).collect();
        let count = ids.len();
        for id in ids {
            let _ = self.force_stop(&id).await;
        }
        count
    }
}

/// Derives a short, deterministic hex digest of `rtsp_url` suitable for use
/// as a `stream_id`.
fn derive_stream_id(rtsp_url: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    rtsp_url.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_duplicate_stream_id() {
        let registry = StreamRegistry::new(StreamDefaults::default());
        registry.create("cam1".into(), "rtsp://x".into(), 64, 48).unwrap();
        let err = registry
            .create("cam1".into(), "rtsp://y".into(), 64, 48)
            .unwrap_err();
        assert!(matches!(err, FanoutError::AlreadyExists(_)));
    }

    #[test]
    fn lookup_missing_stream_is_not_found() {
        let registry = StreamRegistry::new(StreamDefaults::default());
        assert!(matches!(
            registry.lookup("missing"),
            Err(FanoutError::NotFound(_))
        ));
    }

    #[test]
    fn derive_stream_id_is_deterministic() {
        assert_eq!(derive_stream_id("rtsp://x"), derive_stream_id("rtsp://x"));
        assert_ne!(derive_stream_id("rtsp://x"), derive_stream_id("rtsp://y"));
    }

    #[tokio::test]
    async fn start_with_url_is_idempotent() {
        let registry = StreamRegistry::new(StreamDefaults::default());
        let (id1, created1) = registry
            .start_with_url("rtsp://x".into(), 64, 48)
            .unwrap();
        assert!(created1);
        let (id2, created2) = registry
            .start_with_url("rtsp://x".into(), 64, 48)
            .unwrap();
        assert_eq!(id1, id2);
        assert!(!created2);
    }

    #[tokio::test]
    async fn safe_stop_rejects_when_clients_attached() {
        let registry = StreamRegistry::new(StreamDefaults::default());
        registry.create("cam1".into(), "rtsp://x".into(), 2, 2, ).unwrap();
        let stream = registry.lookup("cam1").unwrap();
        let client = Client::new("c1".into(), "cam1".into(), 10, Arc::downgrade(&stream));
        stream.clients.insert("c1".into(), client);

        let err = registry.stop("cam1").await.unwrap_err();
        assert!(matches!(err, FanoutError::ConsumerBusy(_, 1)));

        registry.force_stop("cam1").await.unwrap();
        assert!(matches!(registry.lookup("cam1"), Err(FanoutError::NotFound(_))));
    }
}
