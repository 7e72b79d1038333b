//! The Client Queue (bounded, drop-newest) and the Client itself: one
//! attached consumer, its Reader and Writer tasks, and the idempotent
//! teardown the three concurrent callers (Reader exit, Writer exit, Stream
//! stop) all funnel through.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex as PlMutex;
use tokio::sync::Notify;

use crate::protocol_constants::{
    MAX_INBOUND_MESSAGE_BYTES, PING_INTERVAL_SECS, READ_DEADLINE_SECS, WRITE_DEADLINE_SECS,
};
use crate::stream::Stream;

struct QueueInner {
    queue: PlMutex<VecDeque<Bytes>>,
    capacity: usize,
    closed: AtomicBool,
    notify: Notify,
}

/// Per-client bounded FIFO between the Broadcaster and this Client's Writer.
/// Overflow drops the newest (just-produced) frame, never the backlog
/// already queued for this consumer.
#[derive(Clone)]
pub struct ClientQueue {
    inner: Arc<QueueInner>,
}

impl ClientQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                queue: PlMutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                closed: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Attempts to enqueue `frame`. Returns `false` if the queue was full
    /// and the frame was dropped.
    pub fn try_push(&self, frame: Bytes) -> bool {
        let mut queue = self.inner.queue.lock();
        if queue.len() >= self.inner.capacity {
            return false;
        }
        queue.push_back(frame);
        drop(queue);
        self.inner.notify.notify_one();
        true
    }

    pub async fn recv(&self) -> Option<Bytes> {
        loop {
            // Register interest before re-checking state: otherwise a
            // `close()` landing between the `closed` check and the await
            // below would notify no one, since `notify_waiters()` wakes
            // only already-registered waiters and stores no permit.
            let notified = self.inner.notify.notified();

            if let Some(frame) = self.inner.queue.lock().pop_front() {
                return Some(frame);
            }
            if self.inner.closed.load(Ordering::SeqCst) {
                return None;
            }

            notified.await;
        }
    }

    /// Closes the queue, waking a parked Writer with `None`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }
}

/// One attached consumer of a Stream's frames.
pub struct Client {
    pub client_id: String,
    pub stream_id: String,
    queue: ClientQueue,
    closed: PlMutex<bool>,
    stream: Weak<Stream>,
}

impl Client {
    pub fn new(
        client_id: String,
        stream_id: String,
        queue_capacity: usize,
        stream: Weak<Stream>,
    ) -> Arc<Self> {
        Arc::new(Self {
            client_id,
            stream_id,
            queue: ClientQueue::new(queue_capacity),
            closed: PlMutex::new(false),
            stream,
        })
    }

    pub fn queue(&self) -> &ClientQueue {
        &self.queue
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    /// Idempotent removal. Only the first caller among (Writer exit, Reader
    /// exit, Stream stop) performs the transition and the map removal; all
    /// later callers observe `closed == true` and no-op.
    pub fn remove(self: &Arc<Self>) {
        {
            let mut closed = self.closed.lock();
            if *closed {
                return;
            }
            *closed = true;
        }
        self.queue.close();
        if let Some(stream) = self.stream.upgrade() {
            stream.clients.remove(&self.client_id);
        }
    }
}

/// Spawns the Writer task: drains the Client Queue to the WebSocket sink,
/// sending a liveness ping every `ping_interval`.
pub fn spawn_writer(
    client: Arc<Client>,
    mut sink: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ping_tick = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
        ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ping_tick.tick().await; // first tick fires immediately, skip it

        loop {
            if client.is_closed() {
                break;
            }
            tokio::select! {
                biased;
                frame = client.queue().recv() => {
                    let Some(frame) = frame else { break };
                    if client.is_closed() {
                        break;
                    }
                    let write = tokio::time::timeout(
                        Duration::from_secs(WRITE_DEADLINE_SECS),
                        sink.send(Message::Binary(frame.to_vec().into())),
                    )
                    .await;
                    match write {
                        Ok(Ok(())) => {}
                        _ => {
                            log::warn!(
                                "[Client {}] write failed or timed out on stream {}",
                                client.client_id, client.stream_id
                            );
                            break;
                        }
                    }
                }
                _ = ping_tick.tick() => {
                    if client.is_closed() {
                        break;
                    }
                    if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                        log::warn!(
                            "[Client {}] ping failed on stream {}",
                            client.client_id, client.stream_id
                        );
                        break;
                    }
                }
            }
        }

        let _ = sink.send(Message::Close(None)).await;
        client.remove();
        log::debug!(
            "[Client {}] writer exited for stream {}",
            client.client_id, client.stream_id
        );
    })
}

/// Spawns the Reader task: reads inbound messages solely to detect remote
/// closure and to extend the read deadline on pong receipt. Inbound payloads
/// are never interpreted.
pub fn spawn_reader(
    client: Arc<Client>,
    mut stream_rx: futures::stream::SplitStream<WebSocket>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let next = tokio::time::timeout(
                Duration::from_secs(READ_DEADLINE_SECS),
                stream_rx.next(),
            )
            .await;

            match next {
                Ok(Some(Ok(msg))) => match msg {
                    Message::Close(_) => break,
                    Message::Binary(data) => {
                        if data.len() > MAX_INBOUND_MESSAGE_BYTES {
                            log::warn!(
                                "[Client {}] inbound message exceeds {} bytes, closing",
                                client.client_id, MAX_INBOUND_MESSAGE_BYTES
                            );
                            break;
                        }
                    }
                    // Pong/Ping/Text: presence alone counts as liveness; the loop
                    // continues and the read deadline above is naturally refreshed.
                    _ => {}
                },
                Ok(Some(Err(_))) | Ok(None) => break,
                Err(_elapsed) => {
                    log::warn!(
                        "[Client {}] read deadline elapsed on stream {}",
                        client.client_id, client.stream_id
                    );
                    break;
                }
            }
        }

        client.remove();
        log::debug!(
            "[Client {}] reader exited for stream {}",
            client.client_id, client.stream_id
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    mod drop_newest {
        use super::*;

        #[tokio::test]
        async fn overflow_drops_the_newest_frame() {
            let q = ClientQueue::new(2);
            assert!(q.try_push(Bytes::from_static(b"1")));
            assert!(q.try_push(Bytes::from_static(b"2")));
            assert!(!q.try_push(Bytes::from_static(b"3")));
            assert_eq!(q.recv().await, Some(Bytes::from_static(b"1")));
            assert_eq!(q.recv().await, Some(Bytes::from_static(b"2")));
        }

        #[tokio::test]
        async fn close_wakes_pending_recv() {
            let q = ClientQueue::new(2);
            q.close();
            assert_eq!(q.recv().await, None);
        }
    }

    mod teardown {
        use super::*;

        #[test]
        fn remove_is_idempotent() {
            let client = Client::new("c1".into(), "s1".into(), 10, Weak::new());
            client.remove();
            assert!(client.is_closed());
            // Second call must be a no-op, not a panic or double-close.
            client.remove();
            assert!(client.is_closed());
        }
    }
}
