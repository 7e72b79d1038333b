//! The Frame Pipe: a bounded, single-consumer FIFO between an Ingestor and
//! its Broadcaster, dropping the *oldest* queued frame on overflow.
//!
//! `tokio::sync::mpsc` is deliberately not used here: its backpressure model
//! blocks the sender (or requires the sender to fail), and `broadcast`'s
//! overflow policy drops from the read side and fans out to every
//! subscriber. Neither matches the drop-oldest, single-reader contract this
//! stage needs, so the FIFO is rolled directly on a `VecDeque` guarded by a
//! `parking_lot::Mutex`, with a `Notify` waking the one waiting reader.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

struct Inner {
    queue: Mutex<VecDeque<Bytes>>,
    capacity: usize,
    closed: AtomicBool,
    notify: Notify,
}

/// Producer half of the Frame Pipe, held by the Ingestor.
#[derive(Clone)]
pub struct FramePipeSender {
    inner: Arc<Inner>,
}

/// Consumer half of the Frame Pipe, held by the Broadcaster and by
/// `getLatestFrame` callers.
#[derive(Clone)]
pub struct FramePipeReceiver {
    inner: Arc<Inner>,
}

/// Creates a bounded Frame Pipe with the given capacity.
pub fn frame_pipe(capacity: usize) -> (FramePipeSender, FramePipeReceiver) {
    let inner = Arc::new(Inner {
        queue: Mutex::new(VecDeque::with_capacity(capacity)),
        capacity,
        closed: AtomicBool::new(false),
        notify: Notify::new(),
    });
    (
        FramePipeSender {
            inner: inner.clone(),
        },
        FramePipeReceiver { inner },
    )
}

impl FramePipeSender {
    /// Enqueues a frame, dropping the oldest queued frame first if the pipe
    /// is at capacity. Returns `true` if a frame was dropped to make room.
    pub fn push(&self, frame: Bytes) -> bool {
        let mut dropped = false;
        {
            let mut queue = self.inner.queue.lock();
            if queue.len() >= self.inner.capacity {
                queue.pop_front();
                dropped = true;
            }
            queue.push_back(frame);
        }
        self.inner.notify.notify_one();
        dropped
    }

    /// Closes the pipe. Any pending `recv()` wakes and returns `None` once
    /// the backlog is drained.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Current number of queued frames, for stats reporting.
    pub fn depth(&self) -> usize {
        self.inner.queue.lock().len()
    }
}

impl FramePipeReceiver {
    /// Waits for and removes the next frame. Returns `None` once the pipe
    /// is closed and drained.
    pub async fn recv(&self) -> Option<Bytes> {
        loop {
            // Registering interest before re-checking state closes the race
            // where `close()`'s `notify_waiters()` lands between the check
            // below and the await: the future already captured the
            // notification sequence at this point, so a concurrent close
            // cannot be missed.
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

    /// Waits up to `timeout` for the next frame without blocking
    /// indefinitely, for the pull endpoint. Returns `None` on timeout or
    /// closure.
    pub async fn recv_timeout(&self, timeout: std::time::Duration) -> Option<Bytes> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }

    /// Current number of queued frames, for stats reporting.
    pub fn depth(&self) -> usize {
        self.inner.queue.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_order() {
        let (tx, rx) = frame_pipe(4);
        tx.push(Bytes::from_static(b"a"));
        tx.push(Bytes::from_static(b"b"));
        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"a")));
        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"b")));
    }

    #[tokio::test]
    async fn drops_oldest_on_overflow() {
        let (tx, rx) = frame_pipe(2);
        tx.push(Bytes::from_static(b"1"));
        tx.push(Bytes::from_static(b"2"));
        assert!(tx.push(Bytes::from_static(b"3")));
        assert_eq!(rx.depth(), 2);
        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"2")));
        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"3")));
    }

    #[tokio::test]
    async fn burst_of_150_caps_depth_at_capacity() {
        let (tx, rx) = frame_pipe(100);
        for i in 0..150u32 {
            tx.push(Bytes::from(i.to_le_bytes().to_vec()));
        }
        assert_eq!(rx.depth(), 100);
    }

    #[tokio::test]
    async fn close_drains_then_returns_none() {
        let (tx, rx) = frame_pipe(4);
        tx.push(Bytes::from_static(b"a"));
        tx.close();
        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"a")));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn recv_timeout_returns_none_when_empty() {
        let (_tx, rx) = frame_pipe(4);
        let got = rx.recv_timeout(std::time::Duration::from_millis(20)).await;
        assert_eq!(got, None);
    }
}
