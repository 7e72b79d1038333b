//! Broadcaster: the single task per Stream that drains the Frame Pipe and
//! fans each frame out to every attached Client's queue without blocking.

use std::sync::Arc;

use crate::stream::Stream;

/// Spawns the Broadcaster task. Terminates when the Frame Pipe is closed.
pub(crate) fn spawn_broadcaster(stream: Arc<Stream>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Some(frame) = stream.pipe_rx.recv().await else {
                break;
            };

            // DashMap shards its own locking; cloning the handles we iterate
            // over is the snapshot-then-release step the clients_mu
            // discipline calls for, so no Client is ever touched while the
            // map itself is locked.
            let snapshot: Vec<_> = stream
                .clients
                .iter()
                .map(|entry| entry.value().clone())
                .collect();

            for client in snapshot {
                if client.is_closed() {
                    continue;
                }
                if !client.queue().try_push(frame.clone()) {
                    log::debug!(
                        "[Broadcaster {}] dropped frame for slow client {}",
                        stream.stream_id, client.client_id
                    );
                }
            }
        }

        log::info!("[Broadcaster {}] terminated", stream.stream_id);
    })
}
