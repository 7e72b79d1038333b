//! Health Monitor: periodically checks time-since-last-frame and forces an
//! Ingestor restart when a Stream has stalled.

use std::sync::Arc;
use std::time::Duration;

use crate::config::StreamDefaults;
use crate::stream::Stream;

use super::spawn_ingestor;

/// Spawns the Health Monitor task. Terminates when `stream`'s `health_stop`
/// token is cancelled.
pub(crate) fn spawn_health_monitor(
    stream: Arc<Stream>,
    config: Arc<StreamDefaults>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let health_stop = stream.health_stop.clone();
        let interval = Duration::from_secs(config.health_interval_secs);
        let stall_threshold = Duration::from_secs(config.stall_threshold_secs);

        loop {
            tokio::select! {
                biased;
                _ = health_stop.cancelled() => {
                    log::info!("[Health {}] stopped", stream.stream_id);
                    return;
                }
                _ = tokio::time::sleep(interval) => {
                    let (running, last_frame_time) = stream.liveness();
                    if !running {
                        continue;
                    }
                    let Some(last) = last_frame_time else { continue };
                    if last.elapsed() <= stall_threshold {
                        continue;
                    }

                    log::warn!(
                        "[Health {}] stalled for {:?}, forcing restart",
                        stream.stream_id, last.elapsed()
                    );
                    let fresh_cancel = stream.rotate_cancel();
                    stream.mark_not_running();
                    spawn_ingestor(stream.clone(), config.clone(), fresh_cancel);
                }
            }
        }
    })
}
