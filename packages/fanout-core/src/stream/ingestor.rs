//! Ingestor: supervises one transcoder subprocess for a Stream, reading
//! fixed-size raw frames from its stdout and feeding the Frame Pipe.
//!
//! One Ingestor task corresponds to one cancellation epoch. When `cancel`
//! fires (external stop, or a Health Monitor restart), the task kills its
//! subprocess and returns; a fresh Ingestor task is spawned against a fresh
//! cancel token by whoever fired the old one. Transient subprocess failures
//! (non-zero exit, short read, spawn error) are retried in-place with a
//! fixed backoff and never end the task on their own.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::config::StreamDefaults;
use crate::stream::Stream;

/// Spawns the Ingestor task for `stream` against `cancel`.
pub(crate) fn spawn_ingestor(
    stream: Arc<Stream>,
    config: Arc<StreamDefaults>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::info!("[Ingestor {}] cancelled before subprocess start", stream.stream_id);
                    return;
                }
                result = run_one_subprocess(&stream, &config, &cancel) => {
                    match result {
                        Ok(RunOutcome::Cancelled) => {
                            log::info!("[Ingestor {}] cancelled", stream.stream_id);
                            return;
                        }
                        Ok(RunOutcome::Ended) => {
                            log::warn!(
                                "[Ingestor {}] transcoder ended, retrying in {}s",
                                stream.stream_id, config.restart_delay_secs
                            );
                        }
                        Err(e) => {
                            log::warn!("[Ingestor {}] {}", stream.stream_id, e);
                        }
                    }
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::info!("[Ingestor {}] cancelled during restart backoff", stream.stream_id);
                    return;
                }
                _ = tokio::time::sleep(Duration::from_secs(config.restart_delay_secs)) => {}
            }
        }
    })
}

enum RunOutcome {
    Cancelled,
    Ended,
}

async fn run_one_subprocess(
    stream: &Arc<Stream>,
    config: &StreamDefaults,
    cancel: &CancellationToken,
) -> Result<RunOutcome, String> {
    let mut child = spawn_transcoder(config, &stream.source_url, stream.width, stream.height)
        .map_err(|e| format!("failed to start transcoder: {e}"))?;

    if let Some(stderr) = child.stderr.take() {
        let stream_id = stream.stream_id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::debug!("[Ingestor {stream_id}] transcoder: {line}");
            }
        });
    }

    let Some(mut stdout) = child.stdout.take() else {
        let _ = child.kill().await;
        return Err("transcoder started without a stdout pipe".into());
    };

    let frame_bytes = stream.frame_bytes();
    let mut buf = vec![0u8; frame_bytes];

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Ok(RunOutcome::Cancelled);
            }
            read_result = stdout.read_exact(&mut buf) => {
                match read_result {
                    Ok(_) => {
                        stream.record_frame(Bytes::copy_from_slice(&buf));
                    }
                    Err(_) => {
                        // Short read or EOF: treat as end-of-stream, not cancellation.
                        let _ = child.kill().await;
                        return Ok(RunOutcome::Ended);
                    }
                }
            }
        }
    }
}

fn spawn_transcoder(
    config: &StreamDefaults,
    source_url: &str,
    width: u32,
    height: u32,
) -> std::io::Result<Child> {
    Command::new(&config.transcoder_path)
        .args([
            "-rtsp_transport",
            "tcp",
            "-i",
            source_url,
            "-f",
            "rawvideo",
            "-pix_fmt",
            "bgr24",
            "-s",
            &format!("{width}x{height}"),
            "-an",
            "-",
        ])
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}
