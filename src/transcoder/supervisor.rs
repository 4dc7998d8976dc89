//! Transcoder process supervision
//!
//! One [`TranscoderHandle`] owns one process generation: the child, the
//! tasks draining its output, and the keyframe ticker tied to that
//! generation. On exit or kill the ticker is cancelled with it. The
//! supervisor never restarts the process on its own; the next membership
//! rebuild is the only restart trigger.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::args::TranscoderCommand;
use crate::error::{Error, Result};
use crate::router::{ConsumerId, MediaRouter};

/// Periodic keyframe requests for one process generation
///
/// The transcoder can only cut a segment on a keyframe, so every video
/// consumer is asked for one at the forced-keyframe cadence.
pub struct KeyframeTicker {
    router: Arc<dyn MediaRouter>,
    consumers: Vec<ConsumerId>,
    interval: Duration,
}

impl KeyframeTicker {
    /// Create a ticker over the generation's video consumers
    pub fn new(
        router: Arc<dyn MediaRouter>,
        consumers: Vec<ConsumerId>,
        interval: Duration,
    ) -> Self {
        Self {
            router,
            consumers,
            interval,
        }
    }

    fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                for consumer in &self.consumers {
                    if let Err(e) = self.router.request_keyframe(consumer).await {
                        tracing::debug!(consumer = %consumer, error = %e, "Keyframe request failed");
                    }
                }
            }
        })
    }
}

/// Handle to a running transcoder process
///
/// Dropping the handle kills the child (`kill_on_drop`); [`kill`] does the
/// same explicitly and is idempotent.
///
/// [`kill`]: TranscoderHandle::kill
pub struct TranscoderHandle {
    shutdown: Option<oneshot::Sender<()>>,
    monitor: JoinHandle<()>,
}

impl TranscoderHandle {
    /// Spawn the transcoder
    ///
    /// Standard input is discarded; stdout and stderr are drained into the
    /// log for diagnostics only.
    pub fn spawn(cmd: &TranscoderCommand, keyframes: Option<KeyframeTicker>) -> Result<Self> {
        let mut child = tokio::process::Command::new(cmd.program())
            .args(cmd.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(Error::Spawn)?;

        tracing::info!(program = cmd.program(), pid = ?child.id(), "Transcoder spawned");

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(drain_lines(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_lines(stderr, "stderr"));
        }

        let keyframe_task = keyframes.map(KeyframeTicker::spawn);
        let (tx, mut rx) = oneshot::channel::<()>();

        let monitor = tokio::spawn(async move {
            tokio::select! {
                _ = &mut rx => {
                    if let Err(e) = child.start_kill() {
                        tracing::debug!(error = %e, "Transcoder kill failed (already gone)");
                    }
                    let _ = child.wait().await;
                    tracing::debug!("Transcoder killed");
                }
                status = child.wait() => {
                    match status {
                        Ok(status) => {
                            tracing::warn!(%status, "Transcoder exited unexpectedly");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to reap transcoder");
                        }
                    }
                }
            }
            // The keyframe ticker belongs to this generation only
            if let Some(task) = keyframe_task {
                task.abort();
            }
        });

        Ok(Self {
            shutdown: Some(tx),
            monitor,
        })
    }

    /// Kill the process and cancel its keyframe ticker
    ///
    /// Best-effort and idempotent; a second call is a no-op.
    pub fn kill(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Whether the process generation has fully wound down
    pub fn is_finished(&self) -> bool {
        self.monitor.is_finished()
    }
}

impl Drop for TranscoderHandle {
    fn drop(&mut self) {
        self.kill();
    }
}

async fn drain_lines<R>(reader: R, stream: &'static str)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(stream, "{}", line);
    }
}
