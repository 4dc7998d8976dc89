//! Live-output publishing loop
//!
//! The transcoder writes its playlist and segments into the session's own
//! directory; consumers poll one stable well-known location instead. A
//! periodic task mirrors the freshest segment set across, so the serving
//! path never depends on which session produced the latest output.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;

/// How a publish target treats its source
#[derive(Debug, Clone)]
pub enum PublishMode {
    /// Per-producer target (`live/`): skip the tick when the source
    /// playlist has gone stale, so a stalled stream is not republished
    PerProducer {
        /// Freshness window for the source playlist
        staleness: Duration,
    },
    /// Composite target (`combined/`): always mirror, and touch the
    /// destination playlist's mtime to signal liveness
    Composite,
}

/// Recurring mirror of a session directory to a publish target
pub struct PublishTask;

impl PublishTask {
    /// Spawn the publish loop
    ///
    /// The interval must stay below the segment duration so consumers never
    /// observe a playlist referencing segments that were not copied yet.
    /// The returned handle is aborted at session teardown.
    pub fn spawn(
        source_dir: PathBuf,
        dest_dir: PathBuf,
        interval: Duration,
        mode: PublishMode,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = publish_once(&source_dir, &dest_dir, &mode).await {
                    tracing::warn!(
                        source = %source_dir.display(),
                        dest = %dest_dir.display(),
                        error = %e,
                        "Publish tick failed"
                    );
                }
            }
        })
    }
}

/// Mirror one segment set; a single tick of the loop
pub(crate) async fn publish_once(
    source_dir: &Path,
    dest_dir: &Path,
    mode: &PublishMode,
) -> std::io::Result<()> {
    let playlist = source_dir.join("playlist.m3u8");
    let meta = match tokio::fs::metadata(&playlist).await {
        Ok(meta) => meta,
        // No playlist yet; the transcoder has not produced output
        Err(_) => return Ok(()),
    };

    if let PublishMode::PerProducer { staleness } = mode {
        let fresh = meta
            .modified()
            .ok()
            .and_then(|m| m.elapsed().ok())
            .map(|age| age <= *staleness)
            .unwrap_or(true);
        if !fresh {
            tracing::debug!(source = %source_dir.display(), "Source playlist stale, skipping");
            return Ok(());
        }
    }

    tokio::fs::create_dir_all(dest_dir).await?;

    // Segments first, playlist last, so a freshly-copied playlist never
    // references a segment that has not landed yet
    let mut entries = tokio::fs::read_dir(source_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with("segment_") {
            continue;
        }
        if let Err(e) = tokio::fs::copy(entry.path(), dest_dir.join(name.as_ref())).await {
            tracing::warn!(segment = %name, error = %e, "Segment copy failed");
        }
    }

    let dest_playlist = dest_dir.join("playlist.m3u8");
    tokio::fs::copy(&playlist, &dest_playlist).await?;

    if matches!(mode, PublishMode::Composite) {
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&dest_playlist)
            .await?;
        file.into_std().await.set_modified(SystemTime::now())?;
    }

    Ok(())
}
