//! Readiness gate for synthesized descriptors
//!
//! The transcoder aborts if a video SDP it reads carries no resolution, so a
//! rebuild only spawns it once every video descriptor file exists and parses
//! to non-zero dimensions. Audio-only descriptors are exempt and simply not
//! passed to the gate.
//!
//! Dimensions arrive asynchronously from the router; a per-input refresh
//! task rewrites the descriptor (full replace) once they are known, and the
//! gate polls the files until they all carry them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::codec::CodecDescriptor;
use crate::error::{Error, Result};
use crate::ports::PortPair;
use crate::router::{MediaRouter, ProducerId};
use crate::sdp::SdpWriter;

/// Extract non-zero video dimensions from descriptor text
///
/// Reads the `a=framesize:<pt> <w>-<h>` annotation written by the
/// synthesizer once the router has reported the track's resolution.
pub fn parse_video_dimensions(text: &str) -> Option<(u32, u32)> {
    for line in text.lines() {
        let rest = match line.trim_end().strip_prefix("a=framesize:") {
            Some(rest) => rest,
            None => continue,
        };
        let size = rest.split_whitespace().nth(1)?;
        let (w, h) = size.split_once('-')?;
        let width: u32 = w.parse().ok()?;
        let height: u32 = h.parse().ok()?;
        if width > 0 && height > 0 {
            return Some((width, height));
        }
    }
    None
}

async fn descriptor_ready(path: &Path) -> bool {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => parse_video_dimensions(&text).is_some(),
        Err(_) => false,
    }
}

/// Poll until every video descriptor carries valid dimensions
///
/// Fails with [`Error::ReadinessTimeout`] once `timeout` has elapsed with
/// any descriptor still missing or dimensionless.
pub async fn wait_for_descriptors(
    paths: &[PathBuf],
    poll: Duration,
    timeout: Duration,
) -> Result<()> {
    let started = Instant::now();

    loop {
        let mut all_ready = true;
        for path in paths {
            if !descriptor_ready(path).await {
                all_ready = false;
                break;
            }
        }
        if all_ready {
            return Ok(());
        }

        let waited = started.elapsed();
        if waited >= timeout {
            return Err(Error::ReadinessTimeout { waited });
        }
        tokio::time::sleep(poll).await;
    }
}

/// Rewrite a video descriptor once the router learns its resolution
///
/// Polls `video_dimensions` at the gate's cadence and performs one full
/// replacement write when they become known, then stops. Gives up quietly
/// after `timeout`; the readiness gate reports the failure.
pub fn spawn_descriptor_refresh(
    router: Arc<dyn MediaRouter>,
    producer: ProducerId,
    codec: CodecDescriptor,
    ports: PortPair,
    path: PathBuf,
    poll: Duration,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        loop {
            match router.video_dimensions(&producer).await {
                Ok(Some((width, height))) if width > 0 && height > 0 => {
                    let mut sdp = SdpWriter::new(producer.to_string());
                    sdp.add_media(&codec, ports, Some((width, height)));
                    if let Err(e) = sdp.write_to(&path).await {
                        tracing::warn!(producer = %producer, error = %e, "Descriptor rewrite failed");
                    } else {
                        tracing::debug!(
                            producer = %producer,
                            width,
                            height,
                            "Descriptor updated with frame size"
                        );
                    }
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(producer = %producer, error = %e, "Dimension query failed");
                }
            }
            if started.elapsed() >= timeout {
                tracing::debug!(producer = %producer, "Gave up waiting for dimensions");
                return;
            }
            tokio::time::sleep(poll).await;
        }
    })
}
