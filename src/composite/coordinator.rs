//! Composite rebuild coordination
//!
//! Reacts to producer add/remove by rebuilding the whole composite pipeline
//! from scratch. Rebuilding, rather than patching, is the safe choice: the
//! grid geometry depends on the total participant count, so any membership
//! change can move every cell.
//!
//! The scheduler is single-threaded and cooperative; a single-flight flag
//! stands in for a mutex, but it must be set before the first await and
//! cleared on every exit path, or a concurrently-scheduled rebuild could
//! interleave. A rebuild arriving while one is in flight is dropped, which
//! can leave the layout one generation stale until the next membership
//! change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::membership::CompositeMembership;
use crate::config::BridgeConfig;
use crate::error::Error;
use crate::publish::{PublishMode, PublishTask};
use crate::readiness;
use crate::registry::{SessionKey, SessionRegistry};
use crate::router::{MediaKind, ProducerId};
use crate::transcoder::{KeyframeTicker, TranscoderCommand, TranscoderHandle};

/// Publish target the composite session mirrors into
pub const COMPOSITE_PUBLISH_TARGET: &str = "combined";

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeState {
    /// No composite session is running
    Idle,
    /// One composite session is live
    Active,
}

/// Clears the single-flight flag on every exit path, including panics
struct RebuildGuard<'a>(&'a AtomicBool);

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives the composite session through membership changes
pub struct CompositeCoordinator {
    registry: Arc<SessionRegistry>,
    config: BridgeConfig,
    membership: Mutex<CompositeMembership>,
    state: std::sync::Mutex<CompositeState>,
    rebuilding: AtomicBool,
}

impl CompositeCoordinator {
    /// Create an idle coordinator over the registry
    pub fn new(registry: Arc<SessionRegistry>, config: BridgeConfig) -> Self {
        Self {
            registry,
            config,
            membership: Mutex::new(CompositeMembership::new()),
            state: std::sync::Mutex::new(CompositeState::Idle),
            rebuilding: AtomicBool::new(false),
        }
    }

    /// Current state
    pub fn state(&self) -> CompositeState {
        *self.state.lock().unwrap()
    }

    /// Whether a composite session is live
    pub fn is_active(&self) -> bool {
        self.state() == CompositeState::Active
    }

    /// Number of contributing participants
    pub async fn participant_count(&self) -> usize {
        self.membership.lock().await.participant_count()
    }

    fn set_state(&self, state: CompositeState) {
        *self.state.lock().unwrap() = state;
    }

    /// A participant's producer appeared
    pub async fn producer_added(
        &self,
        participant: &str,
        kind: MediaKind,
        producer: ProducerId,
    ) {
        let changed = self
            .membership
            .lock()
            .await
            .set_producer(participant, kind, producer);
        if changed {
            self.rebuild().await;
        }
    }

    /// A producer closed on the router
    pub async fn producer_closed(&self, producer: &ProducerId) {
        let changed = self.membership.lock().await.clear_producer(producer);
        if changed {
            self.rebuild().await;
        }
    }

    /// A participant disconnected entirely
    pub async fn participant_left(&self, participant: &str) {
        let changed = self.membership.lock().await.remove_participant(participant);
        if changed {
            self.rebuild().await;
        }
    }

    /// Rebuild the composite pipeline under the single-flight guard
    ///
    /// A readiness timeout gets exactly one retry after a fixed delay, then
    /// the rebuild is given up until the next membership change.
    pub async fn rebuild(&self) {
        if self
            .rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Composite rebuild already in flight, dropping request");
            return;
        }
        let _guard = RebuildGuard(&self.rebuilding);

        match self.rebuild_once().await {
            Ok(()) => {}
            Err(Error::ReadinessTimeout { waited }) => {
                tracing::warn!(
                    ?waited,
                    retry_in = ?self.config.readiness_retry_delay,
                    "Composite inputs not ready, retrying once"
                );
                tokio::time::sleep(self.config.readiness_retry_delay).await;
                if let Err(e) = self.rebuild_once().await {
                    tracing::warn!(error = %e, "Composite rebuild retry failed, giving up");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Composite rebuild failed");
            }
        }
    }

    async fn rebuild_once(&self) -> crate::error::Result<()> {
        let snapshot = self.membership.lock().await.clone();
        let key = SessionKey::Composite;

        if snapshot.is_empty() {
            self.registry.release(&key).await;
            self.set_state(CompositeState::Idle);
            tracing::info!("Composite is empty, back to idle");
            return Ok(());
        }

        // Tears down the previous generation before any allocation
        let mut session = self.registry.acquire(&key).await?;

        let mut video_paths = Vec::new();
        let mut audio_paths = Vec::new();

        for (participant, contribution) in snapshot.participants() {
            let slots = [
                (MediaKind::Video, contribution.video.as_ref()),
                (MediaKind::Audio, contribution.audio.as_ref()),
            ];
            for (kind, producer) in slots {
                let Some(producer) = producer else { continue };
                match self
                    .registry
                    .attach_producer(&mut session, participant, kind, producer)
                    .await
                {
                    Ok(path) => match kind {
                        MediaKind::Video => video_paths.push(path),
                        MediaKind::Audio => audio_paths.push(path),
                    },
                    Err(e) => {
                        // Transient negotiation failure: drop this input,
                        // keep the rest
                        tracing::warn!(
                            participant = %participant,
                            producer = %producer,
                            error = %e,
                            "Skipping composite input"
                        );
                    }
                }
            }
        }

        if video_paths.is_empty() && audio_paths.is_empty() {
            tracing::warn!("No usable composite inputs, back to idle");
            self.registry.discard(session).await;
            self.set_state(CompositeState::Idle);
            return Ok(());
        }

        if let Err(e) = readiness::wait_for_descriptors(
            &video_paths,
            self.config.readiness_poll,
            self.config.readiness_timeout,
        )
        .await
        {
            self.registry.discard(session).await;
            self.set_state(CompositeState::Idle);
            return Err(e);
        }

        let cmd =
            TranscoderCommand::build(&self.config, &session.dir, &video_paths, &audio_paths);

        let ticker = if video_paths.is_empty() {
            None
        } else {
            Some(KeyframeTicker::new(
                Arc::clone(self.registry.router()),
                session.video_consumers(),
                self.config.keyframe_interval(),
            ))
        };

        let process = match TranscoderHandle::spawn(&cmd, ticker) {
            Ok(process) => process,
            Err(e) => {
                self.registry.discard(session).await;
                self.set_state(CompositeState::Idle);
                return Err(e);
            }
        };
        session.process = Some(process);

        session.publish = Some(PublishTask::spawn(
            session.dir.clone(),
            self.registry.publish_dir(COMPOSITE_PUBLISH_TARGET),
            self.config.publish_interval,
            PublishMode::Composite,
        ));

        tracing::info!(
            participants = snapshot.participant_count(),
            videos = video_paths.len(),
            audios = audio_paths.len(),
            "Composite session rebuilt"
        );

        self.registry.install(session).await;
        self.set_state(CompositeState::Active);
        Ok(())
    }
}
