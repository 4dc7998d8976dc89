//! Bridge context
//!
//! The single entry object owning the registry and the composite
//! coordinator. The signaling layer calls these methods on produce/close
//! events; nothing in the core holds global state, so several independent
//! bridges can coexist in one process.

use std::path::PathBuf;
use std::sync::Arc;

use crate::composite::CompositeCoordinator;
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::publish::{PublishMode, PublishTask};
use crate::readiness;
use crate::registry::{SessionKey, SessionRegistry};
use crate::router::{MediaKind, MediaRouter, ProducerId};
use crate::transcoder::{KeyframeTicker, TranscoderCommand, TranscoderHandle};

/// Publish target per-producer sessions mirror into
pub const LIVE_PUBLISH_TARGET: &str = "live";

/// Owns one bridge instance: registry, coordinator and config
pub struct BridgeContext {
    config: BridgeConfig,
    registry: Arc<SessionRegistry>,
    coordinator: CompositeCoordinator,
}

impl BridgeContext {
    /// Create a bridge over the given router
    pub fn new(config: BridgeConfig, router: Arc<dyn MediaRouter>) -> Self {
        let registry = Arc::new(SessionRegistry::new(router, &config));
        let coordinator = CompositeCoordinator::new(Arc::clone(&registry), config.clone());
        Self {
            config,
            registry,
            coordinator,
        }
    }

    /// The session registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The composite coordinator
    pub fn coordinator(&self) -> &CompositeCoordinator {
        &self.coordinator
    }

    /// A participant's producer appeared; joins the composite
    pub async fn producer_added(
        &self,
        participant: &str,
        kind: MediaKind,
        producer: ProducerId,
    ) {
        self.coordinator
            .producer_added(participant, kind, producer)
            .await;
    }

    /// The router reports a producer closed
    ///
    /// Tears down the producer's own session, if any, and rebuilds the
    /// composite without it.
    pub async fn notify_producer_closed(&self, producer: &ProducerId) {
        self.registry
            .release(&SessionKey::Producer(producer.clone()))
            .await;
        self.coordinator.producer_closed(producer).await;
    }

    /// A participant disconnected entirely
    pub async fn participant_left(&self, participant: &str) {
        self.coordinator.participant_left(participant).await;
    }

    /// Start a dedicated output session for one producer
    ///
    /// The session transcodes just this producer's track and publishes into
    /// the `live/` target with the freshness gate. Restarting an existing
    /// session evicts the old one first.
    pub async fn start_producer_session(&self, producer: &ProducerId) -> Result<()> {
        let key = SessionKey::Producer(producer.clone());
        let mut session = self.registry.acquire(&key).await?;

        let kind = match self.registry.router().producer_codec(producer).await? {
            Some(codec) => codec.kind,
            None => {
                self.registry.discard(session).await;
                return Err(crate::error::Error::NoUsableCodec(producer.clone()));
            }
        };

        let label = producer.to_string();
        let path = match self
            .registry
            .attach_producer(&mut session, &label, kind, producer)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                self.registry.discard(session).await;
                return Err(e);
            }
        };

        let (video_paths, audio_paths) = match kind {
            MediaKind::Video => (vec![path], Vec::new()),
            MediaKind::Audio => (Vec::new(), vec![path]),
        };

        if !video_paths.is_empty() {
            if let Err(e) = readiness::wait_for_descriptors(
                &video_paths,
                self.config.readiness_poll,
                self.config.readiness_timeout,
            )
            .await
            {
                self.registry.discard(session).await;
                return Err(e);
            }
        }

        let cmd =
            TranscoderCommand::build(&self.config, &session.dir, &video_paths, &audio_paths);
        let ticker = (!video_paths.is_empty()).then(|| {
            KeyframeTicker::new(
                Arc::clone(self.registry.router()),
                session.video_consumers(),
                self.config.keyframe_interval(),
            )
        });

        match TranscoderHandle::spawn(&cmd, ticker) {
            Ok(process) => session.process = Some(process),
            Err(e) => {
                self.registry.discard(session).await;
                return Err(e);
            }
        }

        session.publish = Some(PublishTask::spawn(
            session.dir.clone(),
            self.registry.publish_dir(LIVE_PUBLISH_TARGET),
            self.config.publish_interval,
            PublishMode::PerProducer {
                staleness: self.config.publish_staleness,
            },
        ));

        tracing::info!(producer = %producer, "Producer session started");
        self.registry.install(session).await;
        Ok(())
    }

    /// Stop a producer's dedicated session, if running
    pub async fn stop_producer_session(&self, producer: &ProducerId) {
        self.registry
            .release(&SessionKey::Producer(producer.clone()))
            .await;
    }

    // Read-only status surface consumed by the serving layer

    /// Keys of every installed session
    pub async fn active_sessions(&self) -> Vec<SessionKey> {
        self.registry.active_keys().await
    }

    /// Number of participants contributing to the composite
    pub async fn participant_count(&self) -> usize {
        self.coordinator.participant_count().await
    }

    /// Whether the composite session is live
    pub fn composite_active(&self) -> bool {
        self.coordinator.is_active()
    }

    /// Directory a session writes into
    pub fn session_dir(&self, key: &SessionKey) -> PathBuf {
        self.registry.session_dir(key)
    }
}
