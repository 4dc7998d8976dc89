//! Session registry implementation
//!
//! Tracks live output sessions and enforces the one invariant everything
//! else leans on: at most one session is alive per key, and a new session
//! for a key only starts allocating after the old one's resources have been
//! released. The old process holds the RTP ports and the session directory
//! open, so ordering is not optional.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::session::{Consumption, MediaEndpoint, Session, SessionKey};
use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::ports::{PortPair, PortPool};
use crate::readiness;
use crate::router::{MediaKind, MediaRouter, ProducerId};
use crate::sdp::SdpWriter;

/// Registry of live output sessions
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionKey, Session>>,
    router: Arc<dyn MediaRouter>,
    ports: PortPool,
    config: BridgeConfig,
}

impl SessionRegistry {
    /// Create a registry backed by the given router
    pub fn new(router: Arc<dyn MediaRouter>, config: &BridgeConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            router,
            ports: PortPool::new(config.rtp_port_range.clone()),
            config: config.clone(),
        }
    }

    /// Reserve an RTP/RTCP port pair for a session's endpoint
    pub fn allocate_ports(&self) -> Result<PortPair> {
        self.ports.allocate()
    }

    /// Attach one producer as a transcoder input of `session`
    ///
    /// Creates the relay endpoint and consumption, records both on the
    /// session for teardown, and writes the input's descriptor file. Video
    /// inputs whose resolution is not yet known get a refresh task that
    /// rewrites the descriptor once it is. Returns the descriptor path.
    ///
    /// A producer with no usable negotiated codec fails with
    /// [`Error::NoUsableCodec`]; nothing is allocated in that case.
    pub async fn attach_producer(
        &self,
        session: &mut Session,
        label: &str,
        kind: MediaKind,
        producer: &ProducerId,
    ) -> Result<PathBuf> {
        let codec = self
            .router
            .producer_codec(producer)
            .await?
            .ok_or_else(|| Error::NoUsableCodec(producer.clone()))?;

        let ports = self.allocate_ports()?;
        let endpoint = match self.router.create_endpoint(ports.rtp, ports.rtcp).await {
            Ok(id) => id,
            Err(e) => {
                // Not recorded on the session yet, reclaim by hand
                self.ports.release(ports);
                return Err(e);
            }
        };
        // Record before the next fallible step so teardown covers it
        session.add_endpoint(MediaEndpoint {
            id: endpoint.clone(),
            ports,
        });

        let consumer = self.router.connect_consumer(&endpoint, producer).await?;
        session.add_consumption(Consumption {
            id: consumer,
            producer: producer.clone(),
            kind,
        });

        let path = session.dir.join(format!("{}_{}.sdp", kind.as_str(), label));
        let framesize = match kind {
            MediaKind::Video => self.router.video_dimensions(producer).await.unwrap_or(None),
            MediaKind::Audio => None,
        };

        let mut sdp = SdpWriter::new(producer.to_string());
        sdp.add_media(&codec, ports, framesize);
        sdp.write_to(&path).await?;

        if kind == MediaKind::Video && framesize.is_none() {
            session.add_refresh_task(readiness::spawn_descriptor_refresh(
                Arc::clone(&self.router),
                producer.clone(),
                codec,
                ports,
                path.clone(),
                self.config.readiness_poll,
                self.config.readiness_timeout,
            ));
        }

        tracing::debug!(
            session = %session.key,
            producer = %producer,
            kind = kind.as_str(),
            rtp_port = ports.rtp,
            "Input attached"
        );

        Ok(path)
    }

    /// Begin a fresh session under `key`
    ///
    /// Any existing session under the key is fully released first; only
    /// then is the session directory created and an empty session returned
    /// for the caller to populate and [`install`].
    ///
    /// [`install`]: SessionRegistry::install
    pub async fn acquire(&self, key: &SessionKey) -> Result<Session> {
        self.release(key).await;

        let dir = self.session_dir(key);
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!(session = %key, dir = %dir.display(), "Session acquired");

        Ok(Session::new(key.clone(), dir))
    }

    /// Record a populated session under its key
    ///
    /// If another session is still installed under the key (two builds
    /// interleaved between `acquire` and `install`), the displaced one's
    /// resources go through the full teardown. Its directory is left alone:
    /// both builds share it and the new session owns it now.
    pub async fn install(&self, session: Session) {
        let key = session.key.clone();
        let displaced = self.sessions.lock().await.insert(key.clone(), session);
        if let Some(displaced) = displaced {
            tracing::warn!(session = %key, "Replaced a session that was still installed");
            self.release_resources(displaced).await;
        }
        tracing::info!(session = %key, "Session installed");
    }

    /// Release the session under `key`, if any
    ///
    /// Idempotent. Every resource close is best-effort: failures are logged
    /// per resource and never stop the rest of the teardown.
    pub async fn release(&self, key: &SessionKey) {
        let session = self.sessions.lock().await.remove(key);
        match session {
            Some(session) => self.release_session(session).await,
            None => {
                tracing::debug!(session = %key, "Release: no session under key");
            }
        }
    }

    /// Tear down a session that was never installed
    ///
    /// Used when a rebuild fails partway: the half-populated session's
    /// resources go through the same ordered, best-effort teardown.
    pub async fn discard(&self, session: Session) {
        self.release_session(session).await;
    }

    async fn release_session(&self, session: Session) {
        let key = session.key.clone();
        let dir = session.dir.clone();
        self.release_resources(session).await;

        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(session = %key, error = %e, "Session directory removal failed");
            }
        }

        tracing::info!(session = %key, "Session released");
    }

    async fn release_resources(&self, mut session: Session) {
        let key = session.key.clone();

        // Process first: it holds the ports and the directory open
        if let Some(mut process) = session.process.take() {
            process.kill();
        }
        if let Some(publish) = session.publish.take() {
            publish.abort();
        }
        for task in session.refresh_tasks.drain(..) {
            task.abort();
        }

        for consumption in session.consumptions.drain(..) {
            if let Err(e) = self.router.close_consumer(&consumption.id).await {
                tracing::warn!(
                    session = %key,
                    consumer = %consumption.id,
                    error = %e,
                    "Consumer close failed"
                );
            }
        }

        for endpoint in session.endpoints.drain(..) {
            if let Err(e) = self.router.close_endpoint(&endpoint.id).await {
                tracing::warn!(
                    session = %key,
                    endpoint = %endpoint.id,
                    error = %e,
                    "Endpoint close failed"
                );
            }
            self.ports.release(endpoint.ports);
        }
    }

    /// The media router this registry allocates against
    pub fn router(&self) -> &Arc<dyn MediaRouter> {
        &self.router
    }

    /// Directory a session under `key` writes into
    pub fn session_dir(&self, key: &SessionKey) -> PathBuf {
        self.config.output_root.join(key.to_string())
    }

    /// Directory a publish target mirrors into
    pub fn publish_dir(&self, target: &str) -> PathBuf {
        self.config.output_root.join(target)
    }

    /// Whether a session is currently installed under `key`
    pub async fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.lock().await.contains_key(key)
    }

    /// Keys of all installed sessions
    pub async fn active_keys(&self) -> Vec<SessionKey> {
        self.sessions.lock().await.keys().cloned().collect()
    }

    /// Number of installed sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::session::{Consumption, MediaEndpoint};
    use crate::router::{MediaKind, ProducerId};
    use crate::testing::StubRouter;

    fn test_config(root: &std::path::Path) -> BridgeConfig {
        BridgeConfig::with_root(root).rtp_port_range(21000..21008)
    }

    async fn populated_session(
        registry: &SessionRegistry,
        router: &Arc<StubRouter>,
        key: &SessionKey,
    ) -> Session {
        let producer = ProducerId("cam".to_string());
        router.add_video_producer(&producer, Some((640, 480)));

        let mut session = registry.acquire(key).await.unwrap();
        let ports = registry.allocate_ports().unwrap();
        let endpoint = router.create_endpoint(ports.rtp, ports.rtcp).await.unwrap();
        let consumer = router.connect_consumer(&endpoint, &producer).await.unwrap();
        session.add_endpoint(MediaEndpoint { id: endpoint, ports });
        session.add_consumption(Consumption {
            id: consumer,
            producer,
            kind: MediaKind::Video,
        });
        session
    }

    #[tokio::test]
    async fn test_acquire_creates_session_dir() {
        let root = tempfile::tempdir().unwrap();
        let router = Arc::new(StubRouter::new());
        let registry = SessionRegistry::new(router.clone(), &test_config(root.path()));

        let session = registry.acquire(&SessionKey::Composite).await.unwrap();
        assert!(session.dir.is_dir());
        assert_eq!(session.dir, root.path().join("composite"));
    }

    #[tokio::test]
    async fn test_reacquire_releases_before_allocating() {
        let root = tempfile::tempdir().unwrap();
        let router = Arc::new(StubRouter::new());
        let registry = SessionRegistry::new(router.clone(), &test_config(root.path()));
        let key = SessionKey::Composite;

        let session = populated_session(&registry, &router, &key).await;
        registry.install(session).await;
        router.clear_events();

        // Second acquire for the same key: every release side effect must
        // precede any new allocation side effect
        let second = populated_session(&registry, &router, &key).await;
        let events = router.events();

        let close_consumer = events
            .iter()
            .position(|e| e.starts_with("close_consumer"))
            .expect("old consumer closed");
        let close_endpoint = events
            .iter()
            .position(|e| e.starts_with("close_endpoint"))
            .expect("old endpoint closed");
        let create = events
            .iter()
            .position(|e| e.starts_with("create_endpoint"))
            .expect("new endpoint created");
        assert!(close_consumer < create);
        assert!(close_endpoint < create);

        // Consumer closes before its endpoint
        assert!(close_consumer < close_endpoint);

        registry.install(second).await;
        assert_eq!(registry.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_install_over_live_session_releases_it() {
        let root = tempfile::tempdir().unwrap();
        let router = Arc::new(StubRouter::new());
        let registry = SessionRegistry::new(router.clone(), &test_config(root.path()));
        let key = SessionKey::Composite;

        // Two builds for the same key interleave: both fully populated
        // before either installs
        let first = populated_session(&registry, &router, &key).await;
        let second = populated_session(&registry, &router, &key).await;
        registry.install(first).await;
        router.clear_events();

        registry.install(second).await;

        // The displaced session's resources went through the teardown
        let events = router.events();
        assert!(events.iter().any(|e| e.starts_with("close_consumer")));
        assert!(events.iter().any(|e| e.starts_with("close_endpoint")));

        // Its port pair is back in the pool: of the four pairs in the
        // range, only the live session's is still held
        for _ in 0..3 {
            registry.allocate_ports().unwrap();
        }
        assert!(registry.allocate_ports().is_err());

        // The live session keeps the shared directory
        assert!(registry.session_dir(&key).is_dir());
        assert_eq!(registry.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_release_reclaims_ports() {
        let root = tempfile::tempdir().unwrap();
        let router = Arc::new(StubRouter::new());
        let registry = SessionRegistry::new(router.clone(), &test_config(root.path()));
        let key = SessionKey::Composite;

        let session = populated_session(&registry, &router, &key).await;
        registry.install(session).await;

        registry.release(&key).await;

        // All four pairs of 21000..21008 are allocatable again
        let mut taken = Vec::new();
        for _ in 0..4 {
            taken.push(registry.allocate_ports().unwrap());
        }
        assert!(registry.allocate_ports().is_err());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let router = Arc::new(StubRouter::new());
        let registry = SessionRegistry::new(router.clone(), &test_config(root.path()));
        let key = SessionKey::Producer(ProducerId("cam".to_string()));

        let session = populated_session(&registry, &router, &key).await;
        registry.install(session).await;

        registry.release(&key).await;
        let events_after_first = router.events().len();

        // Second release is a no-op: no further close traffic
        registry.release(&key).await;
        assert_eq!(router.events().len(), events_after_first);
        assert!(!registry.contains(&key).await);
    }

    #[tokio::test]
    async fn test_release_removes_session_dir() {
        let root = tempfile::tempdir().unwrap();
        let router = Arc::new(StubRouter::new());
        let registry = SessionRegistry::new(router.clone(), &test_config(root.path()));
        let key = SessionKey::Composite;

        let session = registry.acquire(&key).await.unwrap();
        let dir = session.dir.clone();
        tokio::fs::write(dir.join("playlist.m3u8"), "#EXTM3U\n")
            .await
            .unwrap();
        registry.install(session).await;

        registry.release(&key).await;
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_attach_producer_writes_descriptor() {
        let root = tempfile::tempdir().unwrap();
        let router = Arc::new(StubRouter::new());
        let registry = SessionRegistry::new(router.clone(), &test_config(root.path()));

        let producer = ProducerId("cam".to_string());
        router.add_video_producer(&producer, Some((640, 480)));

        let mut session = registry.acquire(&SessionKey::Composite).await.unwrap();
        let path = registry
            .attach_producer(&mut session, "alice", MediaKind::Video, &producer)
            .await
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "video_alice.sdp");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("m=video"));
        assert!(text.contains("a=framesize:101 640-480"));
        assert_eq!(session.endpoints.len(), 1);
        assert_eq!(session.consumptions.len(), 1);
        // Dimensions were known up front, no refresh task needed
        assert!(session.refresh_tasks.is_empty());
        registry.discard(session).await;
    }

    #[tokio::test]
    async fn test_attach_producer_without_codec_allocates_nothing() {
        let root = tempfile::tempdir().unwrap();
        let router = Arc::new(StubRouter::new());
        let registry = SessionRegistry::new(router.clone(), &test_config(root.path()));

        let producer = ProducerId("broken".to_string());
        router.add_producer_without_codec(&producer);

        let mut session = registry.acquire(&SessionKey::Composite).await.unwrap();
        let result = registry
            .attach_producer(&mut session, "alice", MediaKind::Video, &producer)
            .await;

        assert!(matches!(result, Err(Error::NoUsableCodec(_))));
        assert!(session.endpoints.is_empty());
        assert!(router.events().is_empty());
        registry.discard(session).await;
    }

    #[tokio::test]
    async fn test_close_failure_does_not_stop_teardown() {
        let root = tempfile::tempdir().unwrap();
        let router = Arc::new(StubRouter::new());
        router.fail_consumer_close(true);
        let registry = SessionRegistry::new(router.clone(), &test_config(root.path()));
        let key = SessionKey::Composite;

        let session = populated_session(&registry, &router, &key).await;
        let dir = session.dir.clone();
        registry.install(session).await;

        registry.release(&key).await;

        // Endpoint still closed and directory still removed despite the
        // consumer close failure
        assert!(router
            .events()
            .iter()
            .any(|e| e.starts_with("close_endpoint")));
        assert!(!dir.exists());
    }
}
