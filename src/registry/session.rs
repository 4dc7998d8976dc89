//! Session types
//!
//! A session is the unit of process ownership: one transcoder process plus
//! every resource it depends on (relay endpoints, consumptions, the publish
//! timer, the on-disk directory), recorded so teardown can release them in
//! order.

use std::path::PathBuf;

use tokio::task::JoinHandle;

use crate::ports::PortPair;
use crate::router::{ConsumerId, EndpointId, MediaKind, ProducerId};
use crate::transcoder::TranscoderHandle;

/// Key a session lives under
///
/// Either one producer's own output session or the shared composite
/// session. Renders as the session's directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// Output for a single producer
    Producer(ProducerId),
    /// The combined multi-participant output
    Composite,
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionKey::Producer(id) => write!(f, "{}", id),
            SessionKey::Composite => f.write_str("composite"),
        }
    }
}

/// A relay socket pair on the router, owned by exactly one consumption
#[derive(Debug, Clone)]
pub struct MediaEndpoint {
    /// Router-side endpoint id
    pub id: EndpointId,
    /// Local RTP/RTCP ports reserved for it
    pub ports: PortPair,
}

/// One endpoint's subscription to one producer's media
#[derive(Debug, Clone)]
pub struct Consumption {
    /// Router-side consumer id
    pub id: ConsumerId,
    /// Producer being consumed
    pub producer: ProducerId,
    /// Media kind of the track
    pub kind: MediaKind,
}

/// A live output session and everything it owns
///
/// Built up by the coordinator between `acquire` and `install`; torn down
/// as a whole by the registry.
pub struct Session {
    /// Key this session lives under
    pub key: SessionKey,

    /// On-disk directory holding descriptors, playlist and segments
    pub dir: PathBuf,

    /// The external transcoder process, once spawned
    pub process: Option<TranscoderHandle>,

    /// The recurring publish timer, once started
    pub publish: Option<JoinHandle<()>>,

    /// Descriptor-refresh tasks still waiting on video dimensions
    pub refresh_tasks: Vec<JoinHandle<()>>,

    /// Relay endpoints created for this session
    pub endpoints: Vec<MediaEndpoint>,

    /// Consumptions attached to those endpoints
    pub consumptions: Vec<Consumption>,
}

impl Session {
    /// Create an empty session rooted at `dir`
    pub fn new(key: SessionKey, dir: PathBuf) -> Self {
        Self {
            key,
            dir,
            process: None,
            publish: None,
            refresh_tasks: Vec::new(),
            endpoints: Vec::new(),
            consumptions: Vec::new(),
        }
    }

    /// Record an endpoint for teardown
    pub fn add_endpoint(&mut self, endpoint: MediaEndpoint) {
        self.endpoints.push(endpoint);
    }

    /// Record a consumption for teardown
    pub fn add_consumption(&mut self, consumption: Consumption) {
        self.consumptions.push(consumption);
    }

    /// Record a descriptor-refresh task for teardown
    pub fn add_refresh_task(&mut self, task: JoinHandle<()>) {
        self.refresh_tasks.push(task);
    }

    /// Video consumers of this session, in input order
    pub fn video_consumers(&self) -> Vec<ConsumerId> {
        self.consumptions
            .iter()
            .filter(|c| c.kind == MediaKind::Video)
            .map(|c| c.id.clone())
            .collect()
    }
}
