//! Narrow capability port onto the media router (SFU)
//!
//! The bridge consumes the router through this trait only: create a plain
//! relay endpoint, attach a consumer to a producer, request a keyframe, and
//! close what it opened. Transport internals (ICE/DTLS/RTP) stay on the
//! router's side of the boundary.
//!
//! The dependency direction is inward: the core never registers callbacks on
//! router objects. The signaling layer calls [`crate::context::BridgeContext`]
//! entry points when producers appear or close.

use async_trait::async_trait;

use crate::codec::CodecDescriptor;
use crate::error::Result;

/// Identifier of a producer (a published track) on the router
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProducerId(pub String);

/// Identifier of a relay endpoint created on the router
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointId(pub String);

/// Identifier of a consumer attached to an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsumerId(pub String);

impl std::fmt::Display for ProducerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProducerId {
    fn from(s: &str) -> Self {
        ProducerId(s.to_string())
    }
}

/// Media kind of a producer or consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl MediaKind {
    /// The SDP media-line name for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// Capability surface the bridge needs from the media router
///
/// Implementations wrap whatever SFU is in use. All methods are fallible;
/// router-side failures surface as [`crate::error::Error::Router`].
#[async_trait]
pub trait MediaRouter: Send + Sync {
    /// Create a plain relay endpoint delivering RTP/RTCP to the given local
    /// port pair
    async fn create_endpoint(&self, rtp_port: u16, rtcp_port: u16) -> Result<EndpointId>;

    /// Attach a consumer of `producer` feeding the endpoint
    async fn connect_consumer(
        &self,
        endpoint: &EndpointId,
        producer: &ProducerId,
    ) -> Result<ConsumerId>;

    /// Ask the producer behind this consumer for an immediate keyframe
    async fn request_keyframe(&self, consumer: &ConsumerId) -> Result<()>;

    /// Close a consumer; closing an already-closed consumer is not an error
    async fn close_consumer(&self, consumer: &ConsumerId) -> Result<()>;

    /// Close an endpoint; closing an already-closed endpoint is not an error
    async fn close_endpoint(&self, endpoint: &EndpointId) -> Result<()>;

    /// The producer's negotiated codec, or `None` if nothing usable was
    /// negotiated (the bridge skips such inputs)
    async fn producer_codec(&self, producer: &ProducerId) -> Result<Option<CodecDescriptor>>;

    /// Video resolution of the producer once the router has observed it
    async fn video_dimensions(&self, producer: &ProducerId) -> Result<Option<(u32, u32)>>;
}
