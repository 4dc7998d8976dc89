//! SFU-to-HLS bridge
//!
//! Bridges a media router's producer tracks into segmented HTTP streams by
//! driving an external transcoder process per logical output session. The
//! router relays each track as plain RTP to a local endpoint; a synthesized
//! SDP descriptor tells the transcoder how to receive it; the transcoder
//! composites, encodes and segments; a publish loop mirrors the result to a
//! stable well-known location.
//!
//! # Data flow
//!
//! ```text
//!  producer add/remove
//!          │
//!          ▼
//!  CompositeCoordinator ──► Layout (grid + filter graph)
//!          │
//!          ▼
//!  SessionRegistry ──► relay endpoint + consumer per input
//!          │                  │
//!          │                  ▼
//!          │           SdpWriter ──► <session>/<kind>_<id>.sdp
//!          │                  │
//!          │                  ▼
//!          │           readiness gate (dimensions present?)
//!          ▼                  │
//!  TranscoderHandle ◄─────────┘
//!          │  (ffmpeg: sdp inputs → filter graph → HLS)
//!          ▼
//!  <session>/playlist.m3u8 + segment_*.ts
//!          │
//!          ▼
//!  PublishTask ──► <root>/live/ or <root>/combined/
//! ```
//!
//! The [`context::BridgeContext`] owns all of this; the signaling layer
//! calls its entry points and nothing here registers callbacks on router
//! objects or holds global state.

pub mod codec;
pub mod composite;
pub mod config;
pub mod context;
pub mod error;
pub mod layout;
pub mod ports;
pub mod publish;
pub mod readiness;
pub mod registry;
pub mod router;
pub mod sdp;
pub mod transcoder;

#[cfg(test)]
pub mod testing;

pub use codec::{AudioCodecParams, CodecDescriptor, CodecParams, VideoCodecParams};
pub use composite::{CompositeCoordinator, CompositeState};
pub use config::BridgeConfig;
pub use context::BridgeContext;
pub use error::{Error, Result};
pub use layout::Grid;
pub use registry::{Session, SessionKey, SessionRegistry};
pub use router::{ConsumerId, EndpointId, MediaKind, MediaRouter, ProducerId};
