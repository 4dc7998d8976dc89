//! Composite session coordination
//!
//! Membership tracking plus the rebuild state machine. Every membership
//! change rebuilds the whole composite pipeline: endpoints, consumptions,
//! descriptors, filter graph, transcoder process and publish loop.

pub mod coordinator;
pub mod membership;

pub use coordinator::{CompositeCoordinator, CompositeState, COMPOSITE_PUBLISH_TARGET};
pub use membership::{CompositeMembership, ProducerSession};
