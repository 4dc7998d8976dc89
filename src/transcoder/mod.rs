//! External transcoder integration
//!
//! This module owns the boundary to the transcoder binary:
//! - argument-vector construction from the session's SDP inputs
//! - process spawn/kill supervision and output draining
//! - the per-generation keyframe ticker

pub mod args;
pub mod supervisor;

pub use args::TranscoderCommand;
pub use supervisor::{KeyframeTicker, TranscoderHandle};
