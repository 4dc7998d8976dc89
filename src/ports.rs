//! RTP port-pool allocator
//!
//! Relay endpoints need a local RTP/RTCP port pair that stays unique for as
//! long as the transcoder process holds it open. The pool hands out pairs
//! from a bounded range and reclaims them at teardown, so two concurrently
//! live endpoints can never collide.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Mutex;

use crate::error::{Error, Result};

/// A reserved RTP/RTCP port pair
///
/// RTP ports are even; RTCP is always RTP + 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPair {
    /// RTP port
    pub rtp: u16,
    /// RTCP port (rtp + 1)
    pub rtcp: u16,
}

/// Bounded allocator of RTP/RTCP port pairs
#[derive(Debug)]
pub struct PortPool {
    free: Mutex<BTreeSet<u16>>,
}

impl PortPool {
    /// Create a pool over the given range
    ///
    /// Only even ports in the range are used as RTP ports; the odd port
    /// above each must also fall inside the range.
    pub fn new(range: Range<u16>) -> Self {
        let free: BTreeSet<u16> = range
            .clone()
            .filter(|p| p % 2 == 0 && p + 1 < range.end)
            .collect();
        Self {
            free: Mutex::new(free),
        }
    }

    /// Reserve the lowest free pair
    pub fn allocate(&self) -> Result<PortPair> {
        let mut free = self.free.lock().unwrap();
        let rtp = free.iter().next().copied().ok_or(Error::PortsExhausted)?;
        free.remove(&rtp);
        Ok(PortPair {
            rtp,
            rtcp: rtp + 1,
        })
    }

    /// Return a pair to the pool
    ///
    /// Releasing a pair twice is a no-op.
    pub fn release(&self, pair: PortPair) {
        let mut free = self.free.lock().unwrap();
        free.insert(pair.rtp);
    }

    /// Number of free pairs left
    pub fn available(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}
