//! Session registry
//!
//! The registry owns every live output session and its resources. Its
//! contract is deliberately small:
//!
//! - [`SessionRegistry::acquire`] evicts and fully releases any session
//!   already under the key, then hands back a fresh session to populate
//! - [`SessionRegistry::release`] tears a session down idempotently,
//!   collect-and-continue on close failures
//! - lookups are read-only and side-effect-free
//!
//! Invariant: at most one session per key is alive at any time.

pub mod session;
pub mod store;

pub use session::{Consumption, MediaEndpoint, Session, SessionKey};
pub use store::SessionRegistry;
