//! Crate error types
//!
//! A single error enum covers the bridge's failure surface. Teardown paths
//! never return these: resource close failures are logged and swallowed so
//! that teardown always runs to completion.

use std::time::Duration;

use crate::router::ProducerId;

/// Result alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for bridge operations
#[derive(Debug)]
pub enum Error {
    /// Filesystem or pipe error
    Io(std::io::Error),
    /// The media router rejected or failed an operation
    Router(String),
    /// A producer has no codec the transcoder can receive
    NoUsableCodec(ProducerId),
    /// The readiness gate gave up waiting for valid video dimensions
    ReadinessTimeout {
        /// How long the gate polled before giving up
        waited: Duration,
    },
    /// The RTP port pool has no free pairs left
    PortsExhausted,
    /// The transcoder process could not be spawned
    Spawn(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Router(msg) => write!(f, "Router error: {}", msg),
            Error::NoUsableCodec(producer) => {
                write!(f, "No usable codec for producer: {}", producer)
            }
            Error::ReadinessTimeout { waited } => {
                write!(f, "Descriptors not ready after {:?}", waited)
            }
            Error::PortsExhausted => write!(f, "RTP port pool exhausted"),
            Error::Spawn(e) => write!(f, "Failed to spawn transcoder: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) | Error::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
