//! Error types
//!
//! Per-connection errors never leave the task that owns the connection; they
//! are logged and turned into a close. Only [`Error::Bind`] is fatal to the
//! whole server.

use std::net::SocketAddr;

use thiserror::Error;

use crate::registry::RegistryError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure on an established connection (read, write, accept)
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer violated the framing contract
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Registry refused the operation
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A single frame write did not complete within the configured timeout
    #[error("write timed out")]
    WriteTimeout,

    /// Listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Framing contract violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// Declared (or requested) frame length is above the configured maximum
    #[error("frame length {length} exceeds maximum of {max} bytes")]
    FrameTooLarge { length: usize, max: usize },

    /// Stream ended in the middle of a frame
    #[error("stream closed mid-frame: expected {expected} bytes, received {received}")]
    Truncated { expected: usize, received: usize },
}

impl Error {
    /// Whether this error is an ordinary peer disconnect rather than a fault
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    /// Whether the connection was turned away because the server is stopping
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Error::Registry(RegistryError::ShuttingDown))
    }
}
