//! Registry error types

use thiserror::Error;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Registry was closed by server shutdown and accepts no new connections
    #[error("registry is shutting down")]
    ShuttingDown,
}
