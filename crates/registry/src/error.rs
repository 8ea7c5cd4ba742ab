//! Registry error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry already initialized: {0}")]
    AlreadyInitialized(String),

    /// The registry refused the call; the same call may succeed later.
    #[error("registry rejected the request: {0}")]
    Rejected(String),

    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
