//! Progress cache error types.

use thiserror::Error;

/// Progress cache errors. All of them are fatal to a run.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache file {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
