//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("bundle of {size} bytes exceeds provider limit of {limit} bytes")]
    BatchTooLarge { size: u64, limit: u64 },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Core(#[from] tessera_core::Error),
}

impl StorageError {
    /// Whether the failure came from the provider and the work can be retried
    /// by re-running the pipeline.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::Provider(_) | Self::InvalidResponse(_) | Self::Http(_) | Self::Io(_) | Self::S3(_)
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
