//! Pipeline error types.

use tessera_cache::CacheError;
use tessera_registry::RegistryError;
use tessera_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] tessera_core::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to read {path}: {source}")]
    Source {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Whether the run must stop. Non-fatal errors leave the affected items
    /// pending or uploaded, and re-running the same command resumes.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Storage(e) => !e.is_provider_failure(),
            Self::Registry(_) => false,
            Self::Core(_) | Self::Cache(_) | Self::Source { .. } | Self::Config(_) => true,
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_follows_propagation_policy() {
        let too_large = PipelineError::Core(tessera_core::Error::PayloadTooLarge {
            key: 1,
            size: 20,
            budget: 10,
        });
        assert!(too_large.is_fatal());

        let cache = PipelineError::Cache(CacheError::Io(std::io::Error::other("disk full")));
        assert!(cache.is_fatal());

        let provider = PipelineError::Storage(StorageError::Provider("timeout".to_string()));
        assert!(!provider.is_fatal());

        let bundle = PipelineError::Storage(StorageError::BatchTooLarge { size: 2, limit: 1 });
        assert!(bundle.is_fatal());

        let rejected = PipelineError::Registry(RegistryError::Rejected("full".to_string()));
        assert!(!rejected.is_fatal());
    }
}
