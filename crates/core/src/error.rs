//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("global index {index} out of range (grid has {total} cells)")]
    IndexOutOfRange { index: u64, total: u64 },

    #[error("partition {0} is outside the grid")]
    InvalidPartition(String),

    #[error("local key {key} out of range (partition has {total} cells)")]
    InvalidLocalKey { key: u32, total: u32 },

    #[error("invalid partition tag: {0}")]
    InvalidPartitionTag(String),

    #[error("invalid permutation: {0}")]
    InvalidPermutation(String),

    #[error("invalid grid layout: {0}")]
    InvalidLayout(String),

    #[error("file pair {key} too large ({size} bytes) for batch budget of {budget} bytes")]
    PayloadTooLarge { key: u64, size: u64, budget: u64 },

    #[error("invalid state transition for item {key}: {from} -> {to}")]
    InvalidStateTransition { key: String, from: String, to: String },

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
