//! Core domain types and shared logic for tessera.
//!
//! This crate defines the data model used across all other crates:
//! - Grid layout, partitions, and the index remapper
//! - Per-item progress records and their state machine
//! - Asset manifests and file pairs
//! - Byte-budgeted batch planning
//! - Configuration types

pub mod asset;
pub mod batch;
pub mod config;
pub mod error;
pub mod grid;
pub mod hash;
pub mod item;

pub use asset::{
    AssetManifest, ContentType, Creator, FilePair, ManifestFile, ManifestProperties,
    normalize_item_key,
};
pub use batch::{Batch, plan};
pub use error::{Error, Result};
pub use grid::{GlobalIndex, GridLayout, IndexRemapper, LocalKey, Partition, Permutation};
pub use hash::{ContentHash, ContentHasher};
pub use item::{CachedItem, ItemState, Locator, PartitionRecord, ProgramSection, StateCounts};

/// Default cumulative byte budget for one bundle: 10 MB.
pub const DEFAULT_BATCH_SIZE_LIMIT: u64 = 10 * 1000 * 1000;

/// Default number of registry entries written per call.
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Maximum registry entry name length in bytes.
pub const MAX_NAME_LENGTH: usize = 32;

/// Maximum registry entry URI length in bytes.
pub const MAX_URI_LENGTH: usize = 200;
