//! Progress cache for tessera.
//!
//! One JSON file per (environment, cache name) holds the progress of every
//! partition, keyed by `"[row,col]"`. Saves replace a single partition's entry
//! and keep everything else in the file as it was.

pub mod error;
pub mod handle;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use handle::PartitionHandle;
pub use store::ProgressCache;

use std::sync::Arc;
use tessera_core::config::CacheConfig;

/// Create the progress cache from configuration.
pub fn from_config(config: &CacheConfig) -> CacheResult<Arc<ProgressCache>> {
    config.validate().map_err(CacheError::Config)?;
    Ok(Arc::new(ProgressCache::new(
        config.file_path(),
        &config.env,
        &config.name,
    )))
}
