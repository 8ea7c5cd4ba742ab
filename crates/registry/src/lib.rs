//! Registry capability for tessera.
//!
//! The registry is an external, fixed-capacity array of `(name, uri)` lines.
//! This crate defines the interface the pipeline writes through and a local
//! file-backed implementation.

pub mod error;
pub mod file;
pub mod traits;

pub use error::{RegistryError, RegistryResult};
pub use file::{FileRegistry, LedgerRegistry};
pub use traits::{Registry, RegistryDefaults, RegistryEntry, RegistryHandle};

use std::sync::Arc;
use tessera_core::config::RegistryConfig;

/// Create the registry from configuration.
pub fn from_config(config: &RegistryConfig) -> Arc<dyn Registry> {
    Arc::new(FileRegistry::new(&config.path))
}
