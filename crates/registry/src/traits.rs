//! Registry capability definitions.

use crate::error::{RegistryError, RegistryResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tessera_core::{Creator, Locator, MAX_NAME_LENGTH, MAX_URI_LENGTH};

/// Collection-wide settings fixed when a registry is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistryDefaults {
    pub symbol: String,
    pub seller_fee_basis_points: u16,
    pub creators: Vec<Creator>,
    pub is_mutable: bool,
    pub retain_authority: bool,
    /// Zero means unlimited.
    pub max_supply: u64,
}

/// Identifiers of an initialized registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryHandle {
    /// Short generated id.
    pub unique_id: String,
    /// Address of the registry account.
    pub locator: String,
}

/// One line of the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub uri: Locator,
}

impl RegistryEntry {
    pub fn new(name: impl Into<String>, uri: Locator) -> Self {
        Self {
            name: name.into(),
            uri,
        }
    }

    /// Check the per-line size limits.
    pub fn validate(&self) -> RegistryResult<()> {
        if self.name.len() > MAX_NAME_LENGTH {
            return Err(RegistryError::Rejected(format!(
                "name {:?} is longer than {MAX_NAME_LENGTH} bytes",
                self.name
            )));
        }
        if self.uri.as_str().len() > MAX_URI_LENGTH {
            return Err(RegistryError::Rejected(format!(
                "uri for {:?} is longer than {MAX_URI_LENGTH} bytes",
                self.name
            )));
        }
        Ok(())
    }
}

/// Fixed-capacity, append-only registry written a few lines at a time.
#[async_trait]
pub trait Registry: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Create a registry with room for `capacity` lines.
    async fn initialize(
        &self,
        capacity: u32,
        defaults: &RegistryDefaults,
    ) -> RegistryResult<RegistryHandle>;

    /// Write `entries` to consecutive lines starting at `at_index`.
    async fn append_window(
        &self,
        handle: &RegistryHandle,
        entries: &[RegistryEntry],
        at_index: u32,
    ) -> RegistryResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_limits() {
        assert!(RegistryEntry::new("Land #999999", Locator::new("https://gw/a")).validate().is_ok());

        let long_name = "n".repeat(MAX_NAME_LENGTH + 1);
        assert!(RegistryEntry::new(long_name, Locator::new("u")).validate().is_err());

        let exact = RegistryEntry::new("n".repeat(MAX_NAME_LENGTH), Locator::new("u".repeat(MAX_URI_LENGTH)));
        assert!(exact.validate().is_ok());

        let long_uri = RegistryEntry::new("n", Locator::new("u".repeat(MAX_URI_LENGTH + 1)));
        assert!(matches!(long_uri.validate(), Err(RegistryError::Rejected(_))));
    }
}
