//! Per-item progress records and the partition record they live in.

use crate::asset::normalize_item_key;
use crate::grid::LocalKey;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Stable address returned by a storage provider after a successful store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Item lifecycle: `Pending -> Uploaded -> OnChain`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemState {
    /// Not yet stored on any provider.
    Pending,
    /// Stored; locator known but not yet in the registry.
    Uploaded,
    /// Locator durably appended to the registry.
    OnChain,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploaded => "uploaded",
            Self::OnChain => "on-chain",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One item as recorded in the progress cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedItem {
    /// Metadata locator; empty while pending.
    #[serde(default)]
    pub link: Locator,
    /// Display name, `"<prefix> #<index>"`.
    pub name: String,
    #[serde(default)]
    pub on_chain: bool,
}

impl CachedItem {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            link: Locator::default(),
            name: name.into(),
            on_chain: false,
        }
    }

    pub fn state(&self) -> ItemState {
        if self.link.is_empty() {
            ItemState::Pending
        } else if self.on_chain {
            ItemState::OnChain
        } else {
            ItemState::Uploaded
        }
    }

    /// The global index embedded in the name, leading zeros stripped.
    pub fn name_key(&self) -> Option<String> {
        self.name
            .split('#')
            .nth(1)
            .map(|raw| normalize_item_key(raw.trim()))
    }

    pub fn mark_uploaded(&mut self, key: LocalKey, link: Locator) -> Result<()> {
        if self.state() != ItemState::Pending || link.is_empty() {
            return Err(self.transition_error(key, ItemState::Uploaded));
        }
        self.link = link;
        Ok(())
    }

    pub fn mark_on_chain(&mut self, key: LocalKey) -> Result<()> {
        if self.state() != ItemState::Uploaded {
            return Err(self.transition_error(key, ItemState::OnChain));
        }
        self.on_chain = true;
        Ok(())
    }

    fn transition_error(&self, key: LocalKey, to: ItemState) -> Error {
        Error::InvalidStateTransition {
            key: key.to_string(),
            from: self.state().to_string(),
            to: to.to_string(),
        }
    }
}

/// Registry identifiers recorded once the registry has been initialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSection {
    #[serde(alias = "uuid")]
    pub unique_id: String,
    #[serde(alias = "config")]
    pub registry_locator: String,
}

/// Item counts per lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub pending: usize,
    pub uploaded: usize,
    pub on_chain: usize,
}

impl StateCounts {
    pub fn total(&self) -> usize {
        self.pending + self.uploaded + self.on_chain
    }
}

/// Everything the cache knows about one partition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRecord {
    #[serde(
        default,
        deserialize_with = "deserialize_program",
        skip_serializing_if = "Option::is_none"
    )]
    pub program: Option<ProgramSection>,
    #[serde(default)]
    pub items: BTreeMap<LocalKey, CachedItem>,
}

// Older cache files carry `"program": {}` before the registry exists.
fn deserialize_program<'de, D>(deserializer: D) -> std::result::Result<Option<ProgramSection>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Partial {
        #[serde(alias = "uuid")]
        unique_id: Option<String>,
        #[serde(alias = "config")]
        registry_locator: Option<String>,
    }

    let partial = Option::<Partial>::deserialize(deserializer)?;
    Ok(partial.and_then(|p| {
        Some(ProgramSection {
            unique_id: p.unique_id?,
            registry_locator: p.registry_locator?,
        })
    }))
}

impl PartitionRecord {
    pub fn get(&self, key: LocalKey) -> Option<&CachedItem> {
        self.items.get(&key)
    }

    /// Local keys in ascending order.
    pub fn keys(&self) -> Vec<LocalKey> {
        self.items.keys().copied().collect()
    }

    /// Record a completed upload, creating the entry if needed.
    pub fn record_upload(&mut self, key: LocalKey, link: Locator, name: String) -> Result<()> {
        let item = self
            .items
            .entry(key)
            .or_insert_with(|| CachedItem::pending(name.clone()));
        item.mark_uploaded(key, link)?;
        item.name = name;
        Ok(())
    }

    pub fn mark_on_chain(&mut self, key: LocalKey) -> Result<()> {
        let item = self.items.get_mut(&key).ok_or(Error::InvalidStateTransition {
            key: key.to_string(),
            from: "absent".to_string(),
            to: ItemState::OnChain.to_string(),
        })?;
        item.mark_on_chain(key)
    }

    /// Whether every listed item is already on-chain.
    pub fn all_on_chain(&self, keys: &[LocalKey]) -> bool {
        keys.iter().all(|key| {
            self.items
                .get(key)
                .is_some_and(|item| item.state() == ItemState::OnChain)
        })
    }

    /// Normalized index strings of every item that is at least uploaded.
    pub fn completed_keys(&self) -> HashSet<String> {
        self.items
            .values()
            .filter(|item| item.state() != ItemState::Pending)
            .filter_map(CachedItem::name_key)
            .collect()
    }

    pub fn counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for item in self.items.values() {
            match item.state() {
                ItemState::Pending => counts.pending += 1,
                ItemState::Uploaded => counts.uploaded += 1,
                ItemState::OnChain => counts.on_chain += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_state_transitions() {
        let key = LocalKey(7);
        let mut item = CachedItem::pending("Land #000007");
        assert_eq!(item.state(), ItemState::Pending);

        assert!(item.mark_on_chain(key).is_err(), "cannot skip uploaded");
        assert!(item.mark_uploaded(key, Locator::default()).is_err());

        item.mark_uploaded(key, Locator::new("https://gw/abc")).unwrap();
        assert_eq!(item.state(), ItemState::Uploaded);
        assert!(item.mark_uploaded(key, Locator::new("https://gw/def")).is_err());

        item.mark_on_chain(key).unwrap();
        assert_eq!(item.state(), ItemState::OnChain);
        assert!(item.mark_on_chain(key).is_err());
        assert_eq!(item.link.as_str(), "https://gw/abc");
    }

    #[test]
    fn test_name_key_strips_zeros() {
        assert_eq!(
            CachedItem::pending("Land #000042").name_key().as_deref(),
            Some("42")
        );
        assert_eq!(
            CachedItem::pending("Land #000000").name_key().as_deref(),
            Some("0")
        );
        assert_eq!(CachedItem::pending("no index").name_key(), None);
    }

    #[test]
    fn test_record_json_shape() {
        let mut record = PartitionRecord::default();
        record
            .record_upload(LocalKey(3), Locator::new("https://gw/x"), "Land #3".into())
            .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "items": {"3": {"link": "https://gw/x", "name": "Land #3", "onChain": false}}
            })
        );
        let back: PartitionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_record_accepts_empty_and_legacy_program() {
        let record: PartitionRecord =
            serde_json::from_str(r#"{"program": {}, "items": {}}"#).unwrap();
        assert!(record.program.is_none());

        let record: PartitionRecord =
            serde_json::from_str(r#"{"program": {"uuid": "abc123", "config": "cfg"}, "items": {}}"#)
                .unwrap();
        let program = record.program.unwrap();
        assert_eq!(program.unique_id, "abc123");
        assert_eq!(program.registry_locator, "cfg");
    }

    #[test]
    fn test_keys_are_numerically_ordered() {
        let mut record = PartitionRecord::default();
        for key in [10, 2, 33, 1] {
            record
                .record_upload(LocalKey(key), Locator::new("l"), format!("Land #{key}"))
                .unwrap();
        }
        assert_eq!(
            record.keys(),
            vec![LocalKey(1), LocalKey(2), LocalKey(10), LocalKey(33)]
        );
    }

    #[test]
    fn test_counts_and_all_on_chain() {
        let mut record = PartitionRecord::default();
        for key in 0..4 {
            record
                .record_upload(LocalKey(key), Locator::new("l"), format!("Land #{key}"))
                .unwrap();
        }
        record.mark_on_chain(LocalKey(0)).unwrap();
        record.mark_on_chain(LocalKey(1)).unwrap();
        assert!(record.all_on_chain(&[LocalKey(0), LocalKey(1)]));
        assert!(!record.all_on_chain(&[LocalKey(1), LocalKey(2)]));
        assert!(!record.all_on_chain(&[LocalKey(9)]));
        let counts = record.counts();
        assert_eq!((counts.pending, counts.uploaded, counts.on_chain), (0, 2, 2));
        assert!(record.mark_on_chain(LocalKey(9)).is_err());
    }
}
