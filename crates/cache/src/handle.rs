//! Single owner of one partition's in-memory record.

use crate::error::CacheResult;
use crate::store::ProgressCache;
use std::sync::Arc;
use tessera_core::{Partition, PartitionRecord};

/// In-memory record of one partition plus the store it persists to.
///
/// All mutations of a partition go through one handle; `persist` writes the
/// whole record back.
#[derive(Debug)]
pub struct PartitionHandle {
    cache: Arc<ProgressCache>,
    partition: Partition,
    record: PartitionRecord,
}

impl PartitionHandle {
    /// Load the partition's record, or start an empty one.
    pub async fn open(cache: Arc<ProgressCache>, partition: Partition) -> CacheResult<Self> {
        let record = cache.load(partition).await?.unwrap_or_default();
        Ok(Self {
            cache,
            partition,
            record,
        })
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn record(&self) -> &PartitionRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut PartitionRecord {
        &mut self.record
    }

    pub async fn persist(&self) -> CacheResult<()> {
        self.cache.save(self.partition, &self.record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{LocalKey, Locator};

    #[tokio::test]
    async fn test_open_fresh_partition_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ProgressCache::new(dir.path().join("devnet-temp"), "devnet", "temp"));
        let handle = PartitionHandle::open(cache, Partition::new(1, 2)).await.unwrap();
        assert!(handle.record().items.is_empty());
        assert!(handle.record().program.is_none());
        assert!(!dir.path().join("devnet-temp").exists(), "open does not write");
    }

    #[tokio::test]
    async fn test_persist_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ProgressCache::new(dir.path().join("devnet-temp"), "devnet", "temp"));
        let partition = Partition::new(0, 1);

        let mut handle = PartitionHandle::open(cache.clone(), partition).await.unwrap();
        handle
            .record_mut()
            .record_upload(LocalKey(4), Locator::new("https://gw/4"), "Land #4".to_string())
            .unwrap();
        handle.persist().await.unwrap();

        let reopened = PartitionHandle::open(cache, partition).await.unwrap();
        assert_eq!(reopened.record(), handle.record());
    }
}
