#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use tessera_cache::ProgressCache;
use tessera_core::{LocalKey, Locator, PartitionRecord};

pub fn cache_at(dir: &Path) -> Arc<ProgressCache> {
    Arc::new(ProgressCache::new(dir.join("devnet-temp"), "devnet", "temp"))
}

/// Record with `count` uploaded items starting at `first`.
pub fn uploaded_record(first: u32, count: u32) -> PartitionRecord {
    let mut record = PartitionRecord::default();
    for key in first..first + count {
        record
            .record_upload(
                LocalKey(key),
                Locator::new(format!("https://gw.test/{key}")),
                format!("Land #{key}"),
            )
            .unwrap();
    }
    record
}
