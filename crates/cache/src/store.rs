//! The on-disk aggregate store.

use crate::error::{CacheError, CacheResult};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tessera_core::{Partition, PartitionRecord};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use uuid::Uuid;

const ENV_FIELD: &str = "env";
const CACHE_NAME_FIELD: &str = "cacheName";

/// Partitioned progress store backed by one JSON file.
///
/// Every access is a read-merge-write under an in-process lock, so two saves
/// for different partitions never drop each other's updates.
#[derive(Debug)]
pub struct ProgressCache {
    path: PathBuf,
    env: String,
    cache_name: String,
    lock: Mutex<()>,
}

impl ProgressCache {
    pub fn new(path: impl Into<PathBuf>, env: &str, cache_name: &str) -> Self {
        Self {
            path: path.into(),
            env: env.to_string(),
            cache_name: cache_name.to_string(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record of one partition. A missing file or partition is `None`.
    #[instrument(skip(self), fields(partition = %partition.tag()))]
    pub async fn load(&self, partition: Partition) -> CacheResult<Option<PartitionRecord>> {
        let _guard = self.lock.lock().await;
        let aggregate = self.read_aggregate().await?;
        aggregate
            .get(&partition.tag())
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| self.corrupt(partition, e))
            })
            .transpose()
    }

    /// Replace one partition's record, keeping every other entry of the file.
    #[instrument(skip(self, record), fields(partition = %partition.tag(), items = record.items.len()))]
    pub async fn save(&self, partition: Partition, record: &PartitionRecord) -> CacheResult<()> {
        let _guard = self.lock.lock().await;
        let mut aggregate = self.read_aggregate().await?;
        aggregate.insert(ENV_FIELD.to_string(), Value::String(self.env.clone()));
        aggregate.insert(
            CACHE_NAME_FIELD.to_string(),
            Value::String(self.cache_name.clone()),
        );
        aggregate.insert(partition.tag(), serde_json::to_value(record)?);

        let data = serde_json::to_vec(&Value::Object(aggregate))?;
        self.write_atomic(&data).await?;
        debug!(bytes = data.len(), "Cache saved");
        Ok(())
    }

    /// Partitions present in the file, in (row, col) order.
    pub async fn partitions(&self) -> CacheResult<Vec<Partition>> {
        let _guard = self.lock.lock().await;
        let aggregate = self.read_aggregate().await?;
        let mut partitions: Vec<Partition> = aggregate
            .keys()
            .filter_map(|key| Partition::parse_tag(key).ok())
            .collect();
        partitions.sort();
        Ok(partitions)
    }

    async fn read_aggregate(&self) -> CacheResult<Map<String, Value>> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(CacheError::Io(e)),
        };
        match serde_json::from_slice(&data) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(CacheError::Corrupt {
                path: self.path.display().to_string(),
                reason: "top level is not a JSON object".to_string(),
            }),
            Err(e) => Err(CacheError::Corrupt {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Write to a temp file with a unique name, fsync, then rename over the cache.
    async fn write_atomic(&self, data: &[u8]) -> CacheResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        let temp_path = self.path.with_file_name(
            self.path
                .file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        );
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    fn corrupt(&self, partition: Partition, err: serde_json::Error) -> CacheError {
        CacheError::Corrupt {
            path: self.path.display().to_string(),
            reason: format!("partition {}: {err}", partition.tag()),
        }
    }
}
