//! Registry kept in a local JSON ledger.
//!
//! Capacity and per-line limits are enforced as on chain, and every write
//! must present the unique id returned by `initialize`.

use crate::error::{RegistryError, RegistryResult};
use crate::traits::{Registry, RegistryDefaults, RegistryEntry, RegistryHandle};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRegistry {
    pub unique_id: String,
    pub capacity: u32,
    pub defaults: RegistryDefaults,
    pub created_at: String,
    #[serde(default)]
    pub lines: BTreeMap<u32, RegistryEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Ledger {
    #[serde(default)]
    registries: BTreeMap<String, LedgerRegistry>,
}

/// File-backed [`Registry`].
#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of one registry, if it exists.
    pub async fn get(&self, locator: &str) -> RegistryResult<Option<LedgerRegistry>> {
        let _guard = self.lock.lock().await;
        let mut ledger = self.read().await?;
        Ok(ledger.registries.remove(locator))
    }

    async fn read(&self) -> RegistryResult<Ledger> {
        match fs::read(&self.path).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Ledger::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, ledger: &Ledger) -> RegistryResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(ledger)?;
        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        let temp_path = self.path.with_file_name(
            self.path
                .file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        );
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Registry for FileRegistry {
    fn name(&self) -> &'static str {
        "file"
    }

    #[instrument(skip(self, defaults), fields(registry = "file"))]
    async fn initialize(
        &self,
        capacity: u32,
        defaults: &RegistryDefaults,
    ) -> RegistryResult<RegistryHandle> {
        if capacity == 0 {
            return Err(RegistryError::Rejected("capacity must be > 0".to_string()));
        }
        let _guard = self.lock.lock().await;
        let mut ledger = self.read().await?;

        let id = Uuid::new_v4().simple().to_string();
        let handle = RegistryHandle {
            unique_id: id[..6].to_string(),
            locator: format!("registry-{id}"),
        };
        if ledger.registries.contains_key(&handle.locator) {
            return Err(RegistryError::AlreadyInitialized(handle.locator));
        }

        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        ledger.registries.insert(
            handle.locator.clone(),
            LedgerRegistry {
                unique_id: handle.unique_id.clone(),
                capacity,
                defaults: defaults.clone(),
                created_at,
                lines: BTreeMap::new(),
            },
        );
        self.write(&ledger).await?;
        info!(locator = %handle.locator, capacity, "Registry initialized");
        Ok(handle)
    }

    #[instrument(skip(self, handle, entries), fields(registry = "file", locator = %handle.locator, lines = entries.len()))]
    async fn append_window(
        &self,
        handle: &RegistryHandle,
        entries: &[RegistryEntry],
        at_index: u32,
    ) -> RegistryResult<()> {
        for entry in entries {
            entry.validate()?;
        }

        let _guard = self.lock.lock().await;
        let mut ledger = self.read().await?;
        let registry = ledger
            .registries
            .get_mut(&handle.locator)
            .ok_or_else(|| RegistryError::Rejected(format!("unknown registry {}", handle.locator)))?;
        if registry.unique_id != handle.unique_id {
            return Err(RegistryError::Rejected(format!(
                "unique id mismatch for {}",
                handle.locator
            )));
        }

        let end = u64::from(at_index) + entries.len() as u64;
        if end > u64::from(registry.capacity) {
            return Err(RegistryError::Rejected(format!(
                "lines {at_index}..{end} exceed capacity {}",
                registry.capacity
            )));
        }

        for (line, entry) in (at_index..).zip(entries) {
            registry.lines.insert(line, entry.clone());
        }
        self.write(&ledger).await
    }
}
