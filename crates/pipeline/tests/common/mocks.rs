#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tessera_core::{ContentType, GlobalIndex, Locator};
use tessera_registry::{
    Registry, RegistryDefaults, RegistryEntry, RegistryError, RegistryHandle, RegistryResult,
};
use tessera_storage::{
    AssetStore, BundleStore, PreparedPair, StorageError, StorageResult, UploadedPair,
};

/// Bundling provider that keeps nothing and records every call.
#[derive(Default)]
pub struct MemoryBundleStore {
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<GlobalIndex>>>,
    /// 1-based call number that fails with a provider error.
    fail_on: Mutex<Option<usize>>,
}

impl MemoryBundleStore {
    pub fn failing_on(call: usize) -> Self {
        let store = Self::default();
        *store.fail_on.lock().unwrap() = Some(call);
        store
    }

    pub fn heal(&self) {
        *self.fail_on.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<Vec<GlobalIndex>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn uploaded_keys(&self) -> Vec<u64> {
        self.batches().into_iter().flatten().map(|k| k.0).collect()
    }
}

#[async_trait]
impl BundleStore for MemoryBundleStore {
    fn name(&self) -> &'static str {
        "memory-bundle"
    }

    fn max_bundle_size(&self) -> u64 {
        u64::MAX
    }

    async fn store_batch(&self, pairs: Vec<PreparedPair>) -> StorageResult<Vec<UploadedPair>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_on.lock().unwrap() == Some(call) {
            return Err(StorageError::Provider("bundler returned 503".to_string()));
        }
        self.batches
            .lock()
            .unwrap()
            .push(pairs.iter().map(|p| p.key).collect());
        Ok(pairs
            .into_iter()
            .map(|pair| {
                let image = Locator::new(format!("mem://image/{}", pair.key));
                UploadedPair {
                    key: pair.key,
                    manifest: pair.manifest.with_image(&image),
                    image,
                    link: Locator::new(format!("mem://manifest/{}", pair.key)),
                }
            })
            .collect())
    }
}

/// Provider that stores one artifact per call.
#[derive(Default)]
pub struct MemoryAssetStore {
    calls: AtomicUsize,
    stored: Mutex<Vec<ContentType>>,
}

impl MemoryAssetStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Vec<ContentType> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    fn name(&self) -> &'static str {
        "memory-asset"
    }

    async fn store(&self, payload: Bytes, content_type: ContentType) -> StorageResult<Locator> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.stored.lock().unwrap().push(content_type);
        Ok(Locator::new(format!(
            "mem://{call}-{}.{}",
            payload.len(),
            content_type.extension()
        )))
    }
}

/// Registry that accepts every window except those chosen to fail.
#[derive(Default)]
pub struct MockRegistry {
    initializations: AtomicUsize,
    capacities: Mutex<Vec<u32>>,
    windows: Mutex<Vec<(u32, Vec<RegistryEntry>)>>,
    reject: Mutex<HashSet<u32>>,
}

impl MockRegistry {
    pub fn rejecting(at_indices: impl IntoIterator<Item = u32>) -> Self {
        let registry = Self::default();
        registry.reject.lock().unwrap().extend(at_indices);
        registry
    }

    pub fn accept_all(&self) {
        self.reject.lock().unwrap().clear();
    }

    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    pub fn capacities(&self) -> Vec<u32> {
        self.capacities.lock().unwrap().clone()
    }

    /// Accepted `at_index` values in call order.
    pub fn written(&self) -> Vec<u32> {
        self.windows.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn entries_at(&self, at_index: u32) -> Option<Vec<RegistryEntry>> {
        self.windows
            .lock()
            .unwrap()
            .iter()
            .find(|(at, _)| *at == at_index)
            .map(|(_, entries)| entries.clone())
    }
}

#[async_trait]
impl Registry for MockRegistry {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn initialize(
        &self,
        capacity: u32,
        _defaults: &RegistryDefaults,
    ) -> RegistryResult<RegistryHandle> {
        let n = self.initializations.fetch_add(1, Ordering::SeqCst);
        self.capacities.lock().unwrap().push(capacity);
        Ok(RegistryHandle {
            unique_id: format!("uid{n:03}"),
            locator: format!("registry-{n}"),
        })
    }

    async fn append_window(
        &self,
        _handle: &RegistryHandle,
        entries: &[RegistryEntry],
        at_index: u32,
    ) -> RegistryResult<()> {
        if self.reject.lock().unwrap().contains(&at_index) {
            return Err(RegistryError::Rejected(format!("window at {at_index}")));
        }
        self.windows
            .lock()
            .unwrap()
            .push((at_index, entries.to_vec()));
        Ok(())
    }
}
