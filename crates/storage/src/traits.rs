//! Upload capability definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tessera_core::{AssetManifest, ContentType, GlobalIndex, Locator};

/// A file pair loaded into memory and ready to upload.
#[derive(Clone, Debug)]
pub struct PreparedPair {
    pub key: GlobalIndex,
    pub image: Bytes,
    pub manifest: AssetManifest,
}

/// Result of storing one file pair.
#[derive(Clone, Debug)]
pub struct UploadedPair {
    pub key: GlobalIndex,
    /// Locator of the image.
    pub image: Locator,
    /// Manifest as published, pointing at `image`.
    pub manifest: AssetManifest,
    /// Locator of the published manifest.
    pub link: Locator,
}

/// Provider that stores one artifact per call.
#[async_trait]
pub trait AssetStore: Send + Sync + 'static {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Durably store a payload and return its locator.
    async fn store(&self, payload: Bytes, content_type: ContentType) -> StorageResult<Locator>;
}

/// Provider that stores a whole batch of pairs in one bundle.
#[async_trait]
pub trait BundleStore: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Largest bundle the provider accepts, in bytes.
    fn max_bundle_size(&self) -> u64;

    /// Store every pair in one round trip.
    ///
    /// Results are returned in input order.
    async fn store_batch(&self, pairs: Vec<PreparedPair>) -> StorageResult<Vec<UploadedPair>>;
}

/// Upload backend selected once at startup.
#[derive(Clone)]
pub enum UploadBackend {
    Bundled(Arc<dyn BundleStore>),
    Unbundled(Arc<dyn AssetStore>),
}

impl UploadBackend {
    pub fn is_bundled(&self) -> bool {
        matches!(self, Self::Bundled(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bundled(store) => store.name(),
            Self::Unbundled(store) => store.name(),
        }
    }
}

impl std::fmt::Debug for UploadBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadBackend")
            .field("provider", &self.name())
            .field("bundled", &self.is_bundled())
            .finish()
    }
}

/// Store an image, then its manifest rewritten to reference the image.
pub async fn upload_pair(store: &dyn AssetStore, pair: PreparedPair) -> StorageResult<UploadedPair> {
    let image = store.store(pair.image, ContentType::Image).await?;
    let manifest = pair.manifest.with_image(&image);
    let body = Bytes::from(manifest.to_vec()?);
    let link = store.store(body, ContentType::Metadata).await?;
    Ok(UploadedPair {
        key: pair.key,
        image,
        manifest,
        link,
    })
}
