//! Resumable upload and registry sync pipeline for tessera.
//!
//! A partition is published in two phases that can each be interrupted and
//! re-run at any point:
//! - upload: pending file pairs are stored on the provider batch by batch
//! - sync: uploaded locators are written to the registry window by window
//!
//! The progress cache is the only record of what is done.

pub mod error;
pub mod source;
pub mod upload;
pub mod writer;

pub use error::{PipelineError, PipelineResult};
pub use source::ItemSource;
pub use upload::{UploadPlan, UploadStep, UploadSummary, Uploader, pending_pairs};
pub use writer::{
    RegistryWriter, SyncReport, WindowOutcome, WindowReport, collection_defaults,
};

use std::sync::Arc;
use tessera_cache::{PartitionHandle, ProgressCache};
use tessera_core::config::{AppConfig, CollectionConfig};
use tessera_core::{IndexRemapper, Partition, Permutation, ProgramSection, StateCounts};
use tessera_registry::{Registry, RegistryDefaults};
use tessera_storage::UploadBackend;
use tracing::{info, warn};

/// Result of a full publish (upload, then sync).
#[derive(Clone, Debug)]
pub struct PublishReport {
    pub partition: Partition,
    pub upload: UploadSummary,
    pub sync: SyncReport,
}

/// Progress of one partition.
#[derive(Clone, Debug)]
pub struct PartitionStatus {
    pub partition: Partition,
    /// Complete pairs on disk for this partition.
    pub on_disk: usize,
    pub counts: StateCounts,
    pub program: Option<ProgramSection>,
}

/// Tunables of a pipeline.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub batch_size_limit: u64,
    pub window_size: usize,
    pub concurrency: usize,
    pub collection: CollectionConfig,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            batch_size_limit: config.upload.batch_size_limit,
            window_size: config.registry.window_size,
            concurrency: config.registry.concurrency,
            collection: config.collection.clone(),
        }
    }
}

/// Ties the cache, source, upload backend, and registry together.
pub struct Pipeline {
    cache: Arc<ProgressCache>,
    remapper: Arc<IndexRemapper>,
    source: ItemSource,
    uploader: Uploader,
    writer: RegistryWriter,
    collection: CollectionConfig,
}

impl Pipeline {
    pub fn new(
        cache: Arc<ProgressCache>,
        remapper: Arc<IndexRemapper>,
        source: ItemSource,
        backend: UploadBackend,
        registry: Arc<dyn Registry>,
        settings: PipelineSettings,
    ) -> Self {
        let capacity = remapper.layout().cells_per_partition();
        Self {
            uploader: Uploader::new(
                backend,
                remapper.clone(),
                source.clone(),
                settings.batch_size_limit,
            ),
            writer: RegistryWriter::new(
                registry,
                capacity,
                settings.window_size,
                settings.concurrency,
            ),
            cache,
            remapper,
            source,
            collection: settings.collection,
        }
    }

    /// Build every component from configuration.
    pub async fn from_config(config: &AppConfig) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::Config)?;

        let layout = config.grid.layout();
        let permutation = match &config.grid.permutation {
            Some(path) => Permutation::load(path)?,
            None => Permutation::identity(layout.cells_per_partition()),
        };
        let remapper = Arc::new(IndexRemapper::new(layout, permutation)?);
        let cache = tessera_cache::from_config(&config.cache)?;
        let backend = tessera_storage::from_config(&config.storage).await?;
        let registry = tessera_registry::from_config(&config.registry);
        info!(
            storage = config.storage.kind(),
            registry = registry.name(),
            cache = %cache.path().display(),
            "Pipeline initialized"
        );

        Ok(Self::new(
            cache,
            remapper,
            ItemSource::new(&config.upload.assets_dir),
            backend,
            registry,
            PipelineSettings::from_config(config),
        ))
    }

    pub fn remapper(&self) -> &IndexRemapper {
        &self.remapper
    }

    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }

    pub fn cache(&self) -> &Arc<ProgressCache> {
        &self.cache
    }

    /// Open the single owner of a partition's record.
    pub async fn open(&self, partition: Partition) -> PipelineResult<PartitionHandle> {
        if !self.remapper.layout().contains(partition) {
            return Err(tessera_core::Error::InvalidPartition(partition.tag()).into());
        }
        Ok(PartitionHandle::open(self.cache.clone(), partition).await?)
    }

    pub async fn upload(&self, partition: Partition) -> PipelineResult<UploadSummary> {
        let mut handle = self.open(partition).await?;
        self.uploader.upload_partition(&mut handle).await
    }

    /// Initialize the registry if needed, then write pending windows.
    pub async fn sync(&self, partition: Partition) -> PipelineResult<SyncReport> {
        let mut handle = self.open(partition).await?;
        self.sync_handle(&mut handle).await
    }

    /// Upload, then sync whatever is uploaded.
    ///
    /// An interrupted upload skips the sync and reports no windows; the next
    /// publish resumes the upload first.
    pub async fn publish(&self, partition: Partition) -> PipelineResult<PublishReport> {
        let mut handle = self.open(partition).await?;
        let upload = self.uploader.upload_partition(&mut handle).await?;
        let sync = if upload.interrupted {
            warn!(
                partition = %partition.tag(),
                remaining = upload.pending.saturating_sub(upload.uploaded),
                "Upload interrupted; skipping registry sync"
            );
            SyncReport::empty()
        } else {
            self.sync_handle(&mut handle).await?
        };
        info!(
            partition = %partition.tag(),
            uploaded = upload.uploaded,
            interrupted = upload.interrupted,
            windows_written = sync.written(),
            windows_failed = sync.failed(),
            "Publish finished"
        );
        Ok(PublishReport {
            partition,
            upload,
            sync,
        })
    }

    pub async fn status(&self, partition: Partition) -> PipelineResult<PartitionStatus> {
        let handle = self.open(partition).await?;
        let on_disk = self.source.candidates(&self.remapper, partition).await?.len();
        Ok(PartitionStatus {
            partition,
            on_disk,
            counts: handle.record().counts(),
            program: handle.record().program.clone(),
        })
    }

    async fn sync_handle(&self, handle: &mut PartitionHandle) -> PipelineResult<SyncReport> {
        if handle.record().items.is_empty() {
            return Ok(SyncReport::empty());
        }
        let registry_handle = match RegistryWriter::existing_handle(handle) {
            Some(existing) => existing,
            None => {
                let defaults = self.registry_defaults(handle.partition()).await?;
                self.writer.ensure_initialized(handle, &defaults).await?
            }
        };
        self.writer.sync(handle, &registry_handle).await
    }

    async fn registry_defaults(&self, partition: Partition) -> PipelineResult<RegistryDefaults> {
        let first = self
            .source
            .candidates(&self.remapper, partition)
            .await?
            .into_iter()
            .next();
        let manifest = match &first {
            Some(pair) => Some(self.source.manifest(pair).await?),
            None => None,
        };
        collection_defaults(&self.collection, manifest.as_ref())
    }
}
