//! Upload orchestrator.
//!
//! Work is computed from scratch on every run: the pairs on disk minus the
//! items the cache already records as uploaded. The remaining pairs are
//! grouped (batches for bundling providers, single pairs otherwise) and
//! uploaded one group at a time. The cache is persisted after each group,
//! before the step is handed to the caller.

use crate::error::PipelineResult;
use crate::source::ItemSource;
use async_stream::try_stream;
use futures::{Stream, StreamExt, pin_mut};
use std::sync::Arc;
use tessera_cache::PartitionHandle;
use tessera_core::{
    AssetManifest, FilePair, GlobalIndex, IndexRemapper, Locator, Partition, PartitionRecord, plan,
};
use tessera_storage::{UploadBackend, UploadedPair, upload_pair};
use tracing::{info, warn};

/// Result of one uploaded group.
#[derive(Clone, Debug)]
pub struct UploadStep {
    /// Zero-based position of the group in this run.
    pub batch: usize,
    pub keys: Vec<GlobalIndex>,
    /// Manifests as published.
    pub manifests: Vec<AssetManifest>,
    /// Manifest locators, aligned with `keys`.
    pub locators: Vec<Locator>,
}

/// Work left for one partition.
#[derive(Clone, Debug, Default)]
pub struct UploadPlan {
    pub pending: usize,
    pub groups: Vec<Vec<FilePair>>,
}

/// Outcome of `Uploader::upload_partition`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Items that needed uploading when the run started.
    pub pending: usize,
    pub uploaded: usize,
    pub batches: usize,
    /// A provider error ended the run early.
    pub interrupted: bool,
}

/// Pairs whose item is not yet recorded as uploaded.
pub fn pending_pairs(record: &PartitionRecord, candidates: Vec<FilePair>) -> Vec<FilePair> {
    let completed = record.completed_keys();
    candidates
        .into_iter()
        .filter(|pair| !completed.contains(&pair.key.to_string()))
        .collect()
}

pub struct Uploader {
    backend: UploadBackend,
    remapper: Arc<IndexRemapper>,
    source: ItemSource,
    batch_size_limit: u64,
}

impl Uploader {
    pub fn new(
        backend: UploadBackend,
        remapper: Arc<IndexRemapper>,
        source: ItemSource,
        batch_size_limit: u64,
    ) -> Self {
        Self {
            backend,
            remapper,
            source,
            batch_size_limit,
        }
    }

    /// Compute the groups still to upload.
    ///
    /// Fails with `PayloadTooLarge` before anything is uploaded when a single
    /// pair exceeds the batch budget of a bundling provider.
    pub async fn plan(
        &self,
        record: &PartitionRecord,
        partition: Partition,
    ) -> PipelineResult<UploadPlan> {
        let candidates = self.source.candidates(&self.remapper, partition).await?;
        let pending = pending_pairs(record, candidates);
        let count = pending.len();

        let groups = if self.backend.is_bundled() {
            plan(pending, self.batch_size_limit)?
                .into_iter()
                .map(|batch| batch.items)
                .collect()
        } else {
            pending.into_iter().map(|pair| vec![pair]).collect()
        };
        Ok(UploadPlan {
            pending: count,
            groups,
        })
    }

    /// Plan, then upload group by group.
    ///
    /// The stream ends after the first error. Dropping it between steps is
    /// safe: every yielded step is already persisted.
    pub fn run<'a>(
        &'a self,
        handle: &'a mut PartitionHandle,
    ) -> impl Stream<Item = PipelineResult<UploadStep>> + 'a {
        try_stream! {
            let upload_plan = self.plan(handle.record(), handle.partition()).await?;
            let steps = self.execute(handle, upload_plan);
            pin_mut!(steps);
            while let Some(step) = steps.next().await {
                yield step?;
            }
        }
    }

    /// Upload the groups of a plan.
    pub fn execute<'a>(
        &'a self,
        handle: &'a mut PartitionHandle,
        upload_plan: UploadPlan,
    ) -> impl Stream<Item = PipelineResult<UploadStep>> + 'a {
        try_stream! {
            for (batch, group) in upload_plan.groups.into_iter().enumerate() {
                let uploaded = self.upload_group(&group).await?;

                let mut step = UploadStep {
                    batch,
                    keys: Vec::with_capacity(uploaded.len()),
                    manifests: Vec::with_capacity(uploaded.len()),
                    locators: Vec::with_capacity(uploaded.len()),
                };
                for item in uploaded {
                    let (_, local) = self.remapper.locate(item.key)?;
                    handle
                        .record_mut()
                        .record_upload(local, item.link.clone(), item.manifest.name.clone())?;
                    step.keys.push(item.key);
                    step.manifests.push(item.manifest);
                    step.locators.push(item.link);
                }
                handle.persist().await?;
                yield step;
            }
        }
    }

    async fn upload_group(&self, group: &[FilePair]) -> PipelineResult<Vec<UploadedPair>> {
        let mut prepared = Vec::with_capacity(group.len());
        for pair in group {
            prepared.push(self.source.load(pair).await?);
        }

        let uploaded = match &self.backend {
            UploadBackend::Bundled(store) => store.store_batch(prepared).await?,
            UploadBackend::Unbundled(store) => {
                let mut uploaded = Vec::with_capacity(prepared.len());
                for pair in prepared {
                    uploaded.push(upload_pair(store.as_ref(), pair).await?);
                }
                uploaded
            }
        };
        Ok(uploaded)
    }

    /// Drive the upload of one partition to completion.
    ///
    /// Provider failures end the run with `interrupted` set; everything
    /// uploaded before the failure stays recorded.
    pub async fn upload_partition(
        &self,
        handle: &mut PartitionHandle,
    ) -> PipelineResult<UploadSummary> {
        let partition = handle.partition();
        let upload_plan = self.plan(handle.record(), partition).await?;
        let mut summary = UploadSummary {
            pending: upload_plan.pending,
            ..UploadSummary::default()
        };
        info!(
            partition = %partition.tag(),
            provider = self.backend.name(),
            pending = summary.pending,
            batches = upload_plan.groups.len(),
            "Starting upload"
        );

        let steps = self.execute(handle, upload_plan);
        pin_mut!(steps);
        while let Some(step) = steps.next().await {
            match step {
                Ok(step) => {
                    summary.batches += 1;
                    summary.uploaded += step.keys.len();
                    info!(
                        partition = %partition.tag(),
                        batch = step.batch,
                        items = step.keys.len(),
                        "Batch uploaded"
                    );
                }
                Err(e) if !e.is_fatal() => {
                    warn!(
                        partition = %partition.tag(),
                        batch = summary.batches,
                        error = %e,
                        "Upload interrupted; re-run the same command to resume"
                    );
                    summary.interrupted = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(summary)
    }
}
