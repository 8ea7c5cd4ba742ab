//! Registry writer.
//!
//! The cached items of a partition are written to the registry in windows.
//! A window is a run of consecutive recorded keys inside one aligned block
//! `[k * window_size, (k + 1) * window_size)`, and it is appended at its first
//! key, so every item lands on the registry line equal to its local key.
//! Windows run concurrently up to a limit, but every outcome is applied to the
//! record and persisted by the caller's single partition handle as it arrives.

use crate::error::{PipelineError, PipelineResult};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tessera_cache::PartitionHandle;
use tessera_core::config::CollectionConfig;
use tessera_core::{AssetManifest, Creator, ItemState, LocalKey, ProgramSection};
use tessera_registry::{Registry, RegistryDefaults, RegistryEntry, RegistryHandle, RegistryResult};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// What happened to one window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "kebab-case")]
pub enum WindowOutcome {
    Written,
    /// Every item was already on-chain.
    Skipped,
    /// Some item has no locator yet.
    NotReady,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WindowReport {
    pub first: LocalKey,
    pub last: LocalKey,
    pub len: usize,
    #[serde(flatten)]
    pub outcome: WindowOutcome,
}

impl fmt::Display for WindowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

/// Per-window outcomes of one sync pass, in ascending key order.
#[derive(Clone, Debug, Serialize)]
pub struct SyncReport {
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub windows: Vec<WindowReport>,
}

impl SyncReport {
    /// Report of a pass with nothing to write.
    pub fn empty() -> Self {
        Self {
            started_at: OffsetDateTime::now_utc(),
            windows: Vec::new(),
        }
    }

    fn count(&self, pred: impl Fn(&WindowOutcome) -> bool) -> usize {
        self.windows.iter().filter(|w| pred(&w.outcome)).count()
    }

    pub fn written(&self) -> usize {
        self.count(|o| *o == WindowOutcome::Written)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| *o == WindowOutcome::Skipped)
    }

    pub fn not_ready(&self) -> usize {
        self.count(|o| *o == WindowOutcome::NotReady)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, WindowOutcome::Failed(_)))
    }

    /// Whether every window is on-chain after this pass.
    pub fn is_complete(&self) -> bool {
        self.windows
            .iter()
            .all(|w| matches!(w.outcome, WindowOutcome::Written | WindowOutcome::Skipped))
    }
}

/// Registry defaults from the collection config, falling back to a manifest.
pub fn collection_defaults(
    collection: &CollectionConfig,
    manifest: Option<&AssetManifest>,
) -> PipelineResult<RegistryDefaults> {
    let symbol = collection
        .symbol
        .clone()
        .or_else(|| manifest.and_then(|m| m.symbol.clone()))
        .unwrap_or_default();
    let seller_fee_basis_points = collection
        .seller_fee_basis_points
        .or_else(|| manifest.map(|m| m.seller_fee_basis_points))
        .ok_or_else(|| {
            PipelineError::Config(
                "collection.seller_fee_basis_points is unset and no manifest is available"
                    .to_string(),
            )
        })?;
    let creators: Vec<Creator> = if collection.creators.is_empty() {
        manifest
            .map(|m| m.properties.creators.clone())
            .unwrap_or_default()
    } else {
        collection.creators.clone()
    };
    if creators.is_empty() {
        return Err(PipelineError::Config(
            "no creators in collection config or item manifest".to_string(),
        ));
    }

    Ok(RegistryDefaults {
        symbol,
        seller_fee_basis_points,
        creators: creators
            .into_iter()
            .map(|creator| Creator {
                verified: Some(true),
                ..creator
            })
            .collect(),
        is_mutable: collection.is_mutable,
        retain_authority: collection.retain_authority,
        max_supply: 0,
    })
}

pub struct RegistryWriter {
    registry: Arc<dyn Registry>,
    capacity: u32,
    window_size: usize,
    concurrency: usize,
}

impl RegistryWriter {
    pub fn new(
        registry: Arc<dyn Registry>,
        capacity: u32,
        window_size: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            registry,
            capacity,
            window_size: window_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    /// Registry handle recorded for the partition, if any.
    pub fn existing_handle(handle: &PartitionHandle) -> Option<RegistryHandle> {
        handle.record().program.as_ref().map(|program| RegistryHandle {
            unique_id: program.unique_id.clone(),
            locator: program.registry_locator.clone(),
        })
    }

    /// Registry handle of the partition, creating the registry on first use.
    ///
    /// The new identifiers are persisted before returning.
    pub async fn ensure_initialized(
        &self,
        handle: &mut PartitionHandle,
        defaults: &RegistryDefaults,
    ) -> PipelineResult<RegistryHandle> {
        if let Some(existing) = Self::existing_handle(handle) {
            return Ok(existing);
        }

        let registry_handle = self.registry.initialize(self.capacity, defaults).await?;
        handle.record_mut().program = Some(ProgramSection {
            unique_id: registry_handle.unique_id.clone(),
            registry_locator: registry_handle.locator.clone(),
        });
        handle.persist().await?;
        info!(
            partition = %handle.partition().tag(),
            locator = %registry_handle.locator,
            capacity = self.capacity,
            "Registry initialized"
        );
        Ok(registry_handle)
    }

    /// Write every window that is not yet on-chain.
    ///
    /// A failed window is reported and left for the next pass; only cache
    /// errors abort.
    pub async fn sync(
        &self,
        handle: &mut PartitionHandle,
        registry_handle: &RegistryHandle,
    ) -> PipelineResult<SyncReport> {
        let started_at = OffsetDateTime::now_utc();
        let keys = handle.record().keys();
        let windows = aligned_windows(&keys, self.window_size);
        let mut outcomes: Vec<Option<WindowOutcome>> = vec![None; windows.len()];
        let mut in_flight = FuturesUnordered::new();

        for (idx, window) in windows.iter().enumerate() {
            let record = handle.record();
            if record.all_on_chain(window) {
                debug!(first = %window[0], "Window already on-chain");
                outcomes[idx] = Some(WindowOutcome::Skipped);
                continue;
            }
            let entries: Option<Vec<RegistryEntry>> = window
                .iter()
                .map(|key| {
                    record
                        .get(*key)
                        .filter(|item| item.state() != ItemState::Pending)
                        .map(|item| RegistryEntry::new(item.name.clone(), item.link.clone()))
                })
                .collect();
            let Some(entries) = entries else {
                outcomes[idx] = Some(WindowOutcome::NotReady);
                continue;
            };

            let registry = self.registry.clone();
            let registry_handle = registry_handle.clone();
            let at_index = window[0].0;
            in_flight.push(async move {
                let result = registry
                    .append_window(&registry_handle, &entries, at_index)
                    .await;
                (idx, result)
            });

            if in_flight.len() >= self.concurrency
                && let Some((done, result)) = in_flight.next().await
            {
                outcomes[done] = Some(self.apply(handle, windows[done], result).await?);
            }
        }

        while let Some((done, result)) = in_flight.next().await {
            outcomes[done] = Some(self.apply(handle, windows[done], result).await?);
        }

        let windows = windows
            .iter()
            .zip(outcomes)
            .map(|(window, outcome)| WindowReport {
                first: window[0],
                last: window[window.len() - 1],
                len: window.len(),
                outcome: outcome.unwrap_or(WindowOutcome::NotReady),
            })
            .collect();
        let report = SyncReport {
            started_at,
            windows,
        };
        info!(
            partition = %handle.partition().tag(),
            written = report.written(),
            skipped = report.skipped(),
            not_ready = report.not_ready(),
            failed = report.failed(),
            "Registry sync finished"
        );
        Ok(report)
    }

    async fn apply(
        &self,
        handle: &mut PartitionHandle,
        window: &[LocalKey],
        result: RegistryResult<()>,
    ) -> PipelineResult<WindowOutcome> {
        let (first, last) = (window[0], window[window.len() - 1]);
        match result {
            Ok(()) => {
                let record = handle.record_mut();
                for key in window {
                    if record.get(*key).map(|item| item.state()) == Some(ItemState::Uploaded) {
                        record.mark_on_chain(*key)?;
                    }
                }
                handle.persist().await?;
                debug!(first = %first, last = %last, "Window written");
                Ok(WindowOutcome::Written)
            }
            Err(e) => {
                warn!(
                    partition = %handle.partition().tag(),
                    window = %format!("{first}-{last}"),
                    error = %e,
                    "Registry window failed; re-run sync to retry"
                );
                Ok(WindowOutcome::Failed(e.to_string()))
            }
        }
    }
}

/// Split ascending keys into runs of consecutive keys that never cross a
/// `window_size` boundary.
fn aligned_windows(keys: &[LocalKey], window_size: usize) -> Vec<&[LocalKey]> {
    let block = |key: LocalKey| key.0 as usize / window_size;
    let mut windows = Vec::new();
    let mut start = 0;
    for idx in 1..=keys.len() {
        let split = idx == keys.len()
            || keys[idx].0 != keys[idx - 1].0 + 1
            || block(keys[idx]) != block(keys[idx - 1]);
        if split {
            windows.push(&keys[start..idx]);
            start = idx;
        }
    }
    windows
}
