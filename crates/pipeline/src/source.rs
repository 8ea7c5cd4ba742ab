//! Discovery and loading of `<index>.png` / `<index>.json` pairs.

use crate::error::{PipelineError, PipelineResult};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tessera_core::{
    AssetManifest, Error as CoreError, FilePair, GlobalIndex, IndexRemapper, Partition,
    normalize_item_key,
};
use tessera_storage::PreparedPair;
use tokio::fs;
use tracing::{debug, warn};

#[derive(Default)]
struct Halves {
    image: Option<(PathBuf, u64)>,
    metadata: Option<(PathBuf, u64)>,
}

/// Directory of item files.
#[derive(Clone, Debug)]
pub struct ItemSource {
    dir: PathBuf,
}

impl ItemSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every complete pair in the directory, keyed by global index.
    ///
    /// Stems are parsed after stripping leading zeros. Files that are not
    /// `.png`/`.json` or whose stem is not all ASCII digits are ignored; a lone half
    /// of a pair is skipped with a warning.
    pub async fn scan(&self) -> PipelineResult<BTreeMap<GlobalIndex, FilePair>> {
        let mut halves: BTreeMap<GlobalIndex, Halves> = BTreeMap::new();
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| self.io_error(&self.dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| self.io_error(&self.dir, e))?
        {
            let path = entry.path();
            let (Some(stem), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            let digits = !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit());
            let Some(index) = digits
                .then(|| normalize_item_key(stem).parse::<u64>().ok())
                .flatten()
            else {
                debug!(file = %path.display(), "Ignoring non-item file");
                continue;
            };
            let is_image = ext.eq_ignore_ascii_case("png");
            if !is_image && !ext.eq_ignore_ascii_case("json") {
                continue;
            }

            let size = entry
                .metadata()
                .await
                .map_err(|e| self.io_error(&path, e))?
                .len();
            let slot = halves.entry(GlobalIndex(index)).or_default();
            let half = if is_image {
                &mut slot.image
            } else {
                &mut slot.metadata
            };
            if let Some((previous, _)) = half {
                warn!(
                    item = index,
                    kept = %path.display(),
                    dropped = %previous.display(),
                    "Two files normalize to the same item"
                );
            }
            *half = Some((path, size));
        }

        let mut pairs = BTreeMap::new();
        for (key, slot) in halves {
            match (slot.image, slot.metadata) {
                (Some((image, image_size)), Some((metadata, metadata_size))) => {
                    pairs.insert(
                        key,
                        FilePair {
                            key,
                            image,
                            metadata,
                            size: image_size + metadata_size,
                        },
                    );
                }
                _ => warn!(item = %key, "Skipping item without both image and metadata"),
            }
        }
        Ok(pairs)
    }

    /// Complete pairs belonging to one partition, in ascending key order.
    pub async fn candidates(
        &self,
        remapper: &IndexRemapper,
        partition: Partition,
    ) -> PipelineResult<Vec<FilePair>> {
        let total = remapper.layout().total_cells();
        let mut pairs = Vec::new();
        for (key, pair) in self.scan().await? {
            if key.0 >= total {
                warn!(item = %key, total, "Skipping item outside the grid");
                continue;
            }
            if remapper.partition_of(key)? == partition {
                pairs.push(pair);
            }
        }
        Ok(pairs)
    }

    /// Read a pair into memory and check its manifest.
    pub async fn load(&self, pair: &FilePair) -> PipelineResult<PreparedPair> {
        let image = fs::read(&pair.image)
            .await
            .map_err(|e| self.io_error(&pair.image, e))?;
        let manifest = self.manifest(pair).await?;
        Ok(PreparedPair {
            key: pair.key,
            image: Bytes::from(image),
            manifest,
        })
    }

    /// Parse a pair's manifest; its embedded index must match the file's.
    pub async fn manifest(&self, pair: &FilePair) -> PipelineResult<AssetManifest> {
        let data = fs::read(&pair.metadata)
            .await
            .map_err(|e| self.io_error(&pair.metadata, e))?;
        let manifest = AssetManifest::from_slice(&data)?;
        let embedded = manifest.global_index()?;
        if embedded != pair.key {
            return Err(CoreError::InvalidManifest(format!(
                "{} names item {embedded} but the file is item {}",
                pair.metadata.display(),
                pair.key
            ))
            .into());
        }
        Ok(manifest)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> PipelineError {
        PipelineError::Source {
            path: path.display().to_string(),
            source,
        }
    }
}
