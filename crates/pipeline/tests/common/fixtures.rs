#![allow(dead_code)]

use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tessera_cache::ProgressCache;
use tessera_core::config::CollectionConfig;
use tessera_core::{GridLayout, IndexRemapper, Permutation};
use tessera_pipeline::{ItemSource, Pipeline, PipelineSettings};
use tessera_registry::Registry;
use tessera_storage::UploadBackend;

/// 20x20 grid split into four 10x10 partitions.
pub fn test_layout() -> GridLayout {
    GridLayout {
        grid_width: 20,
        grid_height: 20,
        partition_width: 10,
        partition_height: 10,
    }
}

/// Global index of a cell on the test grid.
pub fn global(row: u64, col: u64) -> u64 {
    row * 20 + col
}

pub fn manifest_json(index: u64) -> String {
    json!({
        "name": format!("Land #{index:06}"),
        "symbol": "LAND",
        "seller_fee_basis_points": 500,
        "image": format!("{index}.png"),
        "properties": {
            "creators": [{"address": "creator", "share": 100}],
            "files": [{"type": "image/png", "uri": format!("{index}.png")}]
        }
    })
    .to_string()
}

/// Write `<index>.png` with `image_len` bytes and its manifest.
pub fn write_item(dir: &Path, index: u64, image_len: usize) {
    std::fs::create_dir_all(dir).unwrap();
    let image: Vec<u8> = (0..image_len).map(|i| (i as u64 ^ index) as u8).collect();
    std::fs::write(dir.join(format!("{index}.png")), image).unwrap();
    std::fs::write(dir.join(format!("{index}.json")), manifest_json(index)).unwrap();
}

pub fn write_items(dir: &Path, indices: impl IntoIterator<Item = u64>, image_len: usize) {
    for index in indices {
        write_item(dir, index, image_len);
    }
}

/// Column-by-column walk of a 10x10 partition: cell `(row, col)` gets key
/// `col * 10 + row`.
pub fn transposed_remapper() -> IndexRemapper {
    let points: Vec<(u32, u32)> = (0..10)
        .flat_map(|x| (0..10).map(move |y| (x, y)))
        .collect();
    let permutation = Permutation::from_path(&points, 10).unwrap();
    IndexRemapper::new(test_layout(), permutation).unwrap()
}

/// Pipeline over `<root>/assets` and `<root>/cache` on the test grid.
pub fn pipeline_with(
    root: &Path,
    backend: UploadBackend,
    registry: Arc<dyn Registry>,
    batch_size_limit: u64,
) -> Pipeline {
    let remapper = IndexRemapper::with_identity(test_layout()).unwrap();
    pipeline_with_remapper(root, backend, registry, batch_size_limit, remapper)
}

pub fn pipeline_with_remapper(
    root: &Path,
    backend: UploadBackend,
    registry: Arc<dyn Registry>,
    batch_size_limit: u64,
    remapper: IndexRemapper,
) -> Pipeline {
    let cache = Arc::new(ProgressCache::new(
        root.join("cache").join("devnet-temp"),
        "devnet",
        "temp",
    ));
    let remapper = Arc::new(remapper);
    Pipeline::new(
        cache,
        remapper,
        ItemSource::new(root.join("assets")),
        backend,
        registry,
        PipelineSettings {
            batch_size_limit,
            window_size: 10,
            concurrency: 4,
            collection: CollectionConfig::default(),
        },
    )
}
