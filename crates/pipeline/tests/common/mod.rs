pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{
    global, manifest_json, pipeline_with, pipeline_with_remapper, test_layout, transposed_remapper,
    write_item, write_items,
};
#[allow(unused_imports)]
pub use mocks::{MemoryAssetStore, MemoryBundleStore, MockRegistry};
