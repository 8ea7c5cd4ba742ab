#![allow(dead_code)]

use bytes::Bytes;
use serde_json::json;
use std::net::TcpListener;
use tessera_core::{AssetManifest, GlobalIndex};
use tessera_storage::PreparedPair;

pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

/// Generate deterministic test data using a seeded pseudo-random generator
/// Same seed produces same output (reproducible tests)
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

pub fn manifest(index: u64) -> AssetManifest {
    serde_json::from_value(json!({
        "name": format!("Land #{index:06}"),
        "symbol": "LAND",
        "seller_fee_basis_points": 500,
        "image": format!("{index}.png"),
        "properties": {
            "creators": [{"address": "creator", "share": 100}],
            "files": [{"type": "image/png", "uri": format!("{index}.png")}]
        }
    }))
    .unwrap()
}

pub fn prepared_pair(index: u64, image_len: usize) -> PreparedPair {
    PreparedPair {
        key: GlobalIndex(index),
        image: seeded_bytes(index, image_len),
        manifest: manifest(index),
    }
}
