//! Byte-budgeted batch planning.

use crate::asset::FilePair;
use crate::grid::GlobalIndex;
use crate::{Error, Result};

/// A contiguous run of file pairs uploaded together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    pub items: Vec<FilePair>,
    /// Cumulative size of all items.
    pub bytes: u64,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = GlobalIndex> + '_ {
        self.items.iter().map(|pair| pair.key)
    }

    fn push(&mut self, pair: FilePair) {
        self.bytes += pair.size;
        self.items.push(pair);
    }
}

/// Greedily split an ordered queue into batches of at most `budget` bytes.
///
/// The whole queue is checked before any batch is produced, so a single
/// oversized pair fails the plan without any upload taking place.
pub fn plan(items: Vec<FilePair>, budget: u64) -> Result<Vec<Batch>> {
    if let Some(pair) = items.iter().find(|pair| pair.size > budget) {
        return Err(Error::PayloadTooLarge {
            key: pair.key.0,
            size: pair.size,
            budget,
        });
    }

    let mut batches = Vec::new();
    let mut current = Batch::default();
    for pair in items {
        if !current.is_empty() && current.bytes + pair.size > budget {
            batches.push(std::mem::take(&mut current));
        }
        current.push(pair);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    Ok(batches)
}
