//! Grid layout, partitions, and the index remapper.
//!
//! The global grid is split into equally sized rectangular partitions. Each
//! global index belongs to exactly one partition, and inside that partition it
//! occupies a local slot chosen by a fixed permutation table shared by every
//! partition. The table is computed once per deployment (for example from a
//! space-filling walk) so that local keys follow the walk order.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Position of a cell in the whole grid, `row * grid_width + col`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalIndex(pub u64);

impl fmt::Display for GlobalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Permuted slot of a cell inside its partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalKey(pub u32);

impl fmt::Display for LocalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rectangular region of the grid, addressed by (row, column).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Partition {
    pub row: u32,
    pub col: u32,
}

impl Partition {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Partition from its ordinal number (`row * partitions_per_row + col`).
    pub fn from_ordinal(ordinal: u32, partitions_per_row: u32) -> Self {
        Self {
            row: ordinal / partitions_per_row,
            col: ordinal % partitions_per_row,
        }
    }

    /// Ordinal number of this partition.
    pub fn ordinal(&self, partitions_per_row: u32) -> u32 {
        self.row * partitions_per_row + self.col
    }

    /// Cache tag, `[row,col]`.
    pub fn tag(&self) -> String {
        format!("[{},{}]", self.row, self.col)
    }

    /// Parse a `[row,col]` cache tag.
    pub fn parse_tag(tag: &str) -> Result<Self> {
        let inner = tag
            .trim()
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| Error::InvalidPartitionTag(tag.to_string()))?;
        let (row, col) = inner
            .split_once(',')
            .ok_or_else(|| Error::InvalidPartitionTag(tag.to_string()))?;
        let row = row
            .trim()
            .parse()
            .map_err(|_| Error::InvalidPartitionTag(tag.to_string()))?;
        let col = col
            .trim()
            .parse()
            .map_err(|_| Error::InvalidPartitionTag(tag.to_string()))?;
        Ok(Self { row, col })
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.row, self.col)
    }
}

/// Dimensions of the global grid and of each partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    pub grid_width: u64,
    pub grid_height: u64,
    pub partition_width: u32,
    pub partition_height: u32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            grid_width: 1000,
            grid_height: 1000,
            partition_width: 200,
            partition_height: 200,
        }
    }
}

impl GridLayout {
    /// Check that partitions tile the grid exactly.
    pub fn validate(&self) -> Result<()> {
        if self.grid_width == 0
            || self.grid_height == 0
            || self.partition_width == 0
            || self.partition_height == 0
        {
            return Err(Error::InvalidLayout("dimensions must be non-zero".to_string()));
        }
        if self.grid_width % u64::from(self.partition_width) != 0
            || self.grid_height % u64::from(self.partition_height) != 0
        {
            return Err(Error::InvalidLayout(format!(
                "partition {}x{} does not tile grid {}x{}",
                self.partition_width, self.partition_height, self.grid_width, self.grid_height
            )));
        }
        if u64::from(self.partition_width) * u64::from(self.partition_height) > u64::from(u32::MAX)
        {
            return Err(Error::InvalidLayout("partition has too many cells".to_string()));
        }
        Ok(())
    }

    pub fn total_cells(&self) -> u64 {
        self.grid_width * self.grid_height
    }

    pub fn cells_per_partition(&self) -> u32 {
        self.partition_width * self.partition_height
    }

    pub fn partitions_per_row(&self) -> u32 {
        (self.grid_width / u64::from(self.partition_width)) as u32
    }

    pub fn partitions_per_col(&self) -> u32 {
        (self.grid_height / u64::from(self.partition_height)) as u32
    }

    pub fn partition_count(&self) -> u32 {
        self.partitions_per_row() * self.partitions_per_col()
    }

    pub fn contains(&self, partition: Partition) -> bool {
        partition.row < self.partitions_per_col() && partition.col < self.partitions_per_row()
    }
}

/// Bijection from raw local positions (`local_row * width + local_col`) to
/// local keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permutation {
    forward: Vec<u32>,
    inverse: Vec<u32>,
}

impl Permutation {
    /// The identity table: local key equals raw position.
    pub fn identity(len: u32) -> Self {
        let forward: Vec<u32> = (0..len).collect();
        Self {
            inverse: forward.clone(),
            forward,
        }
    }

    /// Build from a forward table, checking that it is a permutation of `0..len`.
    pub fn from_table(forward: Vec<u32>) -> Result<Self> {
        let len = forward.len();
        if u32::try_from(len).is_err() {
            return Err(Error::InvalidPermutation(format!("table too long: {len}")));
        }
        let mut inverse = vec![u32::MAX; len];
        for (raw, &key) in forward.iter().enumerate() {
            let slot = inverse.get_mut(key as usize).ok_or_else(|| {
                Error::InvalidPermutation(format!("key {key} at position {raw} exceeds {len}"))
            })?;
            if *slot != u32::MAX {
                return Err(Error::InvalidPermutation(format!(
                    "key {key} appears more than once"
                )));
            }
            *slot = raw as u32;
        }
        Ok(Self { forward, inverse })
    }

    /// Build from a walk over the partition: the k-th visited cell gets key k.
    pub fn from_path(points: &[(u32, u32)], width: u32) -> Result<Self> {
        let len = points.len();
        let mut forward = vec![u32::MAX; len];
        for (step, &(x, y)) in points.iter().enumerate() {
            if x >= width {
                return Err(Error::InvalidPermutation(format!(
                    "point ({x}, {y}) outside width {width}"
                )));
            }
            let raw = u64::from(y) * u64::from(width) + u64::from(x);
            let slot = usize::try_from(raw)
                .ok()
                .and_then(|raw| forward.get_mut(raw))
                .ok_or_else(|| {
                    Error::InvalidPermutation(format!("point ({x}, {y}) outside path of {len}"))
                })?;
            if *slot != u32::MAX {
                return Err(Error::InvalidPermutation(format!(
                    "point ({x}, {y}) visited twice"
                )));
            }
            *slot = step as u32;
        }
        Self::from_table(forward)
    }

    /// Parse a path file with one `x y` pair per line.
    pub fn parse_path(text: &str, width: u32) -> Result<Self> {
        let mut points = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let parse = |field: Option<&str>| -> Result<u32> {
                field.and_then(|f| f.parse().ok()).ok_or_else(|| {
                    Error::InvalidPermutation(format!("line {}: expected `x y`", lineno + 1))
                })
            };
            let x = parse(fields.next())?;
            let y = parse(fields.next())?;
            points.push((x, y));
        }
        Self::from_path(&points, width)
    }

    /// Load a JSON array table from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            Error::InvalidPermutation(format!("failed to read {}: {e}", path.display()))
        })?;
        let forward: Vec<u32> =
            serde_json::from_slice(&data).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::from_table(forward)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.forward
    }

    /// Local key for a raw local position.
    pub fn key_of(&self, raw: u32) -> Option<u32> {
        self.forward.get(raw as usize).copied()
    }

    /// Raw local position for a local key.
    pub fn position_of(&self, key: u32) -> Option<u32> {
        self.inverse.get(key as usize).copied()
    }
}

/// Maps global indices to (partition, local key) and back.
#[derive(Clone, Debug)]
pub struct IndexRemapper {
    layout: GridLayout,
    permutation: Permutation,
}

impl IndexRemapper {
    pub fn new(layout: GridLayout, permutation: Permutation) -> Result<Self> {
        layout.validate()?;
        if permutation.len() != layout.cells_per_partition() as usize {
            return Err(Error::InvalidPermutation(format!(
                "table has {} entries, partition has {} cells",
                permutation.len(),
                layout.cells_per_partition()
            )));
        }
        Ok(Self {
            layout,
            permutation,
        })
    }

    /// Remapper whose local keys are raw row-major positions.
    pub fn with_identity(layout: GridLayout) -> Result<Self> {
        layout.validate()?;
        Self::new(layout, Permutation::identity(layout.cells_per_partition()))
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn partition_of(&self, index: GlobalIndex) -> Result<Partition> {
        self.locate(index).map(|(partition, _)| partition)
    }

    /// Decompose a global index into its partition and local key.
    pub fn locate(&self, index: GlobalIndex) -> Result<(Partition, LocalKey)> {
        let total = self.layout.total_cells();
        if index.0 >= total {
            return Err(Error::IndexOutOfRange {
                index: index.0,
                total,
            });
        }
        let pw = u64::from(self.layout.partition_width);
        let ph = u64::from(self.layout.partition_height);
        let global_row = index.0 / self.layout.grid_width;
        let global_col = index.0 % self.layout.grid_width;

        let partition = Partition::new((global_row / ph) as u32, (global_col / pw) as u32);
        let raw = ((global_row % ph) * pw + global_col % pw) as u32;
        let key = self
            .permutation
            .key_of(raw)
            .ok_or_else(|| Error::InvalidPermutation(format!("no key for position {raw}")))?;
        Ok((partition, LocalKey(key)))
    }

    /// Recompose a global index from its partition and local key.
    pub fn global_index(&self, partition: Partition, key: LocalKey) -> Result<GlobalIndex> {
        if !self.layout.contains(partition) {
            return Err(Error::InvalidPartition(partition.tag()));
        }
        let raw = self
            .permutation
            .position_of(key.0)
            .ok_or(Error::InvalidLocalKey {
                key: key.0,
                total: self.layout.cells_per_partition(),
            })?;
        let pw = u64::from(self.layout.partition_width);
        let ph = u64::from(self.layout.partition_height);
        let global_row = u64::from(partition.row) * ph + u64::from(raw) / pw;
        let global_col = u64::from(partition.col) * pw + u64::from(raw) % pw;
        Ok(GlobalIndex(global_row * self.layout.grid_width + global_col))
    }

    /// Global indices of a partition in row-major order.
    pub fn partition_indices(
        &self,
        partition: Partition,
    ) -> Result<impl Iterator<Item = GlobalIndex> + '_> {
        if !self.layout.contains(partition) {
            return Err(Error::InvalidPartition(partition.tag()));
        }
        let pw = u64::from(self.layout.partition_width);
        let ph = u64::from(self.layout.partition_height);
        let row_start = u64::from(partition.row) * ph;
        let col_start = u64::from(partition.col) * pw;
        let width = self.layout.grid_width;
        Ok((row_start..row_start + ph).flat_map(move |row| {
            (col_start..col_start + pw).map(move |col| GlobalIndex(row * width + col))
        }))
    }
}
