#![forbid(unsafe_code)]

//! Cell-bucket spatial index for collision queries.
//!
//! [`SpatialIndex`] maps every occupied grid cell to the ids of the blocks
//! covering it, and remembers each block's footprint so removal and update
//! touch only the affected buckets.
//!
//! # Usage
//!
//! ```
//! use blockgrid_layout::{BlockId, GridPosition, GridSize, SpatialIndex};
//!
//! let mut index = SpatialIndex::new();
//! let a = BlockId::from("a");
//! index.add_block(&a, GridPosition::new(1, 1), GridSize::new(2, 2));
//!
//! assert!(index.has_collision_fast(GridPosition::new(2, 2), GridSize::new(1, 1), None));
//! assert!(!index.has_collision_fast(GridPosition::new(3, 1), GridSize::new(1, 1), None));
//! ```
//!
//! # Invariants
//!
//! 1. A block id appears in a bucket iff its recorded footprint covers that
//!    cell.
//! 2. Empty buckets are removed, so `bucket_count()` equals the number of
//!    occupied cells.
//! 3. Query results are sorted and duplicate-free.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::block::{Block, BlockId};
use crate::grid::{Footprint, GridCell, GridPosition, GridSize};

/// Per-cell occupancy index.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    buckets: FxHashMap<GridCell, Vec<BlockId>>,
    footprints: FxHashMap<BlockId, Footprint>,
}

impl SpatialIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over a block list.
    pub fn from_blocks<'a>(blocks: impl IntoIterator<Item = &'a Block>) -> Self {
        let mut index = Self::new();
        index.rebuild(blocks);
        index
    }

    /// Number of indexed blocks.
    #[inline]
    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }

    /// Number of occupied cells.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn contains(&self, id: &BlockId) -> bool {
        self.footprints.contains_key(id)
    }

    /// Recorded footprint for a block.
    #[inline]
    pub fn footprint(&self, id: &BlockId) -> Option<Footprint> {
        self.footprints.get(id).copied()
    }

    /// Index a block. Re-adding an indexed id replaces its footprint.
    pub fn add_block(&mut self, id: &BlockId, position: GridPosition, size: GridSize) {
        if self.footprints.contains_key(id) {
            self.remove_block(id);
        }
        let footprint = Footprint::of(position, size);
        for cell in footprint.cells() {
            self.buckets.entry(cell).or_default().push(id.clone());
        }
        self.footprints.insert(id.clone(), footprint);
    }

    /// Drop a block from every bucket. Returns whether it was indexed.
    pub fn remove_block(&mut self, id: &BlockId) -> bool {
        let Some(footprint) = self.footprints.remove(id) else {
            return false;
        };
        for cell in footprint.cells() {
            if let Some(bucket) = self.buckets.get_mut(&cell) {
                bucket.retain(|entry| entry != id);
                if bucket.is_empty() {
                    self.buckets.remove(&cell);
                }
            }
        }
        true
    }

    /// Move/resize an indexed block.
    pub fn update_block(&mut self, id: &BlockId, position: GridPosition, size: GridSize) {
        let footprint = Footprint::of(position, size);
        if self.footprints.get(id) == Some(&footprint) {
            return;
        }
        self.add_block(id, position, size);
    }

    /// Ids sharing at least one cell with the footprint, sorted.
    pub fn find_potential_collisions(&self, position: GridPosition, size: GridSize) -> Vec<BlockId> {
        let footprint = Footprint::of(position, size);
        let mut seen = FxHashSet::default();
        let mut hits: Vec<BlockId> = Vec::new();
        for cell in footprint.cells() {
            if let Some(bucket) = self.buckets.get(&cell) {
                for id in bucket {
                    if seen.insert(id) {
                        hits.push(id.clone());
                    }
                }
            }
        }
        hits.sort();
        hits
    }

    /// Colliding ids, skipping any for which `skip` returns true.
    pub fn find_collisions_excluding(
        &self,
        position: GridPosition,
        size: GridSize,
        skip: impl Fn(&BlockId) -> bool,
    ) -> Vec<BlockId> {
        let mut hits = self.find_potential_collisions(position, size);
        hits.retain(|id| !skip(id));
        hits
    }

    /// Whether the footprint overlaps any block other than `exclude`.
    pub fn has_collision_fast(
        &self,
        position: GridPosition,
        size: GridSize,
        exclude: Option<&BlockId>,
    ) -> bool {
        Footprint::of(position, size).cells().any(|cell| {
            self.buckets
                .get(&cell)
                .is_some_and(|bucket| bucket.iter().any(|id| Some(id) != exclude))
        })
    }

    /// Cells currently attributed to a block, row-major.
    pub fn cells_of(&self, id: &BlockId) -> Vec<GridCell> {
        self.footprints
            .get(id)
            .map(|footprint| footprint.cells().collect())
            .unwrap_or_default()
    }

    /// Ids in one cell.
    pub fn occupants(&self, cell: GridCell) -> &[BlockId] {
        self.buckets.get(&cell).map_or(&[][..], Vec::as_slice)
    }

    /// Replace the contents with a fresh block list.
    pub fn rebuild<'a>(&mut self, blocks: impl IntoIterator<Item = &'a Block>) {
        self.clear();
        for block in blocks {
            self.add_block(&block.id, block.grid_position, block.grid_size);
        }
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.footprints.clear();
    }

    /// Check that buckets and footprints agree. Test/debug helper.
    pub fn is_consistent(&self) -> bool {
        let mut expected: FxHashMap<GridCell, Vec<&BlockId>> = FxHashMap::default();
        for (id, footprint) in &self.footprints {
            for cell in footprint.cells() {
                expected.entry(cell).or_default().push(id);
            }
        }
        if expected.len() != self.buckets.len() {
            return false;
        }
        expected.into_iter().all(|(cell, mut ids)| {
            let Some(bucket) = self.buckets.get(&cell) else {
                return false;
            };
            let mut actual: Vec<&BlockId> = bucket.iter().collect();
            ids.sort();
            actual.sort();
            ids == actual
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> BlockId {
        BlockId::from(s)
    }

    #[test]
    fn add_then_query() {
        let mut index = SpatialIndex::new();
        index.add_block(&id("a"), GridPosition::new(1, 1), GridSize::new(2, 2));
        index.add_block(&id("b"), GridPosition::new(3, 1), GridSize::new(1, 1));
        assert_eq!(index.len(), 2);
        assert_eq!(index.bucket_count(), 5);
        assert_eq!(
            index.find_potential_collisions(GridPosition::new(2, 1), GridSize::new(2, 1)),
            vec![id("a"), id("b")]
        );
        assert!(index.is_consistent());
    }

    #[test]
    fn exclude_skips_self() {
        let mut index = SpatialIndex::new();
        index.add_block(&id("a"), GridPosition::new(1, 1), GridSize::new(2, 2));
        assert!(!index.has_collision_fast(
            GridPosition::new(2, 2),
            GridSize::new(2, 2),
            Some(&id("a"))
        ));
        assert!(index.has_collision_fast(GridPosition::new(2, 2), GridSize::new(2, 2), None));
    }

    #[test]
    fn update_moves_buckets() {
        let mut index = SpatialIndex::new();
        index.add_block(&id("a"), GridPosition::new(1, 1), GridSize::new(1, 1));
        index.update_block(&id("a"), GridPosition::new(5, 5), GridSize::new(2, 1));
        assert!(index.occupants(GridCell::new(1, 1)).is_empty());
        assert_eq!(index.occupants(GridCell::new(6, 5)), &[id("a")]);
        assert_eq!(
            index.cells_of(&id("a")),
            vec![GridCell::new(5, 5), GridCell::new(6, 5)]
        );
        assert!(index.is_consistent());
    }

    #[test]
    fn remove_clears_empty_buckets() {
        let mut index = SpatialIndex::new();
        index.add_block(&id("a"), GridPosition::new(1, 1), GridSize::new(3, 3));
        assert!(index.remove_block(&id("a")));
        assert!(!index.remove_block(&id("a")));
        assert_eq!(index.bucket_count(), 0);
        assert!(index.is_empty());
    }

    #[test]
    fn shared_cells_keep_both_ids() {
        let mut index = SpatialIndex::new();
        index.add_block(&id("a"), GridPosition::new(1, 1), GridSize::new(2, 1));
        index.add_block(&id("b"), GridPosition::new(2, 1), GridSize::new(2, 1));
        index.remove_block(&id("a"));
        assert_eq!(index.occupants(GridCell::new(2, 1)), &[id("b")]);
        assert!(index.is_consistent());
    }

    #[test]
    fn rebuild_matches_incremental() {
        let blocks = [
            Block::new("a", "x", GridPosition::new(1, 1), GridSize::new(2, 2)),
            Block::new("b", "x", GridPosition::new(4, 2), GridSize::new(3, 1)),
        ];
        let rebuilt = SpatialIndex::from_blocks(&blocks);
        assert_eq!(rebuilt.len(), 2);
        assert_eq!(rebuilt.cells_of(&id("b")).len(), 3);
        assert!(rebuilt.is_consistent());
    }
}
