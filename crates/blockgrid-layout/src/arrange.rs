#![forbid(unsafe_code)]

//! Auto-arrange: compacting the whole board with a packing strategy.
//!
//! Arrangement is computed against a scratch [`SpatialIndex`]: immovable
//! blocks are seeded first and stay put, then movable blocks are placed one at
//! a time in reading order. The result is a list of [`Relocation`]s for the
//! blocks whose position changed; callers commit it like any other plan.

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::grid::{GridConfig, GridCoordinateSystem, GridPosition, GridSize, ScanOrder};
use crate::reflow::Relocation;
use crate::spatial::SpatialIndex;

/// Packing strategy for auto-arrange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArrangeStrategy {
    /// Row-major first-fit toward the top-left corner.
    #[default]
    TopLeft,
    /// Skyline packing: each block drops into the lowest column run.
    Masonry,
    /// Shelf packing: fill a row left-to-right, then open a new shelf.
    ByRow,
    /// Column-major first-fit.
    ByColumn,
}

impl ArrangeStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::Masonry => "masonry",
            Self::ByRow => "by-row",
            Self::ByColumn => "by-column",
        }
    }
}

/// Compute the arrangement for `blocks` under `strategy`.
///
/// Returns relocations for moved blocks only, in placement order.
pub fn arrange(blocks: &[Block], grid: &GridConfig, strategy: ArrangeStrategy) -> Vec<Relocation> {
    let coords = GridCoordinateSystem::new(*grid);
    let mut occupied = SpatialIndex::from_blocks(blocks.iter().filter(|block| !block.movable));

    let mut movable: Vec<&Block> = blocks.iter().filter(|block| block.movable).collect();
    match strategy {
        ArrangeStrategy::ByColumn => movable.sort_by(|a, b| {
            (a.grid_position.column, a.grid_position.row, &a.id).cmp(&(
                b.grid_position.column,
                b.grid_position.row,
                &b.id,
            ))
        }),
        _ => movable.sort_by(|a, b| a.reading_order_key().cmp(&b.reading_order_key())),
    }

    let mut packer = Packer::new(strategy, grid.columns);
    let mut relocations = Vec::new();
    for block in movable {
        let size = block.grid_size;
        let placed = packer
            .place(&coords, &occupied, size)
            .unwrap_or(GridPosition::ORIGIN)
            .with_z_index(block.grid_position.z_index);
        occupied.add_block(&block.id, placed, size);
        if !placed.same_cell(block.grid_position) {
            relocations.push(Relocation {
                block_id: block.id.clone(),
                from: block.grid_position,
                to: placed,
            });
        }
    }
    relocations
}

/// Per-strategy placement cursor.
struct Packer {
    strategy: ArrangeStrategy,
    /// Masonry: next free row per column (index 0 = column 1).
    skyline: Vec<u16>,
    /// By-row: current shelf top, its height, and the next free column.
    shelf_row: u16,
    shelf_height: u16,
    shelf_column: u16,
}

impl Packer {
    fn new(strategy: ArrangeStrategy, columns: u16) -> Self {
        Self {
            strategy,
            skyline: vec![1; usize::from(columns.max(1))],
            shelf_row: 1,
            shelf_height: 0,
            shelf_column: 1,
        }
    }

    fn place(
        &mut self,
        coords: &GridCoordinateSystem,
        occupied: &SpatialIndex,
        size: GridSize,
    ) -> Option<GridPosition> {
        let is_free = |candidate: GridPosition| {
            coords.is_valid_position(candidate, size)
                && !occupied.has_collision_fast(candidate, size, None)
        };
        match self.strategy {
            ArrangeStrategy::TopLeft => coords.first_fit(size, ScanOrder::RowMajor, 1, is_free),
            ArrangeStrategy::ByColumn => {
                coords.first_fit(size, ScanOrder::ColumnMajor, 1, is_free)
            }
            ArrangeStrategy::Masonry => self.place_masonry(coords, size, is_free),
            ArrangeStrategy::ByRow => self.place_shelf(coords, size, is_free),
        }
    }

    fn place_masonry(
        &mut self,
        coords: &GridCoordinateSystem,
        size: GridSize,
        is_free: impl Fn(GridPosition) -> bool,
    ) -> Option<GridPosition> {
        let span = usize::from(size.column_span.max(1));
        if span > self.skyline.len() {
            return None;
        }
        let (start, top) = (0..=self.skyline.len() - span)
            .map(|start| {
                let top = self.skyline[start..start + span]
                    .iter()
                    .copied()
                    .max()
                    .unwrap_or(1);
                (start, top)
            })
            .min_by_key(|&(start, top)| (top, start))?;

        let column = u16::try_from(start + 1).ok()?;
        let placed = coords
            .first_fit(size, ScanOrder::RowMajor, top, |candidate| {
                candidate.column == column && is_free(candidate)
            })
            .or_else(|| coords.first_fit(size, ScanOrder::RowMajor, 1, &is_free))?;

        let column_index = usize::from(placed.column - 1);
        let bottom = placed.row.saturating_add(size.row_span.max(1));
        for height in &mut self.skyline[column_index..column_index + span] {
            *height = (*height).max(bottom);
        }
        Some(placed)
    }

    fn place_shelf(
        &mut self,
        coords: &GridCoordinateSystem,
        size: GridSize,
        is_free: impl Fn(GridPosition) -> bool,
    ) -> Option<GridPosition> {
        let columns = u16::try_from(self.skyline.len()).unwrap_or(u16::MAX);
        let span = size.column_span.max(1);
        if self.shelf_column.saturating_add(span - 1) > columns {
            self.shelf_row = self.shelf_row.saturating_add(self.shelf_height.max(1));
            self.shelf_column = 1;
            self.shelf_height = 0;
        }

        let candidate = GridPosition::new(self.shelf_column, self.shelf_row);
        let placed = if is_free(candidate) {
            candidate
        } else {
            coords.first_fit(size, ScanOrder::RowMajor, self.shelf_row, &is_free)?
        };

        if placed.row == self.shelf_row {
            self.shelf_column = placed.column.saturating_add(span);
            self.shelf_height = self.shelf_height.max(size.row_span.max(1));
        } else {
            self.shelf_row = placed.row;
            self.shelf_column = placed.column.saturating_add(span);
            self.shelf_height = size.row_span.max(1);
        }
        Some(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockId;
    use crate::reflow::{ReflowPlan, apply_plan};

    fn block(id: &str, column: u16, row: u16, w: u16, h: u16) -> Block {
        Block::new(id, "box", GridPosition::new(column, row), GridSize::new(w, h))
    }

    fn arranged(blocks: &[Block], strategy: ArrangeStrategy) -> Vec<Block> {
        let relocations = arrange(blocks, &GridConfig::new(6, 60.0, 8.0), strategy);
        let mut out = blocks.to_vec();
        let plan = ReflowPlan {
            anchor: BlockId::from("__none__"),
            anchor_to: GridPosition::ORIGIN,
            anchor_size: GridSize::default(),
            relocations,
        };
        apply_plan(&plan, &mut out);
        out
    }

    fn position(blocks: &[Block], id: &str) -> (u16, u16) {
        let block = blocks
            .iter()
            .find(|block| block.id.as_str() == id)
            .expect("block present");
        (block.grid_position.column, block.grid_position.row)
    }

    fn overlap_free(blocks: &[Block]) -> bool {
        blocks.iter().enumerate().all(|(i, a)| {
            blocks[i + 1..]
                .iter()
                .all(|b| !a.footprint().overlaps(&b.footprint()))
        })
    }

    fn scattered() -> Vec<Block> {
        vec![
            block("a", 4, 5, 2, 1),
            block("b", 1, 9, 3, 2),
            block("c", 2, 3, 4, 1),
            block("d", 6, 12, 1, 3),
        ]
    }

    #[test]
    fn top_left_compacts_in_reading_order() {
        let out = arranged(&scattered(), ArrangeStrategy::TopLeft);
        assert_eq!(position(&out, "c"), (1, 1));
        assert_eq!(position(&out, "a"), (5, 1));
        assert_eq!(position(&out, "b"), (1, 2));
        assert_eq!(position(&out, "d"), (4, 2));
        assert!(overlap_free(&out));
    }

    #[test]
    fn by_column_fills_down_first() {
        let blocks = vec![block("a", 1, 4, 1, 1), block("b", 3, 1, 1, 1)];
        let out = arranged(&blocks, ArrangeStrategy::ByColumn);
        assert_eq!(position(&out, "a"), (1, 1));
        assert_eq!(position(&out, "b"), (1, 2));
    }

    #[test]
    fn masonry_drops_into_lowest_run() {
        let blocks = vec![
            block("tall", 1, 1, 3, 3),
            block("short", 4, 1, 3, 1),
            block("next", 1, 8, 3, 1),
        ];
        let out = arranged(&blocks, ArrangeStrategy::Masonry);
        assert_eq!(position(&out, "tall"), (1, 1));
        assert_eq!(position(&out, "short"), (4, 1));
        assert_eq!(position(&out, "next"), (4, 2));
        assert!(overlap_free(&out));
    }

    #[test]
    fn by_row_opens_new_shelf() {
        let blocks = vec![
            block("a", 1, 1, 4, 2),
            block("b", 1, 5, 3, 1),
            block("c", 1, 7, 2, 1),
        ];
        let out = arranged(&blocks, ArrangeStrategy::ByRow);
        assert_eq!(position(&out, "a"), (1, 1));
        assert_eq!(position(&out, "b"), (1, 3));
        assert_eq!(position(&out, "c"), (4, 3));
        assert!(overlap_free(&out));
    }

    #[test]
    fn immovable_blocks_stay_and_are_avoided() {
        let blocks = vec![
            block("pin", 1, 1, 2, 1).with_movable(false),
            block("a", 3, 4, 2, 1),
        ];
        let relocations = arrange(&blocks, &GridConfig::new(6, 60.0, 8.0), ArrangeStrategy::TopLeft);
        assert_eq!(relocations.len(), 1);
        assert_eq!(relocations[0].block_id, BlockId::from("a"));
        assert_eq!(relocations[0].to, GridPosition::new(3, 1));
    }

    #[test]
    fn already_packed_board_yields_no_relocations() {
        let blocks = vec![block("a", 1, 1, 3, 1), block("b", 4, 1, 3, 1)];
        for strategy in [
            ArrangeStrategy::TopLeft,
            ArrangeStrategy::Masonry,
            ArrangeStrategy::ByRow,
        ] {
            assert!(arrange(&blocks, &GridConfig::new(6, 60.0, 8.0), strategy).is_empty());
        }
    }
}
