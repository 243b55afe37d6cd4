#![forbid(unsafe_code)]

//! Reflow: planning the relocations that make room for a moved or resized
//! block.
//!
//! A plan is computed against a scratch [`SpatialIndex`] seeded with the
//! current layout and the anchor at its target. Nothing on the board changes
//! until the caller commits the plan.
//!
//! # Modes
//!
//! | Mode | Behaviour |
//! |------|-----------|
//! | `None` | No relocation; the target must already be free. |
//! | `PushAway` | Displaced blocks move by the anchor's dominant-axis vector, cascading. |
//! | `SmartFill` | Like push-away, but a block whose pushed spot is taken is re-homed first-fit. |
//! | `AxisShift` | Single-level shift of far-side blocks in the anchor's lane. |
//!
//! # Invariants
//!
//! 1. Every block is relocated at most once per plan.
//! 2. A successful plan has no overlapping footprints among the anchor target,
//!    the relocated blocks, and the blocks it left alone.
//! 3. Immovable blocks never appear in `relocations`.
//!
//! # Failure Modes
//!
//! | Condition | Error |
//! |-----------|-------|
//! | Anchor id unknown | [`ReflowError::UnknownAnchor`] |
//! | Anchor target outside the grid | [`ReflowError::OutOfBounds`] |
//! | A displaced block is immovable | [`ReflowError::Immovable`] |
//! | A displaced block cannot be placed | [`ReflowError::NoRoom`] |
//! | Target taken and the mode cannot move the occupant | [`ReflowError::Blocked`] |

use std::collections::VecDeque;
use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockId};
use crate::grid::{
    Footprint, GridConfig, GridCoordinateSystem, GridPosition, GridSize, ScanOrder,
};
use crate::spatial::SpatialIndex;

/// Collision resolution strategy for drags and resizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReflowMode {
    #[default]
    None,
    PushAway,
    SmartFill,
    AxisShift,
}

impl ReflowMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PushAway => "push-away",
            Self::SmartFill => "smart-fill",
            Self::AxisShift => "axis-shift",
        }
    }
}

/// One block's planned move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub block_id: BlockId,
    pub from: GridPosition,
    pub to: GridPosition,
}

/// Result of a successful reflow computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflowPlan {
    pub anchor: BlockId,
    pub anchor_to: GridPosition,
    pub anchor_size: GridSize,
    /// Displaced blocks, in the order they were resolved.
    pub relocations: Vec<Relocation>,
}

impl ReflowPlan {
    /// True when nothing besides the anchor moves.
    #[inline]
    pub fn is_trivial(&self) -> bool {
        self.relocations.is_empty()
    }

    /// Planned target for a displaced block.
    pub fn target_of(&self, id: &BlockId) -> Option<GridPosition> {
        self.relocations
            .iter()
            .find(|relocation| &relocation.block_id == id)
            .map(|relocation| relocation.to)
    }
}

/// Reflow planning failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflowError {
    UnknownAnchor {
        anchor: BlockId,
    },
    OutOfBounds {
        anchor: BlockId,
        position: GridPosition,
        size: GridSize,
    },
    Immovable {
        block_id: BlockId,
    },
    NoRoom {
        block_id: BlockId,
    },
    Blocked {
        blocker: BlockId,
    },
}

impl fmt::Display for ReflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAnchor { anchor } => write!(f, "unknown block '{anchor}'"),
            Self::OutOfBounds {
                anchor,
                position,
                size,
            } => write!(
                f,
                "block '{anchor}' at ({}, {}) spanning {}x{} leaves the grid",
                position.column, position.row, size.column_span, size.row_span
            ),
            Self::Immovable { block_id } => {
                write!(f, "block '{block_id}' is immovable and cannot be displaced")
            }
            Self::NoRoom { block_id } => write!(f, "no room to displace block '{block_id}'"),
            Self::Blocked { blocker } => write!(f, "target is occupied by block '{blocker}'"),
        }
    }
}

impl std::error::Error for ReflowError {}

/// Projected displacement along the dominant axis.
///
/// The position delta wins; a zero move falls back to size growth, and a
/// zero growth nudges one row down.
fn displacement(
    from: GridPosition,
    from_size: GridSize,
    to: GridPosition,
    to_size: GridSize,
) -> (i32, i32) {
    let (mut dc, mut dr) = to.delta_from(from);
    if dc == 0 && dr == 0 {
        dc = (i32::from(to_size.column_span) - i32::from(from_size.column_span)).max(0);
        dr = (i32::from(to_size.row_span) - i32::from(from_size.row_span)).max(0);
    }
    if dc == 0 && dr == 0 {
        return (0, 1);
    }
    if dc.abs() >= dr.abs() {
        (dc, 0)
    } else {
        (0, dr)
    }
}

/// Stateless reflow planner for one grid configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflowEngine {
    mode: ReflowMode,
    coords: GridCoordinateSystem,
}

impl ReflowEngine {
    #[must_use]
    pub const fn new(mode: ReflowMode, grid: GridConfig) -> Self {
        Self {
            mode,
            coords: GridCoordinateSystem::new(grid),
        }
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> ReflowMode {
        self.mode
    }

    /// Plan a move that keeps the anchor's size.
    pub fn plan_move(
        &self,
        anchor: &BlockId,
        target: GridPosition,
        blocks: &[Block],
    ) -> Result<ReflowPlan, ReflowError> {
        let size = blocks
            .iter()
            .find(|block| &block.id == anchor)
            .map(|block| block.grid_size)
            .ok_or_else(|| ReflowError::UnknownAnchor {
                anchor: anchor.clone(),
            })?;
        self.plan(anchor, target, size, blocks)
    }

    /// Plan the relocations needed to put `anchor` at `target` with
    /// `target_size`.
    pub fn plan(
        &self,
        anchor: &BlockId,
        target: GridPosition,
        target_size: GridSize,
        blocks: &[Block],
    ) -> Result<ReflowPlan, ReflowError> {
        let anchor_block = blocks
            .iter()
            .find(|block| &block.id == anchor)
            .ok_or_else(|| ReflowError::UnknownAnchor {
                anchor: anchor.clone(),
            })?;
        if !self.coords.is_valid_position(target, target_size) {
            return Err(ReflowError::OutOfBounds {
                anchor: anchor.clone(),
                position: target,
                size: target_size,
            });
        }
        if !anchor_block.movable && !anchor_block.grid_position.same_cell(target) {
            return Err(ReflowError::Immovable {
                block_id: anchor.clone(),
            });
        }

        let mut work = SpatialIndex::from_blocks(blocks);
        work.update_block(anchor, target, target_size);

        let vector = displacement(
            anchor_block.grid_position,
            anchor_block.grid_size,
            target,
            target_size,
        );

        let relocations = match self.mode {
            ReflowMode::None => {
                if let Some(blocker) = work
                    .find_collisions_excluding(target, target_size, |id| id == anchor)
                    .into_iter()
                    .next()
                {
                    return Err(ReflowError::Blocked { blocker });
                }
                Vec::new()
            }
            ReflowMode::PushAway | ReflowMode::SmartFill => {
                self.cascade(anchor, target, target_size, vector, blocks, &mut work)?
            }
            ReflowMode::AxisShift => self.axis_shift(
                anchor_block,
                target,
                target_size,
                vector,
                blocks,
                &mut work,
            )?,
        };

        Ok(ReflowPlan {
            anchor: anchor.clone(),
            anchor_to: target,
            anchor_size: target_size,
            relocations,
        })
    }

    fn cascade(
        &self,
        anchor: &BlockId,
        target: GridPosition,
        target_size: GridSize,
        (dc, dr): (i32, i32),
        blocks: &[Block],
        work: &mut SpatialIndex,
    ) -> Result<Vec<Relocation>, ReflowError> {
        let by_id: FxHashMap<&BlockId, &Block> =
            blocks.iter().map(|block| (&block.id, block)).collect();
        let mut settled: FxHashSet<BlockId> = FxHashSet::default();
        settled.insert(anchor.clone());
        let mut relocations = Vec::new();
        let mut queue: VecDeque<BlockId> = work
            .find_collisions_excluding(target, target_size, |id| id == anchor)
            .into();

        while let Some(id) = queue.pop_front() {
            if settled.contains(&id) {
                continue;
            }
            let Some(block) = by_id.get(&id).copied() else {
                continue;
            };
            if !block.movable {
                return Err(ReflowError::Immovable { block_id: id });
            }
            let from = block.grid_position;
            let size = block.grid_size;
            let pushed = self.coords.clamp_position(from.shifted(dc, dr), size);
            let hits = work.find_collisions_excluding(pushed, size, |other| other == &id);
            let hits_settled = hits.iter().any(|other| settled.contains(other));

            let to = match self.mode {
                ReflowMode::SmartFill if !hits.is_empty() => {
                    let found = self
                        .coords
                        .first_fit(size, ScanOrder::RowMajor, 1, |candidate| {
                            !work.has_collision_fast(candidate, size, Some(&id))
                        })
                        .ok_or_else(|| ReflowError::NoRoom {
                            block_id: id.clone(),
                        })?;
                    found.with_z_index(from.z_index)
                }
                _ if hits_settled => {
                    return Err(ReflowError::NoRoom { block_id: id });
                }
                _ => {
                    queue.extend(hits.into_iter().filter(|other| !settled.contains(other)));
                    pushed
                }
            };

            work.update_block(&id, to, size);
            settled.insert(id.clone());
            relocations.push(Relocation {
                block_id: id,
                from,
                to,
            });
        }

        Ok(relocations)
    }

    fn axis_shift(
        &self,
        anchor: &Block,
        target: GridPosition,
        target_size: GridSize,
        (dc, dr): (i32, i32),
        blocks: &[Block],
        work: &mut SpatialIndex,
    ) -> Result<Vec<Relocation>, ReflowError> {
        let origin = anchor.footprint();
        let landing = Footprint::of(target, target_size);
        let horizontal = dc != 0;

        let in_lane_far_side = |footprint: &Footprint| {
            if horizontal {
                footprint.rows_overlap(&landing)
                    && if dc > 0 {
                        footprint.column_start > origin.column_start
                    } else {
                        footprint.column_end < origin.column_end
                    }
            } else {
                footprint.columns_overlap(&landing)
                    && if dr > 0 {
                        footprint.row_start > origin.row_start
                    } else {
                        footprint.row_end < origin.row_end
                    }
            }
        };

        let mut relocations = Vec::new();
        for block in blocks.iter().filter(|block| block.id != anchor.id) {
            let footprint = block.footprint();
            if !footprint.overlaps(&landing) {
                continue;
            }
            if !in_lane_far_side(&footprint) {
                return Err(ReflowError::Blocked {
                    blocker: block.id.clone(),
                });
            }
            if !block.movable {
                return Err(ReflowError::Immovable {
                    block_id: block.id.clone(),
                });
            }
            let to = self
                .coords
                .clamp_position(block.grid_position.shifted(dc, dr), block.grid_size);
            work.update_block(&block.id, to, block.grid_size);
            relocations.push(Relocation {
                block_id: block.id.clone(),
                from: block.grid_position,
                to,
            });
        }

        let sizes: FxHashMap<&BlockId, GridSize> = blocks
            .iter()
            .map(|block| (&block.id, block.grid_size))
            .collect();
        for relocation in &relocations {
            let size = sizes
                .get(&relocation.block_id)
                .copied()
                .unwrap_or_default();
            if work.has_collision_fast(relocation.to, size, Some(&relocation.block_id)) {
                return Err(ReflowError::NoRoom {
                    block_id: relocation.block_id.clone(),
                });
            }
        }
        Ok(relocations)
    }
}

/// Apply a plan to a block list in place. Unknown ids are ignored.
pub fn apply_plan(plan: &ReflowPlan, blocks: &mut [Block]) {
    let targets: FxHashMap<&BlockId, GridPosition> = plan
        .relocations
        .iter()
        .map(|relocation| (&relocation.block_id, relocation.to))
        .collect();
    for block in blocks.iter_mut() {
        if block.id == plan.anchor {
            block.grid_position = plan.anchor_to;
            block.grid_size = plan.anchor_size;
        } else if let Some(to) = targets.get(&block.id) {
            block.grid_position = *to;
        }
    }
}
