#![forbid(unsafe_code)]

//! Transactions: plan a batch of position/size changes, then commit them.
//!
//! Planning is pure: [`plan_changes`] validates a whole change set against a
//! board snapshot and returns either a [`TransactionPlan`] or a
//! [`PlanRejection`]. Committing (see `Board::commit`) applies every planned
//! move to the block list and spatial index, optionally animating the result
//! with a FLIP transition.
//!
//! # Invariants
//!
//! 1. Changes whose target equals the current footprint are dropped, so a
//!    no-op transaction commits nothing, emits nothing, and records no
//!    history.
//! 2. A plan is tied to the board revision it was built against; committing
//!    a plan after any other mutation fails with `StalePlan`.
//! 3. Moves apply in planned order.

use std::fmt;

use blockgrid_layout::{
    Block, BlockId, GridConfig, GridCoordinateSystem, GridPosition, GridSize, SpatialIndex,
};
use rustc_hash::FxHashSet;

use crate::validation::{
    Placement, PlacementRule, PlacementValidator, ValidationIssue, ValidationReport,
};

/// One requested change. `None` keeps the current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedChange {
    pub block_id: BlockId,
    pub position: Option<GridPosition>,
    pub size: Option<GridSize>,
}

impl ProposedChange {
    #[must_use]
    pub fn move_to(block_id: impl Into<BlockId>, position: GridPosition) -> Self {
        Self {
            block_id: block_id.into(),
            position: Some(position),
            size: None,
        }
    }

    #[must_use]
    pub fn resize_to(block_id: impl Into<BlockId>, size: GridSize) -> Self {
        Self {
            block_id: block_id.into(),
            position: None,
            size: Some(size),
        }
    }

    #[must_use]
    pub fn place(block_id: impl Into<BlockId>, position: GridPosition, size: GridSize) -> Self {
        Self {
            block_id: block_id.into(),
            position: Some(position),
            size: Some(size),
        }
    }
}

/// A validated change with both endpoints resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    pub block_id: BlockId,
    pub from_position: GridPosition,
    pub from_size: GridSize,
    pub to_position: GridPosition,
    pub to_size: GridSize,
}

impl PlannedChange {
    #[inline]
    pub fn moves(&self) -> bool {
        !self.from_position.same_cell(self.to_position)
            || self.from_position.z_index != self.to_position.z_index
    }

    #[inline]
    pub fn resizes(&self) -> bool {
        self.from_size != self.to_size
    }
}

/// How a commit is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VisualMode {
    /// First-Last-Invert-Play transition from the old boxes to the new ones.
    #[default]
    Flip,
    /// Apply instantly.
    None,
}

/// Validated, ready-to-commit change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPlan {
    pub(crate) changes: Vec<PlannedChange>,
    pub(crate) grow_rows_to: Option<u16>,
    pub(crate) revision: u64,
    pub(crate) warnings: Vec<String>,
}

impl TransactionPlan {
    /// Planned changes in application order.
    #[inline]
    pub fn changes(&self) -> &[PlannedChange] {
        &self.changes
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.grow_rows_to.is_none()
    }

    /// Row count the grid grows to on commit, when auto-grow applies.
    #[inline]
    pub const fn grow_rows_to(&self) -> Option<u16> {
        self.grow_rows_to
    }

    #[inline]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Non-blocking findings from placement rules.
    #[inline]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Why a change set could not be planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanRejection {
    UnknownBlock { block_id: BlockId },
    /// The same block appears twice in one change set.
    DuplicateChange { block_id: BlockId },
    Invalid(ValidationReport),
}

impl fmt::Display for PlanRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBlock { block_id } => write!(f, "block '{block_id}' not found"),
            Self::DuplicateChange { block_id } => {
                write!(f, "block '{block_id}' appears more than once")
            }
            Self::Invalid(report) => write!(f, "{report}"),
        }
    }
}

impl std::error::Error for PlanRejection {}

/// Outcome of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitSummary {
    pub moved: usize,
    pub resized: usize,
    /// Board revision after the commit.
    pub revision: u64,
    pub animated: bool,
}

/// Board snapshot the planner validates against.
pub(crate) struct PlanContext<'a> {
    pub blocks: &'a [Block],
    pub index: &'a SpatialIndex,
    pub grid: &'a GridConfig,
    pub allow_overlap: bool,
    pub auto_grow_rows: bool,
    pub rules: &'a [Box<dyn PlacementRule>],
    pub revision: u64,
}

impl PlanContext<'_> {
    /// Coordinates for bounds checks; auto-grow lifts the row limit.
    pub fn bounds(&self) -> GridCoordinateSystem {
        let mut grid = *self.grid;
        if self.auto_grow_rows {
            grid.rows = None;
        }
        GridCoordinateSystem::new(grid)
    }

    pub fn validator(&self) -> PlacementValidator<'_> {
        PlacementValidator {
            bounds: self.bounds(),
            grid: self.grid,
            index: self.index,
            blocks: self.blocks,
            allow_overlap: self.allow_overlap,
            rules: self.rules,
        }
    }

    /// Row count needed to hold `footprints`, if it exceeds the current limit.
    pub fn rows_needed(
        &self,
        footprints: impl IntoIterator<Item = (GridPosition, GridSize)>,
    ) -> Option<u16> {
        if !self.auto_grow_rows {
            return None;
        }
        let limit = self.grid.rows?;
        let needed = footprints
            .into_iter()
            .map(|(position, size)| position.row.saturating_add(size.row_span.max(1) - 1))
            .max()?;
        (needed > limit).then_some(needed)
    }
}

/// Validate a change set as a unit.
pub(crate) fn plan_changes(
    context: &PlanContext<'_>,
    changes: &[ProposedChange],
) -> Result<TransactionPlan, PlanRejection> {
    let mut seen: FxHashSet<&BlockId> = FxHashSet::default();
    let mut planned: Vec<(PlannedChange, &Block)> = Vec::with_capacity(changes.len());
    let mut report = ValidationReport::ok();

    for change in changes {
        if !seen.insert(&change.block_id) {
            return Err(PlanRejection::DuplicateChange {
                block_id: change.block_id.clone(),
            });
        }
        let block = context
            .blocks
            .iter()
            .find(|block| block.id == change.block_id)
            .ok_or_else(|| PlanRejection::UnknownBlock {
                block_id: change.block_id.clone(),
            })?;
        let planned_change = PlannedChange {
            block_id: block.id.clone(),
            from_position: block.grid_position,
            from_size: block.grid_size,
            to_position: change.position.unwrap_or(block.grid_position),
            to_size: change.size.unwrap_or(block.grid_size),
        };
        if !planned_change.moves() && !planned_change.resizes() {
            continue;
        }
        if planned_change.moves()
            && !planned_change.from_position.same_cell(planned_change.to_position)
            && !block.movable
        {
            report.push_error(ValidationIssue::Immovable {
                block_id: block.id.clone(),
            });
        }
        if planned_change.resizes() && !block.resizable {
            report.push_error(ValidationIssue::NotResizable {
                block_id: block.id.clone(),
            });
        }
        planned.push((planned_change, block));
    }

    let placements: Vec<Placement<'_>> = planned
        .iter()
        .map(|(change, block)| Placement {
            block_id: Some(&change.block_id),
            block_type: &block.block_type,
            position: change.to_position,
            size: change.to_size,
        })
        .collect();
    if !placements.is_empty() {
        report.merge(context.validator().validate(&placements));
    }

    if !report.valid {
        return Err(PlanRejection::Invalid(report));
    }

    let grow_rows_to = context.rows_needed(
        planned
            .iter()
            .map(|(change, _)| (change.to_position, change.to_size)),
    );

    Ok(TransactionPlan {
        changes: planned.into_iter().map(|(change, _)| change).collect(),
        grow_rows_to,
        revision: context.revision,
        warnings: report.warnings,
    })
}
