#![forbid(unsafe_code)]

//! The board: block set, spatial index, and every structural operation.
//!
//! All mutation funnels through one internal primitive that applies a
//! [`BoardCommand`], keeps the block list, the [`SpatialIndex`], and the
//! visual surface in step, emits the matching [`BoardEvent`], and returns the
//! inverse command. Public operations group those commands into a
//! [`HistoryEntry`] so each one undoes as a unit.
//!
//! # Invariants
//!
//! 1. For every block, the spatial index holds exactly the block's current
//!    footprint.
//! 2. Without `allow_overlap`, no two blocks overlap after any public
//!    operation returns.
//! 3. A failed operation leaves blocks, index, and history as they were.
//! 4. `revision` increases on every applied command, on import, and on grid
//!    changes; plans built at an older revision are rejected.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut board = Board::new(BoardConfig::default())?;
//! board.set_container(ContainerBox::from_size(808.0, 600.0));
//! let a = board.add_block(BlockSpec::new("box").sized(GridSize::new(3, 2)))?;
//! board.move_block(&a, GridPosition::new(4, 1))?;
//! board.undo()?;
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};

use blockgrid_core::geometry::{ContainerBox, PixelRect};
use blockgrid_layout::{
    ArrangeStrategy, Block, BlockId, GridConfig, GridCoordinateSystem, GridPosition, GridSize,
    ReflowEngine, ReflowMode, ScanOrder, SizeConstraints, SpatialIndex,
};
use serde_json::Value;
use tracing::{debug, debug_span, trace, warn};
use web_time::{Duration, Instant};

use crate::batch::{BatchOperation, BatchOutcome, BatchStrategy, MemberResult};
use crate::config::BoardConfig;
use crate::document::BoardDocument;
use crate::error::{BoardError, panic_message};
use crate::events::{BoardEvent, EventBus, Subscription};
use crate::flip::{FlipAnimator, LayoutSurface, VisualSurface, VisualTransform};
use crate::history::{BoardCommand, BoardHistory, HistoryEntry, HistoryError};
use crate::registry::BlockTypeRegistry;
use crate::selection::SelectionSet;
use crate::transaction::{
    CommitSummary, PlanContext, ProposedChange, TransactionPlan, VisualMode, plan_changes,
};
use crate::validation::{Placement, PlacementRule, ValidationIssue, ValidationReport};

/// Input for adding a block. Unset fields come from the type registry or
/// from first-fit placement.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSpec {
    pub id: Option<BlockId>,
    pub block_type: String,
    pub position: Option<GridPosition>,
    pub size: Option<GridSize>,
    pub movable: bool,
    pub resizable: bool,
    pub constraints: SizeConstraints,
    pub attributes: Option<Value>,
}

impl BlockSpec {
    #[must_use]
    pub fn new(block_type: impl Into<String>) -> Self {
        Self {
            id: None,
            block_type: block_type.into(),
            position: None,
            size: None,
            movable: true,
            resizable: true,
            constraints: SizeConstraints::default(),
            attributes: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<BlockId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn at(mut self, position: GridPosition) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn sized(mut self, size: GridSize) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn with_movable(mut self, movable: bool) -> Self {
        self.movable = movable;
        self
    }

    #[must_use]
    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    #[must_use]
    pub fn with_constraints(mut self, constraints: SizeConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

/// Non-geometric block changes. `None` leaves a field alone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockUpdate {
    pub attributes: Option<Value>,
    pub movable: Option<bool>,
    pub resizable: Option<bool>,
}

impl BlockUpdate {
    #[must_use]
    pub fn attributes(attributes: Value) -> Self {
        Self {
            attributes: Some(attributes),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_movable(mut self, movable: bool) -> Self {
        self.movable = Some(movable);
        self
    }

    #[must_use]
    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = Some(resizable);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_none() && self.movable.is_none() && self.resizable.is_none()
    }
}

/// Block layout engine state for one board.
pub struct Board<S: VisualSurface = LayoutSurface> {
    config: BoardConfig,
    blocks: Vec<Block>,
    index: SpatialIndex,
    selection: SelectionSet,
    history: BoardHistory,
    events: EventBus,
    registry: BlockTypeRegistry,
    rules: Vec<Box<dyn PlacementRule>>,
    surface: S,
    animator: FlipAnimator,
    container: ContainerBox,
    edit_mode: Option<BlockId>,
    revision: u64,
    next_id: u64,
}

impl<S: VisualSurface> std::fmt::Debug for Board<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("blocks", &self.blocks.len())
            .field("selection", &self.selection)
            .field("revision", &self.revision)
            .field("edit_mode", &self.edit_mode)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl Board<LayoutSurface> {
    /// Board backed by the in-memory [`LayoutSurface`].
    pub fn new(config: BoardConfig) -> Result<Self, BoardError> {
        Self::with_surface(config, LayoutSurface::new())
    }
}

impl<S: VisualSurface> Board<S> {
    pub fn with_surface(config: BoardConfig, surface: S) -> Result<Self, BoardError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(BoardError::InvalidConfig(errors));
        }
        Ok(Self {
            history: BoardHistory::new(config.history_limit),
            animator: FlipAnimator::new(Duration::from_millis(config.arrange_animation_ms)),
            config,
            blocks: Vec::new(),
            index: SpatialIndex::new(),
            selection: SelectionSet::new(),
            events: EventBus::new(),
            registry: BlockTypeRegistry::new(),
            rules: Vec::new(),
            surface,
            container: ContainerBox::default(),
            edit_mode: None,
            revision: 0,
            next_id: 0,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline]
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|block| &block.id == id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[inline]
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    #[inline]
    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    #[inline]
    pub fn history(&self) -> &BoardHistory {
        &self.history
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[inline]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    #[inline]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    pub fn edit_mode(&self) -> Option<&BlockId> {
        self.edit_mode.as_ref()
    }

    #[inline]
    pub const fn container(&self) -> &ContainerBox {
        &self.container
    }

    #[inline]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    #[inline]
    pub fn animator(&self) -> &FlipAnimator {
        &self.animator
    }

    #[inline]
    pub fn registry(&self) -> &BlockTypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BlockTypeRegistry {
        &mut self.registry
    }

    /// Coordinates for the current grid.
    #[inline]
    pub fn coords(&self) -> GridCoordinateSystem {
        GridCoordinateSystem::new(self.config.grid)
    }

    /// Layout box of a block in viewport pixels.
    pub fn block_rect(&self, id: &BlockId) -> Option<PixelRect> {
        self.block(id)
            .map(|block| self.layout_rect(block.grid_position, block.grid_size))
    }

    fn layout_rect(&self, position: GridPosition, size: GridSize) -> PixelRect {
        self.coords().block_rect(position, size, &self.container)
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Register a placement rule consulted by every validation.
    pub fn add_rule(&mut self, rule: impl PlacementRule + 'static) {
        self.rules.push(Box::new(rule));
    }

    /// Subscribe to board events.
    pub fn subscribe(&mut self, callback: impl Fn(&BoardEvent) + 'static) -> Subscription {
        self.events.subscribe(callback)
    }

    /// Update the measured container and re-place every block.
    pub fn set_container(&mut self, container: ContainerBox) {
        self.container = container;
        self.place_all();
    }

    /// Replace the grid. Every block must still fit.
    ///
    /// A grid change is a history boundary: entries recorded against the old
    /// geometry are dropped, as on import.
    pub fn set_grid_config(&mut self, grid: GridConfig) -> Result<(), BoardError> {
        grid.validate()?;
        let coords = GridCoordinateSystem::new(grid);
        let mut report = ValidationReport::ok();
        for block in &self.blocks {
            if !coords.is_valid_position(block.grid_position, block.grid_size) {
                report.push_error(ValidationIssue::OutOfBounds {
                    block_id: Some(block.id.clone()),
                    position: block.grid_position,
                    size: block.grid_size,
                });
            }
        }
        if !report.valid {
            return Err(BoardError::InvalidPlacement(report));
        }
        if grid == self.config.grid {
            return Ok(());
        }
        self.config.grid = grid;
        self.revision += 1;
        self.place_all();
        if !self.history.is_empty() {
            self.history.clear();
            self.emit_history_changed();
        }
        Ok(())
    }

    /// Replace the whole configuration.
    pub fn set_config(&mut self, config: BoardConfig) -> Result<(), BoardError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(BoardError::InvalidConfig(errors));
        }
        if config.grid != self.config.grid {
            self.set_grid_config(config.grid)?;
        }
        self.history.set_limit(config.history_limit);
        self.animator
            .set_duration(Duration::from_millis(config.arrange_animation_ms));
        self.config = config;
        Ok(())
    }

    pub fn set_drag_reflow(&mut self, mode: ReflowMode) {
        self.config.drag_reflow = mode;
    }

    fn place_all(&mut self) {
        let coords = self.coords();
        for block in &self.blocks {
            let rect = coords.block_rect(block.grid_position, block.grid_size, &self.container);
            self.surface.place(&block.id, rect);
        }
    }

    // ------------------------------------------------------------------
    // Command core
    // ------------------------------------------------------------------

    fn position_of(&self, id: &BlockId) -> Result<usize, BoardError> {
        self.blocks
            .iter()
            .position(|block| &block.id == id)
            .ok_or_else(|| BoardError::UnknownBlock(id.clone()))
    }

    /// Apply one command and return its inverse.
    fn apply_command(&mut self, command: BoardCommand) -> Result<BoardCommand, BoardError> {
        let inverse = match command {
            BoardCommand::Insert { block, index } => {
                if self.index.contains(&block.id) {
                    return Err(BoardError::DuplicateId(block.id));
                }
                let id = block.id.clone();
                self.index
                    .add_block(&id, block.grid_position, block.grid_size);
                let rect = self.layout_rect(block.grid_position, block.grid_size);
                self.surface.place(&id, rect);
                let at = index.min(self.blocks.len());
                self.blocks.insert(at, block.clone());
                self.events.emit(&BoardEvent::BlockAdded { block });
                BoardCommand::Remove { block_id: id }
            }
            BoardCommand::Remove { block_id } => {
                let at = self.position_of(&block_id)?;
                let block = self.blocks.remove(at);
                self.index.remove_block(&block_id);
                self.animator.forget(&block_id);
                self.surface.remove(&block_id);
                if self.edit_mode.as_ref() == Some(&block_id) {
                    self.edit_mode = None;
                    self.events.emit(&BoardEvent::EditModeExited {
                        block_id: block_id.clone(),
                    });
                }
                self.events.emit(&BoardEvent::BlockRemoved {
                    block: block.clone(),
                });
                BoardCommand::Insert { block, index: at }
            }
            BoardCommand::Place {
                block_id,
                position,
                size,
            } => {
                let at = self.position_of(&block_id)?;
                let (from, from_size) = {
                    let block = &mut self.blocks[at];
                    let previous = (block.grid_position, block.grid_size);
                    block.grid_position = position;
                    block.grid_size = size;
                    previous
                };
                self.index.update_block(&block_id, position, size);
                let rect = self.layout_rect(position, size);
                self.surface.place(&block_id, rect);
                if from != position {
                    self.events.emit(&BoardEvent::BlockMoved {
                        block_id: block_id.clone(),
                        from,
                        to: position,
                    });
                }
                if from_size != size {
                    self.events.emit(&BoardEvent::BlockResized {
                        block_id: block_id.clone(),
                        from: from_size,
                        to: size,
                    });
                }
                BoardCommand::Place {
                    block_id,
                    position: from,
                    size: from_size,
                }
            }
            BoardCommand::SetAttributes {
                block_id,
                attributes,
            } => {
                let at = self.position_of(&block_id)?;
                let previous = std::mem::replace(&mut self.blocks[at].attributes, attributes);
                self.events.emit(&BoardEvent::BlockUpdated {
                    block_id: block_id.clone(),
                });
                BoardCommand::SetAttributes {
                    block_id,
                    attributes: previous,
                }
            }
            BoardCommand::SetFlags {
                block_id,
                movable,
                resizable,
            } => {
                let at = self.position_of(&block_id)?;
                let block = &mut self.blocks[at];
                let previous = (block.movable, block.resizable);
                block.movable = movable;
                block.resizable = resizable;
                self.events.emit(&BoardEvent::BlockUpdated {
                    block_id: block_id.clone(),
                });
                BoardCommand::SetFlags {
                    block_id,
                    movable: previous.0,
                    resizable: previous.1,
                }
            }
            BoardCommand::SetRows { rows } => {
                let previous = std::mem::replace(&mut self.config.grid.rows, rows);
                BoardCommand::SetRows { rows: previous }
            }
        };
        self.revision += 1;
        Ok(inverse)
    }

    fn record(&mut self, entry: &mut HistoryEntry, command: BoardCommand) -> Result<(), BoardError> {
        let inverse = self.apply_command(command.clone())?;
        entry.record(command, inverse);
        Ok(())
    }

    /// Undo recorded commands until `mark` remain.
    fn unwind_to(&mut self, entry: &mut HistoryEntry, mark: usize) {
        while entry.inverse.len() > mark {
            let (Some(inverse), Some(_)) = (entry.inverse.pop(), entry.forward.pop()) else {
                break;
            };
            if let Err(err) = self.apply_command(inverse) {
                warn!(target: "blockgrid.board", label = %entry.label, %err, "rollback step failed");
            }
        }
    }

    fn finish(&mut self, entry: HistoryEntry) {
        if entry.is_empty() {
            return;
        }
        self.history.push(entry);
        self.emit_history_changed();
    }

    fn emit_history_changed(&mut self) {
        self.events.emit(&BoardEvent::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        });
    }

    fn emit_selection_changed(&mut self) {
        self.events.emit(&BoardEvent::SelectionChanged {
            selected: self.selection.ids().to_vec(),
            primary: self.selection.primary().cloned(),
        });
    }

    pub(crate) fn emit(&mut self, event: BoardEvent) {
        self.events.emit(&event);
    }

    fn prune_selection(&mut self) {
        let index = &self.index;
        if self.selection.retain(|id| index.contains(id)) {
            self.emit_selection_changed();
        }
    }

    // ------------------------------------------------------------------
    // FLIP plumbing
    // ------------------------------------------------------------------

    /// Capture displayed boxes before a change.
    fn capture_first<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a BlockId>,
        visual: VisualMode,
    ) -> Vec<(BlockId, Option<PixelRect>)> {
        ids.into_iter()
            .map(|id| {
                let first = match visual {
                    VisualMode::Flip => self.surface.measure(id),
                    VisualMode::None => None,
                };
                (id.clone(), first)
            })
            .collect()
    }

    /// Play captured boxes toward the new layout, or snap when absent.
    fn play(&mut self, firsts: Vec<(BlockId, Option<PixelRect>)>) {
        let now = Instant::now();
        for (id, first) in firsts {
            let Some(last) = self.block_rect(&id) else {
                continue;
            };
            let from = first.map_or(VisualTransform::IDENTITY, |first| {
                VisualTransform::invert(&first, &last)
            });
            self.animator.start(&id, from, now, &mut self.surface);
        }
    }

    /// Advance running transitions; returns how many are still active.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.animator.tick(now, &mut self.surface)
    }

    /// Show a non-committed drag offset on a block.
    pub fn show_preview_offset(&mut self, id: &BlockId, dx: f64, dy: f64) {
        self.animator.forget(id);
        self.surface
            .set_transform(id, VisualTransform::translate(dx, dy));
    }

    /// Show a block's layout box stretched onto a candidate box.
    pub fn show_preview_rect(&mut self, id: &BlockId, candidate: PixelRect) {
        let Some(layout) = self.block_rect(id) else {
            return;
        };
        self.animator.forget(id);
        self.surface
            .set_transform(id, VisualTransform::invert(&candidate, &layout));
    }

    /// Animate blocks from their preview transforms back to their layout.
    pub fn animate_back(&mut self, ids: &[BlockId]) {
        let now = Instant::now();
        for id in ids {
            let from = self.surface.transform(id);
            self.animator.start(id, from, now, &mut self.surface);
        }
    }

    // ------------------------------------------------------------------
    // Validation & planning
    // ------------------------------------------------------------------

    fn plan_context(&self) -> PlanContext<'_> {
        PlanContext {
            blocks: &self.blocks,
            index: &self.index,
            grid: &self.config.grid,
            allow_overlap: self.config.allow_overlap,
            auto_grow_rows: self.config.auto_grow_rows,
            rules: &self.rules,
            revision: self.revision,
        }
    }

    /// Grid used for placement checks: the configured grid, with the row
    /// limit lifted when `auto_grow_rows` is on.
    pub fn placement_bounds(&self) -> GridCoordinateSystem {
        self.plan_context().bounds()
    }

    /// Check a footprint against bounds, collisions, and rules.
    ///
    /// `block_id` is the block being placed, if it already exists; its
    /// current cells are ignored.
    pub fn validate_placement(
        &self,
        block_type: &str,
        position: GridPosition,
        size: GridSize,
        block_id: Option<&BlockId>,
    ) -> ValidationReport {
        self.plan_context().validator().validate(&[Placement {
            block_id,
            block_type,
            position,
            size,
        }])
    }

    /// Validate a change set as a unit. Pure.
    pub fn plan(&self, changes: &[ProposedChange]) -> Result<TransactionPlan, BoardError> {
        plan_changes(&self.plan_context(), changes).map_err(BoardError::from)
    }

    /// Apply a plan built against the current revision.
    pub fn commit(
        &mut self,
        plan: TransactionPlan,
        visual: VisualMode,
    ) -> Result<CommitSummary, BoardError> {
        self.commit_labeled(plan, visual, "commit")
    }

    pub(crate) fn commit_labeled(
        &mut self,
        plan: TransactionPlan,
        visual: VisualMode,
        label: &str,
    ) -> Result<CommitSummary, BoardError> {
        if plan.revision() != self.revision {
            return Err(BoardError::StalePlan {
                planned: plan.revision(),
                current: self.revision,
            });
        }
        let _span = debug_span!(
            target: "blockgrid.transaction",
            "commit",
            label,
            changes = plan.changes().len()
        )
        .entered();
        if plan.is_empty() {
            return Ok(CommitSummary {
                revision: self.revision,
                ..CommitSummary::default()
            });
        }

        let firsts = self.capture_first(plan.changes().iter().map(|c| &c.block_id), visual);
        let mut entry = HistoryEntry::new(label);
        if let Err(err) = self.apply_plan(&mut entry, &plan) {
            self.unwind_to(&mut entry, 0);
            return Err(err);
        }
        self.play(firsts);
        self.finish(entry);

        let summary = CommitSummary {
            moved: plan.changes().iter().filter(|c| c.moves()).count(),
            resized: plan.changes().iter().filter(|c| c.resizes()).count(),
            revision: self.revision,
            animated: visual == VisualMode::Flip && !self.animator.duration().is_zero(),
        };
        debug!(
            target: "blockgrid.transaction",
            moved = summary.moved,
            resized = summary.resized,
            revision = summary.revision,
            "committed"
        );
        Ok(summary)
    }

    fn apply_plan(&mut self, entry: &mut HistoryEntry, plan: &TransactionPlan) -> Result<(), BoardError> {
        if let Some(rows) = plan.grow_rows_to() {
            self.record(entry, BoardCommand::SetRows { rows: Some(rows) })?;
        }
        for change in plan.changes() {
            self.record(
                entry,
                BoardCommand::Place {
                    block_id: change.block_id.clone(),
                    position: change.to_position,
                    size: change.to_size,
                },
            )?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Add / remove / update
    // ------------------------------------------------------------------

    fn generate_id(&mut self) -> BlockId {
        loop {
            self.next_id += 1;
            let id = BlockId::new(format!("block-{}", self.next_id));
            if !self.index.contains(&id) {
                return id;
            }
        }
    }

    /// Add a block; returns its id.
    ///
    /// Without an explicit position the block lands on the first free anchor
    /// in reading order.
    pub fn add_block(&mut self, spec: BlockSpec) -> Result<BlockId, BoardError> {
        let mut entry = HistoryEntry::new("add");
        let id = self.add_into(&mut entry, spec)?;
        if self.config.auto_arrange {
            self.auto_arrange_into(&mut entry);
        }
        self.finish(entry);
        Ok(id)
    }

    fn add_into(&mut self, entry: &mut HistoryEntry, spec: BlockSpec) -> Result<BlockId, BoardError> {
        if !self.registry.accepts(&spec.block_type) {
            return Err(BoardError::UnknownBlockType(spec.block_type));
        }
        if let Some(id) = &spec.id {
            if self.index.contains(id) {
                return Err(BoardError::DuplicateId(id.clone()));
            }
        }
        let size = spec
            .size
            .unwrap_or_else(|| self.registry.default_size(&spec.block_type));
        let position = match spec.position {
            Some(position) => position,
            None => {
                let index = &self.index;
                self.plan_context()
                    .bounds()
                    .first_fit(size, ScanOrder::RowMajor, 1, |candidate| {
                        !index.has_collision_fast(candidate, size, None)
                    })
                    .unwrap_or(GridPosition::ORIGIN)
            }
        };
        let report = self.validate_placement(&spec.block_type, position, size, None);
        if !report.valid {
            return Err(BoardError::InvalidPlacement(report));
        }

        let id = match spec.id {
            Some(id) => id,
            None => self.generate_id(),
        };
        let attributes = spec
            .attributes
            .unwrap_or_else(|| self.registry.default_attributes(&spec.block_type));
        let block = Block {
            id: id.clone(),
            block_type: spec.block_type,
            grid_position: position,
            grid_size: size,
            movable: spec.movable,
            resizable: spec.resizable,
            constraints: spec.constraints,
            attributes,
        };

        let mark = entry.inverse.len();
        let grow = self.plan_context().rows_needed([(position, size)]);
        let mut result = Ok(());
        if let Some(rows) = grow {
            result = self.record(entry, BoardCommand::SetRows { rows: Some(rows) });
        }
        if result.is_ok() {
            let index = self.blocks.len();
            result = self.record(entry, BoardCommand::Insert { block, index });
        }
        if let Err(err) = result {
            self.unwind_to(entry, mark);
            return Err(err);
        }
        debug!(target: "blockgrid.board", block = %id, column = position.column, row = position.row, "added");
        Ok(id)
    }

    /// Remove a block; returns it.
    pub fn remove_block(&mut self, id: &BlockId) -> Result<Block, BoardError> {
        let mut removed = self.remove_blocks_labeled(std::slice::from_ref(id), "remove")?;
        removed
            .pop()
            .ok_or_else(|| BoardError::UnknownBlock(id.clone()))
    }

    /// Remove several blocks as one history entry. Every id must exist.
    pub fn remove_blocks(&mut self, ids: &[BlockId]) -> Result<Vec<Block>, BoardError> {
        self.remove_blocks_labeled(ids, "remove")
    }

    pub(crate) fn remove_blocks_labeled(
        &mut self,
        ids: &[BlockId],
        label: &str,
    ) -> Result<Vec<Block>, BoardError> {
        if let Some(missing) = ids.iter().find(|id| !self.index.contains(id)) {
            return Err(BoardError::UnknownBlock(missing.clone()));
        }
        let mut entry = HistoryEntry::new(label);
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(block) = self.remove_into(&mut entry, id)? {
                removed.push(block);
            }
        }
        self.prune_selection();
        if self.config.auto_arrange && !removed.is_empty() {
            self.auto_arrange_into(&mut entry);
        }
        self.finish(entry);
        Ok(removed)
    }

    fn remove_into(
        &mut self,
        entry: &mut HistoryEntry,
        id: &BlockId,
    ) -> Result<Option<Block>, BoardError> {
        if !self.index.contains(id) {
            return Ok(None);
        }
        if self.edit_mode.as_ref() == Some(id) {
            self.exit_edit_mode();
        }
        self.record(
            entry,
            BoardCommand::Remove {
                block_id: id.clone(),
            },
        )?;
        debug!(target: "blockgrid.board", block = %id, "removed");
        Ok(match entry.inverse.last() {
            Some(BoardCommand::Insert { block, .. }) => Some(block.clone()),
            _ => None,
        })
    }

    /// Change attributes or flags.
    pub fn update_block(&mut self, id: &BlockId, update: BlockUpdate) -> Result<(), BoardError> {
        let mut entry = HistoryEntry::new("update");
        if let Err(err) = self.update_into(&mut entry, id, update) {
            self.unwind_to(&mut entry, 0);
            return Err(err);
        }
        self.finish(entry);
        Ok(())
    }

    fn update_into(
        &mut self,
        entry: &mut HistoryEntry,
        id: &BlockId,
        update: BlockUpdate,
    ) -> Result<(), BoardError> {
        let block = self
            .block(id)
            .ok_or_else(|| BoardError::UnknownBlock(id.clone()))?;
        let flags = (
            update.movable.unwrap_or(block.movable),
            update.resizable.unwrap_or(block.resizable),
        );
        let flags_changed = flags != (block.movable, block.resizable);
        if let Some(attributes) = update.attributes {
            self.record(
                entry,
                BoardCommand::SetAttributes {
                    block_id: id.clone(),
                    attributes,
                },
            )?;
        }
        if flags_changed {
            self.record(
                entry,
                BoardCommand::SetFlags {
                    block_id: id.clone(),
                    movable: flags.0,
                    resizable: flags.1,
                },
            )?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Move / resize / reflow
    // ------------------------------------------------------------------

    /// Move a block, animating the change.
    pub fn move_block(
        &mut self,
        id: &BlockId,
        position: GridPosition,
    ) -> Result<CommitSummary, BoardError> {
        let plan = self.plan(&[ProposedChange::move_to(id.clone(), position)])?;
        self.commit_labeled(plan, VisualMode::Flip, "move")
    }

    /// Resize a block within its constraints. Applied without animation.
    pub fn resize_block(&mut self, id: &BlockId, size: GridSize) -> Result<CommitSummary, BoardError> {
        let block = self
            .block(id)
            .ok_or_else(|| BoardError::UnknownBlock(id.clone()))?;
        let size = block.constraints.clamp(size, &self.config.grid);
        let plan = self.plan(&[ProposedChange::resize_to(id.clone(), size)])?;
        self.commit_labeled(plan, VisualMode::None, "resize")
    }

    /// Move a block, relocating neighbours with the configured reflow mode.
    pub fn move_with_reflow(
        &mut self,
        id: &BlockId,
        position: GridPosition,
    ) -> Result<CommitSummary, BoardError> {
        let size = self
            .block(id)
            .map(|block| block.grid_size)
            .ok_or_else(|| BoardError::UnknownBlock(id.clone()))?;
        self.place_with_reflow(id, position, size)
    }

    /// Place a block at a new footprint, relocating neighbours as needed.
    ///
    /// The anchor and every relocation commit as one history entry; if the
    /// relocations cannot be satisfied nothing moves.
    pub fn place_with_reflow(
        &mut self,
        id: &BlockId,
        position: GridPosition,
        size: GridSize,
    ) -> Result<CommitSummary, BoardError> {
        let plan = self.plan_reflow(id, position, size)?;
        let label = if self.reflow_active() { "reflow" } else { "move" };
        self.commit_labeled(plan, VisualMode::Flip, label)
    }

    fn reflow_active(&self) -> bool {
        !self.config.allow_overlap && self.config.drag_reflow != ReflowMode::None
    }

    /// Plan a placement together with the neighbour relocations the
    /// configured reflow mode needs. Pure.
    ///
    /// Without reflow (or with overlap allowed) this is a plain placement
    /// plan.
    pub fn plan_reflow(
        &self,
        id: &BlockId,
        position: GridPosition,
        size: GridSize,
    ) -> Result<TransactionPlan, BoardError> {
        if !self.reflow_active() {
            return self.plan(&[ProposedChange::place(id.clone(), position, size)]);
        }
        let mode = self.config.drag_reflow;
        let grid = *self.placement_bounds().config();
        let reflow = ReflowEngine::new(mode, grid).plan(id, position, size, &self.blocks)?;
        trace!(
            target: "blockgrid.reflow",
            mode = mode.as_str(),
            anchor = %id,
            relocations = reflow.relocations.len(),
            "reflow planned"
        );
        let mut changes = vec![ProposedChange::place(
            reflow.anchor.clone(),
            reflow.anchor_to,
            reflow.anchor_size,
        )];
        changes.extend(reflow.relocations.iter().map(|relocation| {
            ProposedChange::move_to(
                relocation.block_id.clone(),
                relocation.to.with_z_index(relocation.from.z_index),
            )
        }));
        self.plan(&changes)
    }

    // ------------------------------------------------------------------
    // Arrange
    // ------------------------------------------------------------------

    fn arrange_plan(&self, strategy: ArrangeStrategy) -> Result<TransactionPlan, BoardError> {
        let grid = *self.placement_bounds().config();
        let changes: Vec<ProposedChange> = blockgrid_layout::arrange(&self.blocks, &grid, strategy)
            .into_iter()
            .map(|relocation| ProposedChange::move_to(relocation.block_id, relocation.to))
            .collect();
        self.plan(&changes)
    }

    /// Re-pack the whole board with `strategy` as one animated history entry.
    pub fn arrange(&mut self, strategy: ArrangeStrategy) -> Result<CommitSummary, BoardError> {
        let plan = self.arrange_plan(strategy)?;
        let summary = self.commit_labeled(plan, VisualMode::Flip, "arrange")?;
        self.events.emit(&BoardEvent::LayoutArranged {
            strategy,
            moved: summary.moved,
        });
        Ok(summary)
    }

    fn auto_arrange_into(&mut self, entry: &mut HistoryEntry) {
        let strategy = self.config.auto_arrange_strategy;
        let plan = match self.arrange_plan(strategy) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(target: "blockgrid.board", strategy = strategy.as_str(), %err, "auto-arrange skipped");
                return;
            }
        };
        if plan.is_empty() {
            return;
        }
        let firsts = self.capture_first(plan.changes().iter().map(|c| &c.block_id), VisualMode::Flip);
        let mark = entry.inverse.len();
        if let Err(err) = self.apply_plan(entry, &plan) {
            self.unwind_to(entry, mark);
            warn!(target: "blockgrid.board", %err, "auto-arrange failed");
            return;
        }
        self.play(firsts);
        self.events.emit(&BoardEvent::LayoutArranged {
            strategy,
            moved: plan.changes().len(),
        });
    }

    // ------------------------------------------------------------------
    // Batches
    // ------------------------------------------------------------------

    /// Run several operations with the given failure semantics.
    ///
    /// Members never escape as `Err` or panic; see [`BatchOutcome`].
    pub fn apply_batch(
        &mut self,
        operations: Vec<BatchOperation>,
        strategy: BatchStrategy,
    ) -> BatchOutcome {
        let _span = debug_span!(
            target: "blockgrid.batch",
            "batch",
            strategy = strategy.as_str(),
            members = operations.len()
        )
        .entered();
        let mut outcome = BatchOutcome::new(strategy, operations.len());
        let mut entry = HistoryEntry::new("batch");
        let mut structural = false;

        for (i, operation) in operations.into_iter().enumerate() {
            let verb = operation.verb();
            structural |= matches!(
                operation,
                BatchOperation::Add(_) | BatchOperation::Remove(_)
            );
            let mark = entry.inverse.len();
            let result = catch_unwind(AssertUnwindSafe(|| {
                self.batch_member(&mut entry, operation)
            }));
            let failure = match result {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err.to_string()),
                Err(payload) => Some(BoardError::Panicked(panic_message(payload.as_ref())).to_string()),
            };
            let Some(message) = failure else {
                outcome.results[i] = MemberResult::Applied;
                continue;
            };

            self.unwind_to(&mut entry, mark);
            warn!(target: "blockgrid.batch", member = i, verb, %message, "batch member failed");
            outcome.results[i] = MemberResult::Failed(message.clone());
            match strategy {
                BatchStrategy::AllOrNothing => {
                    self.unwind_to(&mut entry, 0);
                    for result in &mut outcome.results[..i] {
                        *result = MemberResult::Skipped;
                    }
                    outcome.rolled_back = true;
                    break;
                }
                BatchStrategy::BestEffort => {
                    outcome.warnings.push(format!("member {i} ({verb}): {message}"));
                }
                BatchStrategy::FailFast => break,
            }
        }

        self.prune_selection();
        if structural && self.config.auto_arrange && !entry.is_empty() {
            self.auto_arrange_into(&mut entry);
        }
        self.finish(entry);
        debug!(
            target: "blockgrid.batch",
            applied = outcome.applied_count(),
            failed = outcome.failed_count(),
            rolled_back = outcome.rolled_back,
            "batch finished"
        );
        outcome
    }

    fn batch_member(
        &mut self,
        entry: &mut HistoryEntry,
        operation: BatchOperation,
    ) -> Result<(), BoardError> {
        match operation {
            BatchOperation::Add(spec) => self.add_into(entry, spec).map(drop),
            BatchOperation::Remove(id) => match self.remove_into(entry, &id)? {
                Some(_) => Ok(()),
                None => Err(BoardError::UnknownBlock(id)),
            },
            BatchOperation::Move { block_id, position } => {
                let plan = self.plan(&[ProposedChange::move_to(block_id, position)])?;
                self.apply_plan(entry, &plan)
            }
            BatchOperation::Resize { block_id, size } => {
                let plan = self.plan(&[ProposedChange::resize_to(block_id, size)])?;
                self.apply_plan(entry, &plan)
            }
            BatchOperation::Update { block_id, update } => {
                self.update_into(entry, &block_id, update)
            }
        }
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Undo the most recent entry. Returns `false` when there is nothing to
    /// undo.
    pub fn undo(&mut self) -> Result<bool, BoardError> {
        let Some(entry) = self.history.undo().cloned() else {
            return Ok(false);
        };
        let cursor = self.history.cursor();
        let commands: Vec<BoardCommand> = entry.undo_commands().cloned().collect();
        let result = self.replay(&entry.label, commands);
        if result.is_err() {
            self.history.discard_from(cursor);
        }
        self.prune_selection();
        self.emit_history_changed();
        result.map(|()| true)
    }

    /// Re-apply the entry ahead of the cursor.
    pub fn redo(&mut self) -> Result<bool, BoardError> {
        let cursor = self.history.cursor();
        let Some(entry) = self.history.redo().cloned() else {
            return Ok(false);
        };
        let result = self.replay(&entry.label, entry.forward);
        if result.is_err() {
            self.history.discard_from(cursor);
        }
        self.prune_selection();
        self.emit_history_changed();
        result.map(|()| true)
    }

    fn replay(&mut self, label: &str, commands: Vec<BoardCommand>) -> Result<(), BoardError> {
        let moved: Vec<BlockId> = commands
            .iter()
            .filter(|command| matches!(command, BoardCommand::Place { .. }))
            .filter_map(BoardCommand::block_id)
            .cloned()
            .collect();
        let firsts = self.capture_first(moved.iter(), VisualMode::Flip);
        let mut applied = HistoryEntry::new(label);
        for command in commands {
            let step = self
                .check_in_bounds(&command)
                .and_then(|()| self.record(&mut applied, command));
            if let Err(err) = step {
                self.unwind_to(&mut applied, 0);
                warn!(target: "blockgrid.history", label, %err, "replay failed");
                return Err(HistoryError::ReplayFailed {
                    label: label.to_string(),
                    reason: err.to_string(),
                }
                .into());
            }
        }
        self.play(firsts);
        Ok(())
    }

    /// Replayed placements must fit the grid as it is now.
    fn check_in_bounds(&self, command: &BoardCommand) -> Result<(), BoardError> {
        let (block_id, position, size) = match command {
            BoardCommand::Place {
                block_id,
                position,
                size,
            } => (block_id, *position, *size),
            BoardCommand::Insert { block, .. } => (&block.id, block.grid_position, block.grid_size),
            _ => return Ok(()),
        };
        if self.coords().is_valid_position(position, size) {
            return Ok(());
        }
        let mut report = ValidationReport::ok();
        report.push_error(ValidationIssue::OutOfBounds {
            block_id: Some(block_id.clone()),
            position,
            size,
        });
        Err(BoardError::InvalidPlacement(report))
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    fn ensure_known(&self, id: &BlockId) -> Result<(), BoardError> {
        if self.index.contains(id) {
            Ok(())
        } else {
            Err(BoardError::UnknownBlock(id.clone()))
        }
    }

    /// Replace the selection with one block.
    pub fn select(&mut self, id: &BlockId) -> Result<(), BoardError> {
        self.ensure_known(id)?;
        if self.selection.select_only(id.clone()) {
            self.emit_selection_changed();
        }
        Ok(())
    }

    pub fn toggle_selection(&mut self, id: &BlockId) -> Result<(), BoardError> {
        self.ensure_known(id)?;
        if self.selection.toggle(id.clone()) {
            self.emit_selection_changed();
        }
        Ok(())
    }

    /// Replace the selection. Unknown ids are ignored.
    pub fn set_selection(&mut self, ids: impl IntoIterator<Item = BlockId>) {
        let index = &self.index;
        let known: Vec<BlockId> = ids.into_iter().filter(|id| index.contains(id)).collect();
        if self.selection.set(known) {
            self.emit_selection_changed();
        }
    }

    /// Make a selected block the anchor.
    pub fn set_primary(&mut self, id: &BlockId) {
        if self.selection.set_primary(id) {
            self.emit_selection_changed();
        }
    }

    pub fn select_all(&mut self) {
        let ids: Vec<BlockId> = self.blocks.iter().map(|block| block.id.clone()).collect();
        self.set_selection(ids);
    }

    pub fn clear_selection(&mut self) {
        if self.selection.clear() {
            self.emit_selection_changed();
        }
    }

    /// Blocks whose layout box intersects a viewport rectangle.
    pub fn blocks_in_rect(&self, rect: &PixelRect) -> Vec<BlockId> {
        // A zero-area lasso is a line or point; it selects what it crosses.
        let degenerate = rect.is_empty();
        self.blocks
            .iter()
            .filter(|block| {
                let bounds = self.layout_rect(block.grid_position, block.grid_size);
                if degenerate {
                    bounds.overlaps_closed(rect)
                } else {
                    bounds.intersects(rect)
                }
            })
            .map(|block| block.id.clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Edit mode
    // ------------------------------------------------------------------

    /// Enter content-edit mode on a block, leaving any other block's edit
    /// mode first.
    pub fn enter_edit_mode(&mut self, id: &BlockId) -> Result<(), BoardError> {
        self.ensure_known(id)?;
        if self.edit_mode.as_ref() == Some(id) {
            return Ok(());
        }
        self.exit_edit_mode();
        if let Some(block) = self.block(id) {
            if let Some(handler) = self.registry.get(&block.block_type) {
                let hook = catch_unwind(AssertUnwindSafe(|| handler.on_enter_edit(block)));
                if let Err(payload) = hook {
                    warn!(
                        target: "blockgrid.board",
                        block = %id,
                        message = %panic_message(payload.as_ref()),
                        "enter-edit hook panicked"
                    );
                }
            }
        }
        self.edit_mode = Some(id.clone());
        self.events
            .emit(&BoardEvent::EditModeEntered { block_id: id.clone() });
        Ok(())
    }

    /// Leave content-edit mode. Attributes returned by the type handler
    /// replace the block's attributes without a history entry.
    pub fn exit_edit_mode(&mut self) -> Option<BlockId> {
        let id = self.edit_mode.take()?;
        let attributes = self.block(&id).and_then(|block| {
            let handler = self.registry.get(&block.block_type)?;
            match catch_unwind(AssertUnwindSafe(|| handler.on_exit_edit(block))) {
                Ok(attributes) => attributes,
                Err(payload) => {
                    warn!(
                        target: "blockgrid.board",
                        block = %id,
                        message = %panic_message(payload.as_ref()),
                        "exit-edit hook panicked"
                    );
                    None
                }
            }
        });
        if let Some(attributes) = attributes {
            let command = BoardCommand::SetAttributes {
                block_id: id.clone(),
                attributes,
            };
            if let Err(err) = self.apply_command(command) {
                warn!(target: "blockgrid.board", block = %id, %err, "edit result dropped");
            }
        }
        self.events
            .emit(&BoardEvent::EditModeExited { block_id: id.clone() });
        Some(id)
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Deep snapshot of blocks and grid.
    pub fn export_data(&self) -> BoardDocument {
        BoardDocument::new(self.blocks.clone(), self.config.grid)
    }

    pub fn export_json(&self) -> Result<String, BoardError> {
        Ok(self.export_data().to_json()?)
    }

    /// Replace blocks and grid wholesale. Clears history and selection.
    pub fn import_data(&mut self, document: BoardDocument) -> Result<(), BoardError> {
        let _span = debug_span!(
            target: "blockgrid.document",
            "import",
            blocks = document.blocks.len()
        )
        .entered();
        document.check(self.config.allow_overlap)?;

        self.exit_edit_mode();
        self.animator.finish_all(&mut self.surface);
        for block in &self.blocks {
            self.surface.remove(&block.id);
        }
        self.blocks = document.blocks;
        self.config.grid = document.grid;
        self.index.rebuild(&self.blocks);
        self.place_all();
        self.history.clear();
        self.revision += 1;
        if self.selection.clear() {
            self.emit_selection_changed();
        }
        let block_count = self.blocks.len();
        debug!(target: "blockgrid.document", block_count, "imported");
        self.events
            .emit(&BoardEvent::DocumentImported { block_count });
        self.emit_history_changed();
        Ok(())
    }

    pub fn import_json(&mut self, json: &str) -> Result<(), BoardError> {
        self.import_data(BoardDocument::from_json(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{BlockTypeHandler, SimpleBlockType};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    fn board() -> Board {
        let mut board = Board::new(BoardConfig::default()).expect("board");
        // 12 columns of 60px plus 11 gaps of 8px.
        board.set_container(ContainerBox::from_size(808.0, 600.0));
        board
    }

    fn add(board: &mut Board, id: &str, column: u16, row: u16, w: u16, h: u16) -> BlockId {
        board
            .add_block(
                BlockSpec::new("box")
                    .with_id(id)
                    .at(GridPosition::new(column, row))
                    .sized(GridSize::new(w, h)),
            )
            .expect("add")
    }

    fn pos(board: &Board, id: &str) -> GridPosition {
        board.block(&BlockId::from(id)).expect("block").grid_position
    }

    fn record_events(board: &mut Board) -> (Rc<RefCell<Vec<String>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let sub = board.subscribe(move |event| sink.borrow_mut().push(event.name().to_string()));
        (log, sub)
    }

    #[test]
    fn add_without_position_uses_first_fit() {
        let mut board = board();
        add(&mut board, "a", 1, 1, 3, 2);
        let id = board
            .add_block(BlockSpec::new("box").sized(GridSize::new(3, 2)))
            .expect("add");
        assert_eq!(board.block(&id).map(|b| b.grid_position), Some(GridPosition::new(4, 1)));
        assert!(id.as_str().starts_with("block-"));
    }

    #[test]
    fn add_rejects_collision_and_duplicates() {
        let mut board = board();
        add(&mut board, "a", 1, 1, 2, 2);
        let err = board
            .add_block(BlockSpec::new("box").at(GridPosition::new(2, 2)))
            .expect_err("collides");
        assert!(matches!(err, BoardError::InvalidPlacement(ref r) if r.has_collision()));
        let err = board
            .add_block(BlockSpec::new("box").with_id("a").at(GridPosition::new(5, 5)))
            .expect_err("dup");
        assert!(matches!(err, BoardError::DuplicateId(_)));
        assert_eq!(board.len(), 1);
        assert_eq!(board.history().len(), 1);
    }

    #[test]
    fn registry_supplies_defaults_and_rejects_unknown_types() {
        let mut board = board();
        board.registry_mut().register(
            SimpleBlockType::new("note", GridSize::new(4, 2))
                .with_default_attributes(json!({ "text": "" })),
        );
        let id = board.add_block(BlockSpec::new("note")).expect("add");
        let block = board.block(&id).expect("block");
        assert_eq!(block.grid_size, GridSize::new(4, 2));
        assert_eq!(block.attributes, json!({ "text": "" }));
        assert!(matches!(
            board.add_block(BlockSpec::new("chart")),
            Err(BoardError::UnknownBlockType(_))
        ));
    }

    #[test]
    fn move_updates_index_and_undoes() {
        let mut board = board();
        let a = add(&mut board, "a", 1, 1, 2, 1);
        board.move_block(&a, GridPosition::new(5, 3)).expect("move");
        assert_eq!(pos(&board, "a"), GridPosition::new(5, 3));
        assert_eq!(
            board.index().footprint(&a),
            board.block(&a).map(Block::footprint)
        );
        assert!(board.undo().expect("undo"));
        assert_eq!(pos(&board, "a"), GridPosition::new(1, 1));
        assert!(board.redo().expect("redo"));
        assert_eq!(pos(&board, "a"), GridPosition::new(5, 3));
        assert!(board.index().is_consistent());
    }

    #[test]
    fn noop_commit_changes_nothing() {
        let mut board = board();
        let a = add(&mut board, "a", 1, 1, 2, 1);
        let revision = board.revision();
        let (log, _sub) = record_events(&mut board);
        let plan = board
            .plan(&[ProposedChange::move_to(a.clone(), GridPosition::new(1, 1))])
            .expect("plan");
        let summary = board.commit(plan, VisualMode::Flip).expect("commit");
        assert_eq!(summary.moved, 0);
        assert_eq!(board.revision(), revision);
        assert!(log.borrow().is_empty());
        assert_eq!(board.history().len(), 1);
    }

    #[test]
    fn stale_plan_is_rejected() {
        let mut board = board();
        let a = add(&mut board, "a", 1, 1, 1, 1);
        let plan = board
            .plan(&[ProposedChange::move_to(a.clone(), GridPosition::new(3, 1))])
            .expect("plan");
        add(&mut board, "b", 6, 1, 1, 1);
        assert!(matches!(
            board.commit(plan, VisualMode::None),
            Err(BoardError::StalePlan { .. })
        ));
    }

    #[test]
    fn push_away_reflow_commits_as_one_entry() {
        let mut board = board();
        board.set_drag_reflow(ReflowMode::PushAway);
        let a = add(&mut board, "a", 1, 1, 3, 1);
        add(&mut board, "b", 4, 1, 2, 1);
        let before = board.history().len();
        board
            .move_with_reflow(&a, GridPosition::new(3, 1))
            .expect("reflow");
        assert_eq!(pos(&board, "a"), GridPosition::new(3, 1));
        assert_eq!(pos(&board, "b"), GridPosition::new(6, 1));
        assert_eq!(board.history().len(), before + 1);
        board.undo().expect("undo");
        assert_eq!(pos(&board, "a"), GridPosition::new(1, 1));
        assert_eq!(pos(&board, "b"), GridPosition::new(4, 1));
    }

    #[test]
    fn resize_clamps_to_constraints() {
        let mut board = board();
        board
            .add_block(
                BlockSpec::new("box")
                    .with_id("a")
                    .at(GridPosition::new(1, 1))
                    .with_constraints(SizeConstraints {
                        min_column_span: 2,
                        min_row_span: 1,
                        max_column_span: Some(4),
                        max_row_span: None,
                    }),
            )
            .expect("add");
        let a = BlockId::from("a");
        board.resize_block(&a, GridSize::new(9, 2)).expect("resize");
        assert_eq!(board.block(&a).map(|b| b.grid_size), Some(GridSize::new(4, 2)));
    }

    #[test]
    fn all_or_nothing_batch_rolls_back() {
        let mut board = board();
        let a = add(&mut board, "a", 1, 1, 1, 1);
        let history = board.history().len();
        let outcome = board.apply_batch(
            vec![
                BatchOperation::Move {
                    block_id: a.clone(),
                    position: GridPosition::new(2, 1),
                },
                BatchOperation::Add(BlockSpec::new("box").with_id("b").at(GridPosition::new(5, 1))),
                BatchOperation::Move {
                    block_id: a.clone(),
                    position: GridPosition::new(13, 1),
                },
                BatchOperation::Remove(a.clone()),
            ],
            BatchStrategy::AllOrNothing,
        );
        assert!(outcome.rolled_back);
        assert_eq!(outcome.results[0], MemberResult::Skipped);
        assert_eq!(outcome.results[1], MemberResult::Skipped);
        assert!(outcome.results[2].is_failed());
        assert_eq!(outcome.results[3], MemberResult::Skipped);
        assert_eq!(pos(&board, "a"), GridPosition::new(1, 1));
        assert!(board.block(&BlockId::from("b")).is_none());
        assert_eq!(board.history().len(), history);
        assert!(board.index().is_consistent());
    }

    #[test]
    fn best_effort_batch_keeps_successes() {
        let mut board = board();
        let a = add(&mut board, "a", 1, 1, 1, 1);
        let outcome = board.apply_batch(
            vec![
                BatchOperation::Move {
                    block_id: a.clone(),
                    position: GridPosition::new(2, 1),
                },
                BatchOperation::Remove(BlockId::from("ghost")),
                BatchOperation::Add(BlockSpec::new("box").with_id("b").at(GridPosition::new(5, 1))),
            ],
            BatchStrategy::BestEffort,
        );
        assert_eq!(outcome.applied_count(), 2);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(pos(&board, "a"), GridPosition::new(2, 1));
        assert_eq!(board.len(), 2);
        board.undo().expect("undo");
        assert_eq!(board.len(), 1);
        assert_eq!(pos(&board, "a"), GridPosition::new(1, 1));
    }

    #[test]
    fn fail_fast_keeps_applied_prefix() {
        let mut board = board();
        let a = add(&mut board, "a", 1, 1, 1, 1);
        let outcome = board.apply_batch(
            vec![
                BatchOperation::Move {
                    block_id: a.clone(),
                    position: GridPosition::new(2, 1),
                },
                BatchOperation::Resize {
                    block_id: a.clone(),
                    size: GridSize::new(20, 1),
                },
                BatchOperation::Remove(a.clone()),
            ],
            BatchStrategy::FailFast,
        );
        assert_eq!(outcome.results[0], MemberResult::Applied);
        assert_eq!(outcome.results[2], MemberResult::Skipped);
        assert!(outcome.results[1].is_failed());
        assert_eq!(pos(&board, "a"), GridPosition::new(2, 1));
    }

    #[test]
    fn panicking_rule_fails_member_not_batch() {
        let mut board = board();
        board.add_rule(("explodes-on-row-9", |ctx: &crate::validation::PlacementContext<'_>| {
            if ctx.placement.position.row == 9 {
                panic!("row 9 is cursed");
            }
            crate::validation::RuleVerdict::Pass
        }));
        let outcome = board.apply_batch(
            vec![
                BatchOperation::Add(BlockSpec::new("box").with_id("x").at(GridPosition::new(1, 9))),
                BatchOperation::Add(BlockSpec::new("box").with_id("y").at(GridPosition::new(1, 1))),
            ],
            BatchStrategy::BestEffort,
        );
        assert!(outcome.results[0].is_failed());
        assert!(outcome.results[1].is_applied());
    }

    #[test]
    fn remove_prunes_selection() {
        let mut board = board();
        let a = add(&mut board, "a", 1, 1, 1, 1);
        let b = add(&mut board, "b", 3, 1, 1, 1);
        board.set_selection([a.clone(), b.clone()]);
        board.remove_block(&b).expect("remove");
        assert_eq!(board.selection().ids(), [a.clone()]);
        assert_eq!(board.selection().primary(), Some(&a));
        board.undo().expect("undo");
        assert!(board.block(&b).is_some());
    }

    #[test]
    fn export_import_round_trip() {
        let mut board = board();
        add(&mut board, "a", 1, 1, 3, 2);
        add(&mut board, "b", 5, 1, 2, 1);
        let json = board.export_json().expect("export");

        let mut other = Board::new(BoardConfig::default()).expect("board");
        let (log, _sub) = record_events(&mut other);
        other.import_json(&json).expect("import");
        assert_eq!(other.blocks(), board.blocks());
        assert_eq!(other.config().grid, board.config().grid);
        assert!(!other.can_undo());
        assert!(other.index().is_consistent());
        assert!(log.borrow().contains(&"document:imported".to_string()));
    }

    #[test]
    fn import_rejects_overlapping_document() {
        let mut board = board();
        let doc = BoardDocument::new(
            vec![
                Block::new("a", "box", GridPosition::new(1, 1), GridSize::new(2, 2)),
                Block::new("b", "box", GridPosition::new(2, 1), GridSize::new(1, 1)),
            ],
            GridConfig::default(),
        );
        assert!(matches!(board.import_data(doc), Err(BoardError::Document(_))));
        assert!(board.is_empty());
    }

    #[test]
    fn auto_grow_extends_rows() {
        let mut config = BoardConfig::default().with_grid(GridConfig::default().with_rows(2));
        config.auto_grow_rows = true;
        let mut board = Board::new(config).expect("board");
        board
            .add_block(BlockSpec::new("box").with_id("a").at(GridPosition::new(1, 4)))
            .expect("grows");
        assert_eq!(board.config().grid.rows, Some(4));
        board.undo().expect("undo");
        assert_eq!(board.config().grid.rows, Some(2));
    }

    #[test]
    fn arrange_packs_and_animates() {
        let mut board = board();
        add(&mut board, "a", 5, 3, 2, 1);
        add(&mut board, "b", 1, 6, 2, 1);
        let (log, _sub) = record_events(&mut board);
        let summary = board.arrange(ArrangeStrategy::TopLeft).expect("arrange");
        assert_eq!(summary.moved, 2);
        assert_eq!(pos(&board, "a"), GridPosition::new(1, 1));
        assert_eq!(pos(&board, "b"), GridPosition::new(3, 1));
        assert!(board.animator().active_count() > 0);
        assert!(log.borrow().contains(&"layout:arranged".to_string()));
        board.tick(Instant::now() + Duration::from_secs(1));
        assert_eq!(board.animator().active_count(), 0);
    }

    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl BlockTypeHandler for Recorder {
        fn tag(&self) -> &str {
            "text"
        }

        fn on_enter_edit(&self, block: &Block) {
            if let Ok(mut log) = self.log.lock() {
                log.push(format!("enter:{}", block.id));
            }
        }

        fn on_exit_edit(&self, block: &Block) -> Option<Value> {
            if let Ok(mut log) = self.log.lock() {
                log.push(format!("exit:{}", block.id));
            }
            Some(json!({ "text": "edited" }))
        }
    }

    #[test]
    fn edit_mode_runs_hooks_without_history() {
        let hooks = Arc::new(Mutex::new(Vec::new()));
        let mut board = board();
        board.registry_mut().register(Recorder {
            log: Arc::clone(&hooks),
        });
        let a = board
            .add_block(BlockSpec::new("text").with_id("a"))
            .expect("add");
        let b = board
            .add_block(BlockSpec::new("text").with_id("b"))
            .expect("add");
        let entries = board.history().len();

        board.enter_edit_mode(&a).expect("enter");
        assert_eq!(board.edit_mode(), Some(&a));
        board.enter_edit_mode(&b).expect("switch");
        assert_eq!(board.exit_edit_mode(), Some(b.clone()));
        assert_eq!(board.exit_edit_mode(), None);

        assert_eq!(
            *hooks.lock().expect("lock"),
            ["enter:a", "exit:a", "enter:b", "exit:b"]
        );
        assert_eq!(
            board.block(&a).map(|block| block.attributes.clone()),
            Some(json!({ "text": "edited" }))
        );
        assert_eq!(board.history().len(), entries);
    }

    #[test]
    fn grid_change_drops_history_recorded_against_old_geometry() {
        let mut board = board();
        let a = add(&mut board, "a", 10, 1, 3, 1);
        board.move_block(&a, GridPosition::new(1, 1)).expect("move");
        assert!(board.can_undo());
        let (log, _sub) = record_events(&mut board);

        board
            .set_grid_config(GridConfig::new(6, 60.0, 8.0))
            .expect("block still fits");
        assert!(!board.can_undo());
        assert!(log.borrow().iter().any(|name| name == "history:changed"));

        assert!(!board.undo().expect("undo"));
        let block = board.block(&a).expect("block");
        assert_eq!(block.grid_position, GridPosition::new(1, 1));
        assert!(board.coords().is_valid_position(block.grid_position, block.grid_size));
    }

    #[test]
    fn unchanged_grid_keeps_history() {
        let mut board = board();
        add(&mut board, "a", 1, 1, 1, 1);
        let grid = board.config().grid;
        board.set_grid_config(grid).expect("same grid");
        assert!(board.can_undo());
    }
}
