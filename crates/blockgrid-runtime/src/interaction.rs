#![forbid(unsafe_code)]

//! Pointer and keyboard interaction state machine.
//!
//! ```text
//! Idle -> PotentialDrag -> Dragging(move | resize) -> Idle
//!              |       \-> LassoSelecting          -> Idle
//!              \-> Idle (click)
//! ```
//!
//! A press only arms the machine. Nothing on the board changes until the
//! pointer travels past the configured drag threshold; a release before that
//! is a click. While dragging, the board sees only preview transforms and
//! `drag:updated` notifications; the single structural change happens on
//! drop, through the same plan/commit path every other operation uses.
//!
//! # Invariants
//!
//! 1. At most one interaction is active; a press during another interaction
//!    is a no-op transition.
//! 2. Previews never mutate blocks, the spatial index, or history.
//! 3. A group drag commits all members or none. An invalid drop animates
//!    every member back to its pre-drag box.
//! 4. A block in content-edit mode ignores block-level input until edit mode
//!    exits.
//!
//! # Failure Modes
//!
//! - **Host loses the pointer**: feed [`PointerEventKind::Cancel`] or
//!   [`InputEvent::Blur`], or call [`InteractionMachine::force_cancel`]. All
//!   three restore the pre-interaction state.
//! - **Target removed mid-drag**: the drop fails to plan and the remaining
//!   members animate back.

use blockgrid_core::event::{
    InputEvent, KeyCode, KeyEvent, Modifiers, PointerButton, PointerEvent, PointerEventKind,
};
use blockgrid_core::geometry::{PixelRect, Point};
use blockgrid_core::gesture::{PressProgress, PressResolution, PressTracker};
use blockgrid_layout::{Block, BlockId, GridPosition, GridSize};
use std::fmt;
use tracing::{debug, trace};

use crate::board::Board;
use crate::error::BoardError;
use crate::events::{BoardEvent, PreviewPlacement};
use crate::flip::VisualSurface;
use crate::transaction::{ProposedChange, VisualMode};

/// Edge or corner grabbed for a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeHandle {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl ResizeHandle {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::North => "n",
            Self::South => "s",
            Self::East => "e",
            Self::West => "w",
            Self::NorthEast => "ne",
            Self::NorthWest => "nw",
            Self::SouthEast => "se",
            Self::SouthWest => "sw",
        }
    }

    /// Handle for a combination of grabbed edges.
    const fn from_edges(west: bool, east: bool, north: bool, south: bool) -> Option<Self> {
        match (west, east, north, south) {
            (true, _, true, _) => Some(Self::NorthWest),
            (true, _, _, true) => Some(Self::SouthWest),
            (_, true, true, _) => Some(Self::NorthEast),
            (_, true, _, true) => Some(Self::SouthEast),
            (true, _, _, _) => Some(Self::West),
            (_, true, _, _) => Some(Self::East),
            (_, _, true, _) => Some(Self::North),
            (_, _, _, true) => Some(Self::South),
            _ => None,
        }
    }

    const fn moves_west(self) -> bool {
        matches!(self, Self::West | Self::NorthWest | Self::SouthWest)
    }

    const fn moves_east(self) -> bool {
        matches!(self, Self::East | Self::NorthEast | Self::SouthEast)
    }

    const fn moves_north(self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }

    const fn moves_south(self) -> bool {
        matches!(self, Self::South | Self::SouthEast | Self::SouthWest)
    }
}

impl fmt::Display for ResizeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a drag does to its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Move,
    Resize(ResizeHandle),
}

/// What lies under a pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitTarget {
    Block(BlockId),
    ResizeHandle(BlockId, ResizeHandle),
    Empty,
}

impl HitTarget {
    #[must_use]
    pub fn block_id(&self) -> Option<&BlockId> {
        match self {
            Self::Block(id) | Self::ResizeHandle(id, _) => Some(id),
            Self::Empty => None,
        }
    }
}

/// Topmost block under `point`, and the resize handle if the point falls in
/// a resizable block's edge band.
///
/// Ties on `z_index` go to the block added later.
pub fn hit_test<S: VisualSurface>(board: &Board<S>, point: Point) -> HitTarget {
    let mut best: Option<(i32, usize, PixelRect)> = None;
    for (order, block) in board.blocks().iter().enumerate() {
        let Some(rect) = board.block_rect(&block.id) else {
            continue;
        };
        if !rect.contains(point) {
            continue;
        }
        let z = block.grid_position.z_index;
        if best.is_none_or(|(best_z, _, _)| z >= best_z) {
            best = Some((z, order, rect));
        }
    }
    let Some((_, order, rect)) = best else {
        return HitTarget::Empty;
    };
    let block = &board.blocks()[order];
    let band = board.config().resize_handle_size;
    if block.resizable && band > 0.0 {
        let left = point.x - rect.x;
        let right = rect.right() - point.x;
        let top = point.y - rect.y;
        let bottom = rect.bottom() - point.y;
        let west = left < band && left <= right;
        let east = right < band && !west;
        let north = top < band && top <= bottom;
        let south = bottom < band && !north;
        if let Some(handle) = ResizeHandle::from_edges(west, east, north, south) {
            return HitTarget::ResizeHandle(block.id.clone(), handle);
        }
    }
    HitTarget::Block(block.id.clone())
}

/// Public view of the machine's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    PotentialDrag,
    Dragging(DragKind),
    LassoSelecting,
}

/// Why an event was accepted without effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoopReason {
    UnhandledEvent,
    NonPrimaryButton,
    PointerMismatch,
    BelowThreshold,
    InteractionActive,
    EditModeActive,
    LassoDisabled,
    KeyboardDisabled,
    NothingSelected,
    NotMovable,
    NotResizable,
}

/// Keyboard command carried out from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// `moved` is zero when the nudge was rejected.
    Nudge { columns: i32, rows: i32, moved: usize },
    Delete { removed: usize },
    SelectAll,
    ClearSelection,
    FocusNext,
    FocusPrevious,
    EnterEditMode,
    ExitEditMode,
    Undo { applied: bool },
    Redo { applied: bool },
}

/// Effect of one transition.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEffect {
    Noop { reason: NoopReason },
    Pressed { target: HitTarget },
    /// Press released before the threshold.
    Clicked { target: HitTarget },
    PressCancelled,
    DragStarted { kind: DragKind, block_ids: Vec<BlockId> },
    DragPreview { kind: DragKind, valid: bool },
    Dropped { kind: DragKind, committed: bool, dropped_out: bool },
    DragCancelled { kind: DragKind },
    LassoStarted { origin: Point },
    LassoUpdated { rect: PixelRect, hits: usize },
    LassoEnded { selected: usize },
    LassoCancelled,
    Key { action: KeyAction },
}

/// One state-machine step.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionTransition {
    pub transition_id: u64,
    pub from: InteractionState,
    pub to: InteractionState,
    pub effect: InteractionEffect,
}

/// Interaction failure. The machine is back in `Idle` when one is returned.
#[derive(Debug)]
pub enum InteractionError {
    /// A host-supplied target names a block that is not on the board.
    UnknownBlock(BlockId),
    /// A board operation triggered by the interaction failed.
    Board(BoardError),
}

impl fmt::Display for InteractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBlock(id) => write!(f, "hit target '{id}' is not on the board"),
            Self::Board(err) => write!(f, "board operation failed: {err}"),
        }
    }
}

impl std::error::Error for InteractionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Board(err) => Some(err),
            Self::UnknownBlock(_) => None,
        }
    }
}

impl From<BoardError> for InteractionError {
    fn from(value: BoardError) -> Self {
        match value {
            BoardError::UnknownBlock(id) => Self::UnknownBlock(id),
            other => Self::Board(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PressContext {
    tracker: PressTracker,
    target: HitTarget,
    modifiers: Modifiers,
}

#[derive(Debug, Clone, PartialEq)]
struct DragMember {
    block_id: BlockId,
    position: GridPosition,
    size: GridSize,
}

#[derive(Debug, Clone, PartialEq)]
struct DragContext {
    kind: DragKind,
    pointer_id: u32,
    origin: Point,
    /// Pre-drag snapshot, grabbed block first.
    members: Vec<DragMember>,
    candidate: Vec<PreviewPlacement>,
    valid: bool,
    outside: bool,
}

impl DragContext {
    fn block_ids(&self) -> Vec<BlockId> {
        self.members.iter().map(|m| m.block_id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct LassoContext {
    pointer_id: u32,
    origin: Point,
    additive: bool,
    base: Vec<BlockId>,
    selected: Vec<BlockId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
enum Active {
    #[default]
    Idle,
    Pressed(PressContext),
    Dragging(DragContext),
    Lasso(LassoContext),
}

impl Active {
    const fn state(&self) -> InteractionState {
        match self {
            Self::Idle => InteractionState::Idle,
            Self::Pressed(_) => InteractionState::PotentialDrag,
            Self::Dragging(ctx) => InteractionState::Dragging(ctx.kind),
            Self::Lasso(_) => InteractionState::LassoSelecting,
        }
    }
}

/// Drives a [`Board`] from raw input events.
#[derive(Debug, Clone, Default)]
pub struct InteractionMachine {
    active: Active,
    transition_counter: u64,
}

impl InteractionMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> InteractionState {
        self.active.state()
    }

    /// Whether a press, drag, or lasso is in progress.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self.active, Active::Idle)
    }

    /// Transitions taken so far.
    #[must_use]
    pub const fn transition_count(&self) -> u64 {
        self.transition_counter
    }

    /// Apply one input event, hit-testing presses against the board.
    pub fn handle_event<S: VisualSurface>(
        &mut self,
        board: &mut Board<S>,
        event: &InputEvent,
    ) -> Result<InteractionTransition, InteractionError> {
        self.step(board, event, None)
    }

    /// Apply one input event with a host-resolved press target.
    ///
    /// The target is only consulted for pointer-down.
    pub fn handle_event_with_target<S: VisualSurface>(
        &mut self,
        board: &mut Board<S>,
        event: &InputEvent,
        target: HitTarget,
    ) -> Result<InteractionTransition, InteractionError> {
        if let Some(id) = target.block_id() {
            if board.block(id).is_none() {
                return Err(InteractionError::UnknownBlock(id.clone()));
            }
        }
        self.step(board, event, Some(target))
    }

    /// Abandon any active interaction, restoring pre-interaction state.
    ///
    /// Returns `None` when already idle.
    pub fn force_cancel<S: VisualSurface>(
        &mut self,
        board: &mut Board<S>,
    ) -> Option<InteractionTransition> {
        if !self.is_active() {
            return None;
        }
        let from = self.state();
        let effect = self.cancel(board);
        Some(self.transition(from, effect))
    }

    fn step<S: VisualSurface>(
        &mut self,
        board: &mut Board<S>,
        event: &InputEvent,
        target: Option<HitTarget>,
    ) -> Result<InteractionTransition, InteractionError> {
        let from = self.state();
        let effect = match event {
            InputEvent::Pointer(pointer) => match pointer.kind {
                PointerEventKind::Down => self.pointer_down(board, pointer, target),
                PointerEventKind::Move => self.pointer_move(board, pointer),
                PointerEventKind::Up => self.pointer_up(board, pointer),
                PointerEventKind::Cancel => Ok(self.cancel_pointer(board, pointer.pointer_id)),
            },
            InputEvent::Key(key) => self.key(board, key),
            InputEvent::Blur => Ok(if self.is_active() {
                self.cancel(board)
            } else {
                noop(NoopReason::UnhandledEvent)
            }),
        };
        match effect {
            Ok(effect) => Ok(self.transition(from, effect)),
            Err(err) => {
                self.active = Active::Idle;
                debug!(target: "blockgrid.interaction", %err, "interaction aborted");
                Err(err)
            }
        }
    }

    fn transition(&mut self, from: InteractionState, effect: InteractionEffect) -> InteractionTransition {
        self.transition_counter = self.transition_counter.saturating_add(1);
        let to = self.state();
        trace!(
            target: "blockgrid.interaction",
            transition_id = self.transition_counter,
            ?from,
            ?to,
            ?effect,
            "transition"
        );
        InteractionTransition {
            transition_id: self.transition_counter,
            from,
            to,
            effect,
        }
    }

    // ------------------------------------------------------------------
    // Pointer
    // ------------------------------------------------------------------

    fn pointer_down<S: VisualSurface>(
        &mut self,
        board: &mut Board<S>,
        pointer: &PointerEvent,
        target: Option<HitTarget>,
    ) -> Result<InteractionEffect, InteractionError> {
        if pointer.button != PointerButton::Primary {
            return Ok(noop(NoopReason::NonPrimaryButton));
        }
        if self.is_active() {
            return Ok(noop(NoopReason::InteractionActive));
        }
        let target = target.unwrap_or_else(|| hit_test(board, pointer.position));
        if let Some(editing) = board.edit_mode() {
            if target.block_id() == Some(editing) {
                return Ok(noop(NoopReason::EditModeActive));
            }
            board.exit_edit_mode();
        }
        self.active = Active::Pressed(PressContext {
            tracker: PressTracker::new(
                pointer.pointer_id,
                pointer.position,
                board.config().drag_threshold,
            ),
            target: target.clone(),
            modifiers: pointer.modifiers,
        });
        Ok(InteractionEffect::Pressed { target })
    }

    fn pointer_move<S: VisualSurface>(
        &mut self,
        board: &mut Board<S>,
        pointer: &PointerEvent,
    ) -> Result<InteractionEffect, InteractionError> {
        match std::mem::take(&mut self.active) {
            Active::Idle => Ok(noop(NoopReason::UnhandledEvent)),
            Active::Pressed(mut press) => {
                if press.tracker.pointer_id() != pointer.pointer_id {
                    self.active = Active::Pressed(press);
                    return Ok(noop(NoopReason::PointerMismatch));
                }
                match press.tracker.update(pointer.position) {
                    PressProgress::Pending => {
                        self.active = Active::Pressed(press);
                        Ok(noop(NoopReason::BelowThreshold))
                    }
                    PressProgress::Promoted { .. } | PressProgress::Moving { .. } => {
                        self.promote(board, press, pointer.position)
                    }
                }
            }
            Active::Dragging(mut drag) => {
                if drag.pointer_id != pointer.pointer_id {
                    self.active = Active::Dragging(drag);
                    return Ok(noop(NoopReason::PointerMismatch));
                }
                update_drag(board, &mut drag, pointer.position);
                let effect = InteractionEffect::DragPreview {
                    kind: drag.kind,
                    valid: drag.valid,
                };
                self.active = Active::Dragging(drag);
                Ok(effect)
            }
            Active::Lasso(mut lasso) => {
                if lasso.pointer_id != pointer.pointer_id {
                    self.active = Active::Lasso(lasso);
                    return Ok(noop(NoopReason::PointerMismatch));
                }
                let (rect, hits) = update_lasso(board, &mut lasso, pointer.position);
                self.active = Active::Lasso(lasso);
                Ok(InteractionEffect::LassoUpdated { rect, hits })
            }
        }
    }

    /// The press crossed the threshold: start a drag, resize, or lasso and
    /// replay the current pointer position into it.
    fn promote<S: VisualSurface>(
        &mut self,
        board: &mut Board<S>,
        press: PressContext,
        current: Point,
    ) -> Result<InteractionEffect, InteractionError> {
        if let Some(reason) = refusal(board, &press.target) {
            // The press stays armed so its release resolves as cancelled.
            self.active = Active::Pressed(press);
            return Ok(noop(reason));
        }
        let pointer_id = press.tracker.pointer_id();
        let origin = press.tracker.origin();
        match press.target {
            HitTarget::Block(id) => {
                if board.block(&id).is_none() {
                    return Err(InteractionError::UnknownBlock(id));
                }
                let mut ids = vec![id.clone()];
                if board.selection().contains(&id) {
                    for other in board.selection().iter() {
                        let movable = board.block(other).is_some_and(|b| b.movable);
                        if *other != id && movable {
                            ids.push(other.clone());
                        }
                    }
                } else {
                    board.select(&id)?;
                }
                Ok(self.start_drag(board, DragKind::Move, pointer_id, origin, &ids, current))
            }
            HitTarget::ResizeHandle(id, handle) => {
                if board.block(&id).is_none() {
                    return Err(InteractionError::UnknownBlock(id));
                }
                board.select(&id)?;
                let ids = [id];
                Ok(self.start_drag(
                    board,
                    DragKind::Resize(handle),
                    pointer_id,
                    origin,
                    &ids,
                    current,
                ))
            }
            HitTarget::Empty => {
                let additive = press.modifiers.contains(Modifiers::SHIFT);
                let base = if additive {
                    board.selection().ids().to_vec()
                } else {
                    Vec::new()
                };
                let mut lasso = LassoContext {
                    pointer_id,
                    origin,
                    additive,
                    base,
                    selected: Vec::new(),
                };
                board.emit(BoardEvent::LassoStarted { origin });
                update_lasso(board, &mut lasso, current);
                self.active = Active::Lasso(lasso);
                Ok(InteractionEffect::LassoStarted { origin })
            }
        }
    }

    fn start_drag<S: VisualSurface>(
        &mut self,
        board: &mut Board<S>,
        kind: DragKind,
        pointer_id: u32,
        origin: Point,
        ids: &[BlockId],
        current: Point,
    ) -> InteractionEffect {
        let members: Vec<DragMember> = ids
            .iter()
            .filter_map(|id| {
                board.block(id).map(|block| DragMember {
                    block_id: id.clone(),
                    position: block.grid_position,
                    size: block.grid_size,
                })
            })
            .collect();
        let mut drag = DragContext {
            kind,
            pointer_id,
            origin,
            candidate: members
                .iter()
                .map(|m| PreviewPlacement {
                    block_id: m.block_id.clone(),
                    position: m.position,
                    size: m.size,
                })
                .collect(),
            members,
            valid: true,
            outside: false,
        };
        let block_ids = drag.block_ids();
        debug!(
            target: "blockgrid.interaction",
            kind = ?kind,
            members = block_ids.len(),
            "drag started"
        );
        board.emit(BoardEvent::DragStarted {
            kind,
            block_ids: block_ids.clone(),
        });
        update_drag(board, &mut drag, current);
        self.active = Active::Dragging(drag);
        InteractionEffect::DragStarted { kind, block_ids }
    }

    fn pointer_up<S: VisualSurface>(
        &mut self,
        board: &mut Board<S>,
        pointer: &PointerEvent,
    ) -> Result<InteractionEffect, InteractionError> {
        match std::mem::take(&mut self.active) {
            Active::Idle => Ok(noop(NoopReason::UnhandledEvent)),
            Active::Pressed(press) => {
                if press.tracker.pointer_id() != pointer.pointer_id {
                    self.active = Active::Pressed(press);
                    return Ok(noop(NoopReason::PointerMismatch));
                }
                // A promoted press only stays here when its target refused the drag.
                if let PressResolution::DragEnd { .. } = press.tracker.release(pointer.position) {
                    return Ok(InteractionEffect::PressCancelled);
                }
                let additive = press
                    .modifiers
                    .intersects(Modifiers::SHIFT | Modifiers::CTRL | Modifiers::SUPER);
                match press.target.block_id() {
                    Some(id) if additive => board.toggle_selection(id)?,
                    Some(id) => board.select(id)?,
                    None if !additive => board.clear_selection(),
                    None => {}
                }
                Ok(InteractionEffect::Clicked {
                    target: press.target,
                })
            }
            Active::Dragging(drag) => {
                if drag.pointer_id != pointer.pointer_id {
                    self.active = Active::Dragging(drag);
                    return Ok(noop(NoopReason::PointerMismatch));
                }
                Ok(finish_drag(board, drag))
            }
            Active::Lasso(lasso) => {
                if lasso.pointer_id != pointer.pointer_id {
                    self.active = Active::Lasso(lasso);
                    return Ok(noop(NoopReason::PointerMismatch));
                }
                board.set_selection(lasso.selected.iter().cloned());
                let selected = board.selection().ids().to_vec();
                let count = selected.len();
                board.emit(BoardEvent::LassoEnded { selected });
                Ok(InteractionEffect::LassoEnded { selected: count })
            }
        }
    }

    fn cancel_pointer<S: VisualSurface>(
        &mut self,
        board: &mut Board<S>,
        pointer_id: u32,
    ) -> InteractionEffect {
        let owner = match &self.active {
            Active::Idle => return noop(NoopReason::UnhandledEvent),
            Active::Pressed(press) => press.tracker.pointer_id(),
            Active::Dragging(drag) => drag.pointer_id,
            Active::Lasso(lasso) => lasso.pointer_id,
        };
        if owner != pointer_id {
            return noop(NoopReason::PointerMismatch);
        }
        self.cancel(board)
    }

    fn cancel<S: VisualSurface>(&mut self, board: &mut Board<S>) -> InteractionEffect {
        match std::mem::take(&mut self.active) {
            Active::Idle => noop(NoopReason::UnhandledEvent),
            Active::Pressed(_) => InteractionEffect::PressCancelled,
            Active::Dragging(drag) => {
                let block_ids = drag.block_ids();
                board.animate_back(&block_ids);
                debug!(target: "blockgrid.interaction", kind = ?drag.kind, "drag cancelled");
                board.emit(BoardEvent::DragCancelled {
                    kind: drag.kind,
                    block_ids,
                });
                InteractionEffect::DragCancelled { kind: drag.kind }
            }
            Active::Lasso(_) => {
                board.emit(BoardEvent::LassoCancelled);
                InteractionEffect::LassoCancelled
            }
        }
    }

    // ------------------------------------------------------------------
    // Keyboard
    // ------------------------------------------------------------------

    fn key<S: VisualSurface>(
        &mut self,
        board: &mut Board<S>,
        key: &KeyEvent,
    ) -> Result<InteractionEffect, InteractionError> {
        if self.is_active() {
            return Ok(if key.code == KeyCode::Escape {
                self.cancel(board)
            } else {
                noop(NoopReason::InteractionActive)
            });
        }
        if key.code == KeyCode::Escape {
            if board.exit_edit_mode().is_some() {
                return Ok(key_action(KeyAction::ExitEditMode));
            }
            if board.selection().is_empty() {
                return Ok(noop(NoopReason::NothingSelected));
            }
            board.clear_selection();
            return Ok(key_action(KeyAction::ClearSelection));
        }
        if board.edit_mode().is_some() {
            return Ok(noop(NoopReason::EditModeActive));
        }

        if key.command() {
            if key.is_char('a') {
                board.select_all();
                return Ok(key_action(KeyAction::SelectAll));
            }
            if (key.is_char('z') && key.shift()) || key.is_char('y') {
                let applied = board.redo()?;
                return Ok(key_action(KeyAction::Redo { applied }));
            }
            if key.is_char('z') {
                let applied = board.undo()?;
                return Ok(key_action(KeyAction::Undo { applied }));
            }
            return Ok(noop(NoopReason::UnhandledEvent));
        }

        match key.code {
            KeyCode::Up => nudge(board, 0, -1),
            KeyCode::Down => nudge(board, 0, 1),
            KeyCode::Left => nudge(board, -1, 0),
            KeyCode::Right => nudge(board, 1, 0),
            KeyCode::Delete | KeyCode::Backspace => {
                if !board.config().keyboard_delete {
                    return Ok(noop(NoopReason::KeyboardDisabled));
                }
                let ids = board.selection().ids().to_vec();
                if ids.is_empty() {
                    return Ok(noop(NoopReason::NothingSelected));
                }
                let removed = board.remove_blocks_labeled(&ids, "delete")?.len();
                Ok(key_action(KeyAction::Delete { removed }))
            }
            KeyCode::Tab if key.shift() => Ok(focus_step(board, false)),
            KeyCode::Tab => Ok(focus_step(board, true)),
            KeyCode::BackTab => Ok(focus_step(board, false)),
            KeyCode::Enter => {
                let Some(primary) = board.selection().primary().cloned() else {
                    return Ok(noop(NoopReason::NothingSelected));
                };
                board.enter_edit_mode(&primary)?;
                Ok(key_action(KeyAction::EnterEditMode))
            }
            _ => Ok(noop(NoopReason::UnhandledEvent)),
        }
    }
}

/// Why a press that crossed the threshold cannot start anything.
fn refusal<S: VisualSurface>(board: &Board<S>, target: &HitTarget) -> Option<NoopReason> {
    match target {
        HitTarget::Block(id) => board
            .block(id)
            .filter(|block| !block.movable)
            .map(|_| NoopReason::NotMovable),
        HitTarget::ResizeHandle(id, _) => board
            .block(id)
            .filter(|block| !block.resizable)
            .map(|_| NoopReason::NotResizable),
        HitTarget::Empty => (!board.config().lasso_selection).then_some(NoopReason::LassoDisabled),
    }
}

const fn noop(reason: NoopReason) -> InteractionEffect {
    InteractionEffect::Noop { reason }
}

const fn key_action(action: KeyAction) -> InteractionEffect {
    InteractionEffect::Key { action }
}

// ----------------------------------------------------------------------
// Drag preview & drop
// ----------------------------------------------------------------------

fn update_drag<S: VisualSurface>(board: &mut Board<S>, drag: &mut DragContext, point: Point) {
    match drag.kind {
        DragKind::Move => preview_move(board, drag, point),
        DragKind::Resize(handle) => preview_resize(board, drag, handle, point),
    }
    board.emit(BoardEvent::DragUpdated {
        kind: drag.kind,
        preview: drag.candidate.clone(),
        valid: drag.valid,
    });
}

fn preview_move<S: VisualSurface>(board: &mut Board<S>, drag: &mut DragContext, point: Point) {
    let Some(primary) = drag.members.first() else {
        return;
    };
    let (dx, dy) = point.delta_from(drag.origin);
    let container = *board.container();
    let bounds = board.placement_bounds();
    let (columns, rows) = bounds.grid_delta(dx, dy, &container);
    let target = bounds.clamp_position(primary.position.shifted(columns, rows), primary.size);
    let (columns, rows) = target.delta_from(primary.position);

    let mut in_range = true;
    drag.candidate.clear();
    for member in &drag.members {
        let column = i32::from(member.position.column) + columns;
        let row = i32::from(member.position.row) + rows;
        let position = member.position.shifted(columns, rows);
        in_range &= column >= 1 && row >= 1 && bounds.is_valid_position(position, member.size);
        drag.candidate.push(PreviewPlacement {
            block_id: member.block_id.clone(),
            position,
            size: member.size,
        });
    }

    drag.outside = board.config().drag_out && !container.contains(point);
    drag.valid = if drag.outside {
        true
    } else if !in_range {
        false
    } else if let [single] = drag.candidate.as_slice() {
        board
            .plan_reflow(&single.block_id, single.position, single.size)
            .is_ok()
    } else {
        board.plan(&candidate_changes(&drag.candidate)).is_ok()
    };

    for member in &drag.members {
        board.show_preview_offset(&member.block_id, dx, dy);
    }
}

fn preview_resize<S: VisualSurface>(
    board: &mut Board<S>,
    drag: &mut DragContext,
    handle: ResizeHandle,
    point: Point,
) {
    let Some(member) = drag.members.first() else {
        return;
    };
    let Some(constraints) = board.block(&member.block_id).map(|b| b.constraints) else {
        drag.valid = false;
        return;
    };
    let (dx, dy) = point.delta_from(drag.origin);
    let container = *board.container();
    let bounds = board.placement_bounds();
    let grid = *bounds.config();
    let (columns, rows) = bounds.grid_delta(dx, dy, &container);

    let max_column = i32::from(grid.columns.max(1));
    let max_row = grid.rows.map_or(i32::from(u16::MAX), i32::from);
    let mut left = i32::from(member.position.column);
    let mut top = i32::from(member.position.row);
    let mut right = left + i32::from(member.size.column_span) - 1;
    let mut bottom = top + i32::from(member.size.row_span) - 1;
    if handle.moves_west() {
        left = (left + columns).clamp(1, right);
    }
    if handle.moves_east() {
        right = (right + columns).clamp(left, max_column);
    }
    if handle.moves_north() {
        top = (top + rows).clamp(1, bottom);
    }
    if handle.moves_south() {
        bottom = (bottom + rows).clamp(top, max_row);
    }

    let raw = GridSize::new(to_span(right - left + 1), to_span(bottom - top + 1));
    let size = constraints.clamp(raw, &grid);
    // Keep the edge opposite the handle fixed.
    if handle.moves_west() {
        left = right - i32::from(size.column_span) + 1;
    }
    if handle.moves_north() {
        top = bottom - i32::from(size.row_span) + 1;
    }
    let position = bounds.clamp_position(
        GridPosition::new(to_span(left), to_span(top)).with_z_index(member.position.z_index),
        size,
    );

    drag.candidate.clear();
    drag.candidate.push(PreviewPlacement {
        block_id: member.block_id.clone(),
        position,
        size,
    });
    drag.outside = false;
    drag.valid = board
        .plan(&[ProposedChange::place(member.block_id.clone(), position, size)])
        .is_ok();

    let rect = board.coords().block_rect(position, size, &container);
    board.show_preview_rect(&member.block_id, rect);
}

fn to_span(value: i32) -> u16 {
    value.clamp(1, i32::from(u16::MAX)) as u16
}

fn candidate_changes(candidate: &[PreviewPlacement]) -> Vec<ProposedChange> {
    candidate
        .iter()
        .map(|p| ProposedChange::place(p.block_id.clone(), p.position, p.size))
        .collect()
}

fn finish_drag<S: VisualSurface>(board: &mut Board<S>, drag: DragContext) -> InteractionEffect {
    let kind = drag.kind;
    let block_ids = drag.block_ids();

    if drag.outside {
        let dropped = board.remove_blocks_labeled(&block_ids, "drag-out");
        let committed = dropped.is_ok();
        if let Err(err) = dropped {
            debug!(target: "blockgrid.interaction", %err, "drag-out rejected");
            board.animate_back(&block_ids);
        }
        board.emit(BoardEvent::DragEnded {
            kind,
            block_ids,
            committed,
            dropped_out: committed,
        });
        return InteractionEffect::Dropped {
            kind,
            committed,
            dropped_out: committed,
        };
    }

    let committed = drag.valid && commit_candidate(board, &drag);
    if !committed {
        board.animate_back(&block_ids);
    }
    debug!(
        target: "blockgrid.interaction",
        kind = ?kind,
        committed,
        members = block_ids.len(),
        "drag ended"
    );
    board.emit(BoardEvent::DragEnded {
        kind,
        block_ids,
        committed,
        dropped_out: false,
    });
    InteractionEffect::Dropped {
        kind,
        committed,
        dropped_out: false,
    }
}

/// Commit the final candidate. Returns whether anything changed.
fn commit_candidate<S: VisualSurface>(board: &mut Board<S>, drag: &DragContext) -> bool {
    let result = match (drag.kind, drag.candidate.as_slice()) {
        (DragKind::Resize(_), [single]) => board
            .plan(&[ProposedChange::place(
                single.block_id.clone(),
                single.position,
                single.size,
            )])
            .and_then(|plan| board.commit_labeled(plan, VisualMode::None, "resize")),
        (DragKind::Move, [single]) => {
            board.place_with_reflow(&single.block_id, single.position, single.size)
        }
        (_, candidate) => board
            .plan(&candidate_changes(candidate))
            .and_then(|plan| board.commit_labeled(plan, VisualMode::Flip, "move")),
    };
    match result {
        Ok(summary) => summary.moved + summary.resized > 0,
        Err(err) => {
            debug!(target: "blockgrid.interaction", %err, "drop rejected");
            false
        }
    }
}

fn update_lasso<S: VisualSurface>(
    board: &mut Board<S>,
    lasso: &mut LassoContext,
    point: Point,
) -> (PixelRect, usize) {
    let rect = PixelRect::from_corners(lasso.origin, point);
    let hits = board.blocks_in_rect(&rect);
    let hit_count = hits.len();
    lasso.selected = if lasso.additive {
        let mut selected = lasso.base.clone();
        for id in &hits {
            if !selected.contains(id) {
                selected.push(id.clone());
            }
        }
        selected
    } else {
        hits.clone()
    };
    board.emit(BoardEvent::LassoUpdated { rect, hits });
    (rect, hit_count)
}

// ----------------------------------------------------------------------
// Keyboard helpers
// ----------------------------------------------------------------------

fn nudge<S: VisualSurface>(
    board: &mut Board<S>,
    columns: i32,
    rows: i32,
) -> Result<InteractionEffect, InteractionError> {
    if !board.config().keyboard_move {
        return Ok(noop(NoopReason::KeyboardDisabled));
    }
    let members: Vec<&Block> = board
        .selection()
        .iter()
        .filter_map(|id| board.block(id))
        .filter(|block| block.movable)
        .collect();
    if members.is_empty() {
        return Ok(noop(NoopReason::NothingSelected));
    }
    // The whole group moves by the step its most constrained member allows.
    let grid = *board.placement_bounds().config();
    let step_columns = group_step(
        columns,
        members
            .iter()
            .map(|b| (b.grid_position.column, b.grid_size.column_span)),
        Some(grid.columns),
    );
    let step_rows = group_step(
        rows,
        members
            .iter()
            .map(|b| (b.grid_position.row, b.grid_size.row_span)),
        grid.rows,
    );
    let changes: Vec<ProposedChange> = members
        .iter()
        .map(|block| {
            ProposedChange::move_to(
                block.id.clone(),
                block.grid_position.shifted(step_columns, step_rows),
            )
        })
        .collect();
    let moved = match board.plan(&changes) {
        Ok(plan) => board.commit_labeled(plan, VisualMode::Flip, "nudge")?.moved,
        Err(BoardError::UnknownBlock(id)) => return Err(InteractionError::UnknownBlock(id)),
        Err(err) => {
            debug!(target: "blockgrid.interaction", %err, "nudge rejected");
            0
        }
    };
    Ok(key_action(KeyAction::Nudge {
        columns,
        rows,
        moved,
    }))
}

/// Largest part of `step` every `(start, span)` range can take without
/// leaving `1..=limit`.
fn group_step(step: i32, ranges: impl Iterator<Item = (u16, u16)>, limit: Option<u16>) -> i32 {
    let allowed = ranges.fold(step, |step, (start, span)| {
        let start = i32::from(start);
        if step < 0 {
            step.max(1 - start)
        } else if let Some(limit) = limit {
            step.min(i32::from(limit) - (start + i32::from(span) - 1))
        } else {
            step
        }
    });
    allowed.clamp(step.min(0), step.max(0))
}

/// Move the selection anchor to the next or previous block in reading order.
///
/// With several blocks selected the anchor cycles inside the selection and
/// the selection itself is kept. Otherwise focus walks every block.
fn focus_step<S: VisualSurface>(board: &mut Board<S>, forward: bool) -> InteractionEffect {
    let within_selection = board.selection().len() > 1;
    let mut order: Vec<&Block> = board
        .blocks()
        .iter()
        .filter(|block| !within_selection || board.selection().contains(&block.id))
        .collect();
    if order.is_empty() {
        return noop(NoopReason::NothingSelected);
    }
    order.sort_by(|a, b| a.reading_order_key().cmp(&b.reading_order_key()));
    let current = board
        .selection()
        .primary()
        .and_then(|primary| order.iter().position(|block| &block.id == primary));
    let len = order.len();
    let next = match (current, forward) {
        (None, true) => 0,
        (None, false) => len - 1,
        (Some(i), true) => (i + 1) % len,
        (Some(i), false) => (i + len - 1) % len,
    };
    let id = order[next].id.clone();
    if within_selection {
        board.set_primary(&id);
    } else {
        board.set_selection([id]);
    }
    key_action(if forward {
        KeyAction::FocusNext
    } else {
        KeyAction::FocusPrevious
    })
}
