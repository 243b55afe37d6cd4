#![forbid(unsafe_code)]

//! Board notifications.
//!
//! Every observable change is a [`BoardEvent`] delivered to the board's
//! subscribers in registration order. Notifications are best-effort: they are
//! emitted as mutations land and carry no transactional guarantee.
//!
//! # Failure Modes
//!
//! - **Re-entrant mutation**: subscribers receive `&BoardEvent` while the
//!   board is mutably borrowed, so they cannot call back into it. Queue work
//!   and apply it after the board call returns.
//! - **Subscriber leak**: dropping the [`Subscription`] guard unsubscribes.
//!   Dead entries are pruned lazily during emit.

use std::rc::{Rc, Weak};

use blockgrid_core::geometry::{PixelRect, Point};
use blockgrid_layout::{ArrangeStrategy, Block, BlockId, GridPosition, GridSize};

use crate::interaction::DragKind;

/// A block's footprint in a drag preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewPlacement {
    pub block_id: BlockId,
    pub position: GridPosition,
    pub size: GridSize,
}

/// Closed set of board notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    BlockAdded {
        block: Block,
    },
    BlockRemoved {
        block: Block,
    },
    /// Attributes or flags changed.
    BlockUpdated {
        block_id: BlockId,
    },
    BlockMoved {
        block_id: BlockId,
        from: GridPosition,
        to: GridPosition,
    },
    BlockResized {
        block_id: BlockId,
        from: GridSize,
        to: GridSize,
    },
    SelectionChanged {
        selected: Vec<BlockId>,
        primary: Option<BlockId>,
    },
    DragStarted {
        kind: DragKind,
        block_ids: Vec<BlockId>,
    },
    /// Non-mutating preview of where the dragged blocks would land.
    DragUpdated {
        kind: DragKind,
        preview: Vec<PreviewPlacement>,
        valid: bool,
    },
    DragEnded {
        kind: DragKind,
        block_ids: Vec<BlockId>,
        committed: bool,
        /// Members removed by dropping outside the container.
        dropped_out: bool,
    },
    DragCancelled {
        kind: DragKind,
        block_ids: Vec<BlockId>,
    },
    LassoStarted {
        origin: Point,
    },
    LassoUpdated {
        rect: PixelRect,
        hits: Vec<BlockId>,
    },
    LassoEnded {
        selected: Vec<BlockId>,
    },
    LassoCancelled,
    EditModeEntered {
        block_id: BlockId,
    },
    EditModeExited {
        block_id: BlockId,
    },
    HistoryChanged {
        can_undo: bool,
        can_redo: bool,
    },
    DocumentImported {
        block_count: usize,
    },
    LayoutArranged {
        strategy: ArrangeStrategy,
        moved: usize,
    },
}

impl BoardEvent {
    /// Wire name, e.g. `block:moved`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BlockAdded { .. } => "block:added",
            Self::BlockRemoved { .. } => "block:removed",
            Self::BlockUpdated { .. } => "block:updated",
            Self::BlockMoved { .. } => "block:moved",
            Self::BlockResized { .. } => "block:resized",
            Self::SelectionChanged { .. } => "selection:changed",
            Self::DragStarted { .. } => "drag:started",
            Self::DragUpdated { .. } => "drag:updated",
            Self::DragEnded { .. } => "drag:ended",
            Self::DragCancelled { .. } => "drag:cancelled",
            Self::LassoStarted { .. } => "lasso:started",
            Self::LassoUpdated { .. } => "lasso:updated",
            Self::LassoEnded { .. } => "lasso:ended",
            Self::LassoCancelled => "lasso:cancelled",
            Self::EditModeEntered { .. } => "editMode:entered",
            Self::EditModeExited { .. } => "editMode:exited",
            Self::HistoryChanged { .. } => "history:changed",
            Self::DocumentImported { .. } => "document:imported",
            Self::LayoutArranged { .. } => "layout:arranged",
        }
    }
}

type Callback = Rc<dyn Fn(&BoardEvent)>;

/// RAII guard for a subscriber; dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    _callback: Callback,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Ordered subscriber list.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Weak<dyn Fn(&BoardEvent)>>,
    emitted: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .field("emitted", &self.emitted)
            .finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback.
    pub fn subscribe(&mut self, callback: impl Fn(&BoardEvent) + 'static) -> Subscription {
        let callback: Callback = Rc::new(callback);
        self.subscribers.push(Rc::downgrade(&callback));
        Subscription {
            _callback: callback,
        }
    }

    /// Deliver an event to every live subscriber.
    pub fn emit(&mut self, event: &BoardEvent) {
        self.emitted = self.emitted.saturating_add(1);
        tracing::trace!(target: "blockgrid.events", event = event.name(), "emit");
        self.subscribers.retain(|weak| match weak.upgrade() {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        });
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Total events emitted.
    #[inline]
    pub const fn emitted(&self) -> u64 {
        self.emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn delivers_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let first = Rc::clone(&log);
        let _a = bus.subscribe(move |event| first.borrow_mut().push(format!("a:{}", event.name())));
        let second = Rc::clone(&log);
        let _b = bus.subscribe(move |event| second.borrow_mut().push(format!("b:{}", event.name())));
        bus.emit(&BoardEvent::LassoCancelled);
        assert_eq!(*log.borrow(), ["a:lasso:cancelled", "b:lasso:cancelled"]);
        assert_eq!(bus.emitted(), 1);
    }

    #[test]
    fn dropping_guard_unsubscribes() {
        let hits = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        let counter = Rc::clone(&hits);
        let guard = bus.subscribe(move |_| *counter.borrow_mut() += 1);
        bus.emit(&BoardEvent::LassoCancelled);
        drop(guard);
        bus.emit(&BoardEvent::LassoCancelled);
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn names_are_namespaced() {
        assert_eq!(
            BoardEvent::HistoryChanged {
                can_undo: true,
                can_redo: false
            }
            .name(),
            "history:changed"
        );
        assert_eq!(
            BoardEvent::DocumentImported { block_count: 0 }.name(),
            "document:imported"
        );
    }
}
