#![forbid(unsafe_code)]

//! Linear undo/redo history for structural board changes.
//!
//! Every board mutation is expressed as a [`BoardCommand`]. Applying a command
//! yields its inverse, so a [`HistoryEntry`] stores the forward commands (for
//! redo) and their inverses (for undo, replayed in reverse order).
//!
//! # Invariants
//!
//! 1. `cursor <= entries.len()`; entries before the cursor are undoable,
//!    entries at or after it are redoable.
//! 2. `entries.len() <= limit` after any push.
//! 3. Pushing after an undo truncates the redo tail.
//!
//! ```text
//! push(e5)             entries: [e1 e2 e3 e4 e5]   cursor = 5
//! undo() x2            entries: [e1 e2 e3|e4 e5]   cursor = 3
//! push(e6)             entries: [e1 e2 e3 e6]      cursor = 4
//! ```

use std::fmt;

use blockgrid_layout::{Block, BlockId, GridPosition, GridSize};
use serde_json::Value;

/// One reversible structural mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardCommand {
    /// Insert `block` at `index` in board order.
    Insert { block: Block, index: usize },
    Remove { block_id: BlockId },
    /// Set position and size.
    Place {
        block_id: BlockId,
        position: GridPosition,
        size: GridSize,
    },
    SetAttributes { block_id: BlockId, attributes: Value },
    SetFlags {
        block_id: BlockId,
        movable: bool,
        resizable: bool,
    },
    /// Change the grid's row limit.
    SetRows { rows: Option<u16> },
}

impl BoardCommand {
    /// Block this command targets, if any.
    pub fn block_id(&self) -> Option<&BlockId> {
        match self {
            Self::Insert { block, .. } => Some(&block.id),
            Self::Remove { block_id }
            | Self::Place { block_id, .. }
            | Self::SetAttributes { block_id, .. }
            | Self::SetFlags { block_id, .. } => Some(block_id),
            Self::SetRows { .. } => None,
        }
    }
}

/// A group of commands undone/redone as one step.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub label: String,
    pub forward: Vec<BoardCommand>,
    /// Inverses in application order; undo replays them reversed.
    pub inverse: Vec<BoardCommand>,
}

impl HistoryEntry {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            forward: Vec::new(),
            inverse: Vec::new(),
        }
    }

    /// Record one applied command and its inverse.
    pub fn record(&mut self, forward: BoardCommand, inverse: BoardCommand) {
        self.forward.push(forward);
        self.inverse.push(inverse);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Commands that undo this entry, in the order they must run.
    pub fn undo_commands(&self) -> impl Iterator<Item = &BoardCommand> {
        self.inverse.iter().rev()
    }
}

/// History replay failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// A replayed command no longer applies; the board was left where replay
    /// stopped and the entry was dropped.
    ReplayFailed { label: String, reason: String },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplayFailed { label, reason } => {
                write!(f, "replaying '{label}' failed: {reason}")
            }
        }
    }
}

impl std::error::Error for HistoryError {}

/// Capped, cursor-based history.
#[derive(Debug, Clone)]
pub struct BoardHistory {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    limit: usize,
}

impl Default for BoardHistory {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_HISTORY_LIMIT)
    }
}

impl BoardHistory {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Record an applied entry. Empty entries are ignored.
    pub fn push(&mut self, entry: HistoryEntry) {
        if entry.is_empty() {
            return;
        }
        self.entries.truncate(self.cursor);
        self.entries.push(entry);
        if self.entries.len() > self.limit {
            let overflow = self.entries.len() - self.limit;
            self.entries.drain(..overflow);
        }
        self.cursor = self.entries.len();
    }

    /// Step back; returns the entry to undo.
    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// Step forward; returns the entry to redo.
    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        let entry = self.entries.get(self.cursor)?;
        self.cursor += 1;
        Some(entry)
    }

    /// Drop the entry that just failed to replay and everything after it.
    pub(crate) fn discard_from(&mut self, index: usize) {
        self.entries.truncate(index);
        self.cursor = self.cursor.min(self.entries.len());
    }

    #[inline]
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[inline]
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Change the cap, evicting the oldest entries if needed.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        if self.entries.len() > self.limit {
            let overflow = self.entries.len() - self.limit;
            self.entries.drain(..overflow);
            self.cursor = self.cursor.saturating_sub(overflow);
        }
    }

    /// Label of the next undo step.
    pub fn next_undo_label(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(|entry| entry.label.as_str())
    }

    /// Label of the next redo step.
    pub fn next_redo_label(&self) -> Option<&str> {
        self.entries
            .get(self.cursor)
            .map(|entry| entry.label.as_str())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}
