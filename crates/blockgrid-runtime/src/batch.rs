#![forbid(unsafe_code)]

//! Batched board operations with selectable failure semantics.
//!
//! A batch is a list of [`BatchOperation`]s executed in order by
//! `Board::apply_batch`. Each member runs in isolation: an error or a panic
//! inside one member becomes a [`MemberResult::Failed`] instead of aborting
//! the caller.
//!
//! | Strategy | On member failure |
//! |----------|-------------------|
//! | `AllOrNothing` | Undo every applied member in reverse order; later members are skipped. |
//! | `BestEffort` | Record a warning and continue. |
//! | `FailFast` | Stop; applied members stand, later members are skipped. |
//!
//! Whatever survives is recorded as a single history entry.

use blockgrid_layout::{BlockId, GridPosition, GridSize};
use serde::{Deserialize, Serialize};

use crate::board::{BlockSpec, BlockUpdate};

/// Failure semantics for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchStrategy {
    #[default]
    AllOrNothing,
    BestEffort,
    FailFast,
}

impl BatchStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllOrNothing => "all-or-nothing",
            Self::BestEffort => "best-effort",
            Self::FailFast => "fail-fast",
        }
    }
}

/// One member of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOperation {
    Add(BlockSpec),
    Remove(BlockId),
    Move {
        block_id: BlockId,
        position: GridPosition,
    },
    Resize {
        block_id: BlockId,
        size: GridSize,
    },
    Update {
        block_id: BlockId,
        update: BlockUpdate,
    },
}

impl BatchOperation {
    /// Short verb used in logs and warnings.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Remove(_) => "remove",
            Self::Move { .. } => "move",
            Self::Resize { .. } => "resize",
            Self::Update { .. } => "update",
        }
    }
}

/// What happened to one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberResult {
    Applied,
    Failed(String),
    /// Not attempted, or undone by an all-or-nothing rollback.
    Skipped,
}

impl MemberResult {
    #[inline]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    #[inline]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Result of a batch, one entry per member in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub strategy: BatchStrategy,
    pub results: Vec<MemberResult>,
    /// True when an all-or-nothing batch undid its applied members.
    pub rolled_back: bool,
    pub warnings: Vec<String>,
}

impl BatchOutcome {
    pub(crate) fn new(strategy: BatchStrategy, len: usize) -> Self {
        Self {
            strategy,
            results: vec![MemberResult::Skipped; len],
            rolled_back: false,
            warnings: Vec::new(),
        }
    }

    pub fn applied_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_applied()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    /// Every member applied.
    pub fn is_success(&self) -> bool {
        self.results.iter().all(MemberResult::is_applied)
    }
}
