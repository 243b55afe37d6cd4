#![forbid(unsafe_code)]

//! Operation errors for the board.
//!
//! Placement problems are reported as data through
//! [`ValidationReport`](crate::validation::ValidationReport); a
//! [`BoardError`] means the operation itself could not run (unknown id,
//! stale plan, rejected document, ...).

use std::fmt;

use blockgrid_layout::{BlockId, GridConfigError, ReflowError};

use crate::document::DocumentError;
use crate::history::HistoryError;
use crate::transaction::PlanRejection;
use crate::validation::ValidationReport;

/// Board operation failure.
#[derive(Debug)]
pub enum BoardError {
    /// No block with this id.
    UnknownBlock(BlockId),
    /// An add used an id that is already on the board.
    DuplicateId(BlockId),
    /// The type registry has no handler for this tag.
    UnknownBlockType(String),
    /// The placement failed validation.
    InvalidPlacement(ValidationReport),
    /// A transaction plan could not be built.
    Rejected(PlanRejection),
    /// A plan was built against an older board revision.
    StalePlan { planned: u64, current: u64 },
    /// Reflow could not make room.
    Reflow(ReflowError),
    /// Grid configuration rejected.
    Grid(GridConfigError),
    /// Board configuration failed validation.
    InvalidConfig(Vec<String>),
    /// Undo/redo replay failed.
    History(HistoryError),
    /// Import/export failed.
    Document(DocumentError),
    /// A batch member panicked.
    Panicked(String),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBlock(id) => write!(f, "block '{id}' not found"),
            Self::DuplicateId(id) => write!(f, "block id '{id}' already exists"),
            Self::UnknownBlockType(tag) => write!(f, "no handler registered for type '{tag}'"),
            Self::InvalidPlacement(report) => write!(f, "invalid placement: {report}"),
            Self::Rejected(rejection) => write!(f, "transaction rejected: {rejection}"),
            Self::StalePlan { planned, current } => write!(
                f,
                "plan built at revision {planned} but board is at revision {current}"
            ),
            Self::Reflow(err) => write!(f, "reflow failed: {err}"),
            Self::Grid(err) => write!(f, "invalid grid: {err}"),
            Self::InvalidConfig(errors) => write!(f, "invalid config: {}", errors.join("; ")),
            Self::History(err) => write!(f, "history: {err}"),
            Self::Document(err) => write!(f, "document: {err}"),
            Self::Panicked(msg) => write!(f, "operation panicked: {msg}"),
        }
    }
}

impl std::error::Error for BoardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rejected(err) => Some(err),
            Self::Reflow(err) => Some(err),
            Self::Grid(err) => Some(err),
            Self::History(err) => Some(err),
            Self::Document(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PlanRejection> for BoardError {
    fn from(value: PlanRejection) -> Self {
        match value {
            PlanRejection::UnknownBlock { block_id } => Self::UnknownBlock(block_id),
            PlanRejection::Invalid(report) => Self::InvalidPlacement(report),
            other => Self::Rejected(other),
        }
    }
}

impl From<ReflowError> for BoardError {
    fn from(value: ReflowError) -> Self {
        match value {
            ReflowError::UnknownAnchor { anchor } => Self::UnknownBlock(anchor),
            other => Self::Reflow(other),
        }
    }
}

impl From<GridConfigError> for BoardError {
    fn from(value: GridConfigError) -> Self {
        Self::Grid(value)
    }
}

impl From<HistoryError> for BoardError {
    fn from(value: HistoryError) -> Self {
        Self::History(value)
    }
}

impl From<DocumentError> for BoardError {
    fn from(value: DocumentError) -> Self {
        Self::Document(value)
    }
}

/// Render a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
