#![forbid(unsafe_code)]

//! BlockGrid Runtime
//!
//! The stateful half of BlockGrid: a [`Board`] that owns the block set and
//! its spatial index, and every path that changes them.
//!
//! # Key Components
//!
//! - [`Board`] - block set, selection, edit mode, and all structural operations
//! - [`TransactionPlan`] - validated change set committed atomically
//! - [`BoardHistory`] - bounded undo/redo of grouped commands
//! - [`InteractionMachine`] - pointer/keyboard state machine driving a board
//! - [`FlipAnimator`] / [`VisualSurface`] - cosmetic transitions over a host surface
//! - [`BoardConfig`] - serde-loadable options (TOML or JSON)
//! - [`TaskScheduler`] - bulk task runner with per-task timeouts
//!
//! # How it fits in the system
//! `blockgrid-core` supplies input events and pixel geometry,
//! `blockgrid-layout` supplies grid math and pure solvers. The runtime turns
//! their plans into committed state, records history, and notifies
//! subscribers through [`BoardEvent`]. Rendering stays with the host, behind
//! [`VisualSurface`] and [`BlockRenderer`].

pub mod batch;
pub mod board;
pub mod cancellation;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod flip;
pub mod history;
pub mod interaction;
pub mod registry;
pub mod scheduler;
pub mod selection;
pub mod transaction;
pub mod validation;

pub use batch::{BatchOperation, BatchOutcome, BatchStrategy, MemberResult};
pub use board::{BlockSpec, BlockUpdate, Board};
pub use cancellation::{CancellationSource, CancellationToken, Cancelled};
pub use config::{BoardConfig, ConfigError};
pub use document::{BoardDocument, DOCUMENT_VERSION, DocumentError};
pub use error::BoardError;
pub use events::{BoardEvent, EventBus, PreviewPlacement, Subscription};
pub use flip::{FlipAnimator, LayoutSurface, VisualSurface, VisualTransform};
pub use history::{BoardCommand, BoardHistory, HistoryEntry, HistoryError};
pub use interaction::{
    DragKind, HitTarget, InteractionEffect, InteractionError, InteractionMachine,
    InteractionState, InteractionTransition, KeyAction, NoopReason, ResizeHandle, hit_test,
};
pub use registry::{BlockRenderer, BlockTypeHandler, BlockTypeRegistry, SimpleBlockType};
pub use scheduler::{SchedulerMode, Task, TaskOutcome, TaskScheduler};
pub use selection::SelectionSet;
pub use transaction::{
    CommitSummary, PlanRejection, PlannedChange, ProposedChange, TransactionPlan, VisualMode,
};
pub use validation::{
    Placement, PlacementContext, PlacementRule, RuleVerdict, ValidationIssue, ValidationReport,
};
