#![forbid(unsafe_code)]

//! Layout: grid coordinates, block records, and the solvers that move them.
//!
//! # Role in BlockGrid
//! `blockgrid-layout` is the pure-data half of the board. It converts pixel
//! positions into 1-based grid cells, keeps the cell-bucket collision index,
//! and plans reflow and auto-arrange relocations. Nothing here mutates a
//! board; every solver returns a plan.
//!
//! # Primary responsibilities
//! - **Grid**: [`GridConfig`], [`GridCoordinateSystem`], first-fit search.
//! - **Blocks**: [`Block`], [`BlockId`], [`SizeConstraints`].
//! - **Spatial index**: [`SpatialIndex`] for sub-linear collision queries.
//! - **Reflow**: [`ReflowEngine`] with push-away, smart-fill, and axis-shift.
//! - **Arrange**: [`arrange()`] with four packing strategies.
//!
//! # How it fits in the system
//! `blockgrid-runtime` owns a block list plus a [`SpatialIndex`] and asks
//! these solvers for plans before committing them through its transaction
//! layer.

pub mod arrange;
pub mod block;
pub mod grid;
pub mod reflow;
pub mod spatial;

pub use arrange::{ArrangeStrategy, arrange};
pub use blockgrid_core::geometry::{ContainerBox, PixelRect, Point, Sides};
pub use block::{Block, BlockId, SizeConstraints};
pub use grid::{
    DEFAULT_SCAN_ROWS, Footprint, GridCell, GridConfig, GridConfigError, GridCoordinateSystem,
    GridPosition, GridSize, ScanOrder,
};
pub use reflow::{ReflowEngine, ReflowError, ReflowMode, ReflowPlan, Relocation, apply_plan};
pub use spatial::SpatialIndex;
