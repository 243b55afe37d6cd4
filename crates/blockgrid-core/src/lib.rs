#![forbid(unsafe_code)]

//! Core: pixel geometry, canonical input events, and gesture thresholds.
//!
//! # Role in BlockGrid
//! `blockgrid-core` is the input layer. It owns the pixel-space primitives a
//! host surface reports (pointer positions, container boxes, element bounds)
//! and the normalized pointer/keyboard events the interaction machine in
//! `blockgrid-runtime` consumes.
//!
//! # Primary responsibilities
//! - **Geometry**: [`geometry::Point`], [`geometry::PixelRect`],
//!   [`geometry::Sides`], and [`geometry::ContainerBox`].
//! - **Event**: canonical pointer, keyboard, and focus events.
//! - **Gesture**: click-vs-drag disambiguation thresholds.
//!
//! # How it fits in the system
//! The layout crate (`blockgrid-layout`) converts pixel geometry into grid
//! cells; the runtime crate drives the board from `blockgrid-core::event`
//! values. Nothing here knows about blocks or grids.

pub mod event;
pub mod geometry;
pub mod gesture;
