//! Powerscope Drag
//!
//! Direct manipulation of the confidence interval plot.
//!
//! Three markers can be dragged: the interval centre (the detectable
//! alternative) and its two bounds. Dragging the centre stages a new
//! alternative; dragging a bound snaps to the nearest precomputed interval
//! and stages its sample size. Nothing reaches the solver until the pointer
//! is released, and then exactly one immediate edit is sent through the
//! update pipeline.
//!
//! Screen coordinates are turned into model values by an
//! [`AxisScale`](powerscope_domain::AxisScale); [`LinearScale`] covers the
//! usual linear axis.

#![warn(missing_docs)]

pub mod controller;
pub mod error;
pub mod scale;

pub use controller::{clamp_dead_zone, DragController, DragSession, DragTarget, Handle, DEAD_ZONE};
pub use error::{DragError, Result};
pub use scale::LinearScale;
