//! Powerscope Domain Layer
//!
//! Core state for interactive power analysis: observable models, axis ranges
//! and the confidence-interval table used for drag snapping. Nothing here
//! touches the network or a clock; solver and rendering collaborators are
//! reached through the traits in [`traits`].
//!
//! ## Key Concepts
//!
//! - **Model**: one power-analysis configuration; exactly one field is the
//!   *output* solved for by the solver, the rest are inputs
//! - **Extra**: an overlay varying a single field of its parent model
//! - **ChangeRecorder**: batched per-field change tracking embedded in every
//!   observable entity
//! - **Range**: `[min, max]` interval combined by union across models
//! - **CiTable**: two sorted views of precomputed confidence intervals

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ci_table;
pub mod error;
pub mod extra;
pub mod id;
pub mod kind;
pub mod model;
pub mod observable;
pub mod plot;
pub mod range;
pub mod traits;
pub mod value;

// Re-exports for convenience
pub use ci_table::{CiBound, CiEntry, CiTable};
pub use error::ModelError;
pub use extra::{Extra, ExtraAttribs};
pub use id::ModelId;
pub use kind::{FieldClass, FieldSpec, ModelKind, Output};
pub use model::{Model, ModelAttribs, EXTRA_KEY, OUTPUT_KEY};
pub use observable::{ChangeEvent, ChangeRecord, ChangeRecorder, ChangeValue, CollectionChange};
pub use plot::{PlotData, Point, SamplingDistribution, Series};
pub use range::{Axis, AxisRanges, Coord, Range, RangeSnapshot};
pub use traits::{AxisScale, Solver, SolverResponse};
pub use value::{attribs, round2, Attribs, FieldValue};
