//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the model core and its
//! collaborators. Implementations live in other crates.

use crate::kind::ModelKind;
use crate::model::ModelAttribs;
use crate::plot::PlotData;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// What the solver returns: replacement attributes plus plot data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverResponse {
    /// Solved model attributes
    pub model: ModelAttribs,
    /// Series and sampling data for the plots
    #[serde(default)]
    pub data: PlotData,
}

/// Numeric solver round trip
///
/// Implemented by the infrastructure layer (powerscope-solver)
pub trait Solver: Send + Sync + 'static {
    /// Error type for solver operations
    type Error: std::fmt::Display + Send + 'static;

    /// Solve a model that has not been seen before
    fn calculate(
        &self,
        kind: ModelKind,
        model: &ModelAttribs,
    ) -> impl Future<Output = Result<SolverResponse, Self::Error>> + Send;

    /// Re-solve an edited model
    fn update(
        &self,
        kind: ModelKind,
        model: &ModelAttribs,
    ) -> impl Future<Output = Result<SolverResponse, Self::Error>> + Send;
}

/// Mapping between model space and screen space along one axis
///
/// Implemented by the rendering collaborator; powerscope-drag ships a linear
/// implementation.
pub trait AxisScale {
    /// Model value → screen coordinate
    fn apply(&self, value: f64) -> f64;

    /// Screen coordinate → model value
    fn invert(&self, screen: f64) -> f64;
}
