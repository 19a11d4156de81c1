//! Powerscope Solver Layer
//!
//! Implementations of the `Solver` trait from `powerscope-domain`.
//!
//! # Solvers
//!
//! - `HttpSolver`: JSON over HTTP to a running solver service
//! - `MockSolver`: Deterministic in-process double for testing
//!
//! # Examples
//!
//! ```
//! use powerscope_domain::{attribs, ModelAttribs, ModelKind, Output, Solver};
//! use powerscope_solver::MockSolver;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let solver = MockSolver::echo();
//! let request = ModelAttribs::new(Output::Power, attribs([("n", 33.0)]));
//! let response = solver.calculate(ModelKind::TTest, &request).await.unwrap();
//! assert_eq!(response.model, request);
//! assert_eq!(solver.call_count(), 1);
//! # }
//! ```

#![warn(missing_docs)]

pub mod http;
pub mod mock;

use thiserror::Error;

pub use http::{HttpSolver, SolverConfig};
pub use mock::{MockCall, MockMethod, MockSolver};

/// Errors that can occur during a solver round trip
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Network or connection failure
    #[error("Communication error: {0}")]
    Communication(String),

    /// Solver answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Response body, if readable
        body: String,
    },

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Stateful update requested for a model without an id
    #[error("Model has no id; stateful updates need one")]
    MissingId,

    /// Generic error
    #[error("Solver error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SolverError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SolverError::InvalidResponse(e.to_string())
        } else if let Some(status) = e.status() {
            SolverError::Http {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else if e.is_timeout() {
            SolverError::Communication("Request timeout".to_string())
        } else {
            SolverError::Communication(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SolverError {
    fn from(e: serde_json::Error) -> Self {
        SolverError::InvalidResponse(e.to_string())
    }
}
