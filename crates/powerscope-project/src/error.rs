//! Error types for project operations

use powerscope_domain::{ModelError, ModelKind};
use thiserror::Error;

/// Errors that can occur while managing a project
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectError {
    /// The model rejected the mutation
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// No model at this index
    #[error("Model not found: {0}")]
    ModelNotFound(usize),

    /// Model kind does not match the project
    #[error("Kind mismatch: project holds {expected} models, got {actual}")]
    KindMismatch {
        /// Kind of the project
        expected: ModelKind,
        /// Kind of the rejected model
        actual: ModelKind,
    },
}

/// Result type alias for project operations
pub type Result<T> = std::result::Result<T, ProjectError>;
