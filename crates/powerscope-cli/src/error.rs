//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model or project refused an operation
    #[error("Project error: {0}")]
    Project(#[from] powerscope_project::ProjectError),

    /// Model construction failed
    #[error("Model error: {0}")]
    Model(#[from] powerscope_domain::ModelError),

    /// Solver could not be set up
    #[error("Solver error: {0}")]
    Solver(#[from] powerscope_solver::SolverError),

    /// Update pipeline error
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] powerscope_pipeline::PipelineError),

    /// Drag gesture error
    #[error("Drag error: {0}")]
    Drag(#[from] powerscope_drag::DragError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
