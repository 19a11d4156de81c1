//! Error types for the update pipeline

use powerscope_project::ProjectError;
use thiserror::Error;

/// Errors surfaced by the pipeline and its handle
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The project refused a command
    #[error(transparent)]
    Project(#[from] ProjectError),

    /// The pipeline task has stopped
    #[error("Update pipeline is closed")]
    Closed,

    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ConfigRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
