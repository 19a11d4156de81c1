//! Error types for drag gestures

use crate::controller::Handle;
use powerscope_pipeline::PipelineError;
use thiserror::Error;

/// Errors raised by the drag controller
#[derive(Debug, Error)]
pub enum DragError {
    /// A drag session is already active
    #[error("A drag is already in progress")]
    AlreadyDragging,

    /// No drag session is active
    #[error("No drag in progress")]
    NotDragging,

    /// The handle cannot be dragged for the selected model
    #[error("Handle {0:?} is not draggable for this model")]
    NotDraggable(Handle),

    /// The handle has been switched off
    #[error("Handle {0:?} is disabled")]
    Disabled(Handle),

    /// The commit could not be handed to the pipeline
    #[error("Failed to commit drag: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Result type for drag operations
pub type Result<T> = std::result::Result<T, DragError>;
