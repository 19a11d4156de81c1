//! Error types for model mutation

use thiserror::Error;

/// Errors raised when a mutation is rejected
///
/// A rejected mutation never leaves a model partially updated: every key is
/// validated before the first field is assigned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Key is not declared on the model
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Value has the wrong type or is outside the allowed choices
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue {
        /// Offending field
        key: String,
        /// Why the value was rejected
        reason: String,
    },

    /// More than one member of a mutually-exclusive group was supplied, or an
    /// extra's free parameter disagrees with the established one
    #[error("Elements must be mutually exclusive: {0}")]
    MutualExclusivity(String),

    /// Extras index does not exist
    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Current length
        len: usize,
    },
}
