//! Error types for the entity model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while parsing or validating model values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A named path could not be parsed.
    #[error("invalid named path '{path}': {reason}")]
    InvalidPath {
        /// The rejected input.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An unknown change type name.
    #[error("unknown change type: {0}")]
    UnknownChangeType(String),

    /// Criteria failed validation.
    #[error("invalid criteria: {0}")]
    InvalidCriteria(String),
}

impl ModelError {
    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid criteria error.
    pub fn invalid_criteria(message: impl Into<String>) -> Self {
        Self::InvalidCriteria(message.into())
    }
}
