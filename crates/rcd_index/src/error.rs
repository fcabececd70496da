//! Error types for the indexed document store.

use rcd_model::ModelError;
use rcd_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors that can occur in index operations.
///
/// Configuration errors are raised once at startup. Unknown fields and
/// write failures are raised per request and propagate to the caller
/// untouched, so that an outer transaction can roll back.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Bad index metadata of an entity type.
    #[error("configuration error in {entity_type}: {message}")]
    Configuration {
        /// The entity type whose metadata is invalid.
        entity_type: String,
        /// Description of the problem.
        message: String,
    },

    /// Criteria referenced a field that is not indexed.
    #[error("unknown indexed field '{field}' of {entity_type}")]
    UnknownIndexedField {
        /// The entity type queried.
        entity_type: String,
        /// The rejected field name.
        field: String,
    },

    /// Another writer holds the index.
    #[error("write conflict on index {index}: {message}")]
    WriteConflict {
        /// The index name.
        index: String,
        /// Description of the conflict.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Native search index failure.
    #[error("search index error: {0}")]
    Search(#[from] tantivy::TantivyError),

    /// The index does not match its authoritative store.
    #[error("index {index} corrupted: {indexed} documents indexed, {expected} expected")]
    IndexCorrupted {
        /// The index name.
        index: String,
        /// Live documents in the index.
        indexed: usize,
        /// Entities in the authoritative store.
        expected: usize,
    },

    /// A value that must be unique is duplicated.
    #[error("duplicate value '{value}' of {field} in {entity_type}")]
    DuplicateValue {
        /// The entity type checked.
        entity_type: String,
        /// The checked field.
        field: String,
        /// The duplicated value.
        value: String,
    },

    /// An entity was not found.
    #[error("{entity_type} not found: {key}")]
    NotFound {
        /// The entity type searched.
        entity_type: String,
        /// The missing key.
        key: String,
    },

    /// The index is closed.
    #[error("index {0} is closed")]
    IndexClosed(String),

    /// The stored payload could not be encoded or decoded.
    #[error("payload error: {0}")]
    Payload(String),

    /// Authoritative store failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid filter criteria.
    #[error("invalid criteria: {0}")]
    Criteria(#[from] ModelError),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl IndexError {
    /// Creates a configuration error.
    pub fn configuration(entity_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            entity_type: entity_type.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown field error.
    pub fn unknown_field(entity_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownIndexedField {
            entity_type: entity_type.into(),
            field: field.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(entity_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            key: key.into(),
        }
    }

    /// Creates a duplicate value error.
    pub fn duplicate_value(
        entity_type: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::DuplicateValue {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a payload error.
    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload(message.into())
    }

    /// Returns true if the error is a fatal configuration problem.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let err = IndexError::unknown_field("Dictionary", "colour");
        assert_eq!(err.to_string(), "unknown indexed field 'colour' of Dictionary");

        let err = IndexError::IndexCorrupted {
            index: "Field".into(),
            indexed: 1,
            expected: 2,
        };
        assert_eq!(
            err.to_string(),
            "index Field corrupted: 1 documents indexed, 2 expected"
        );
    }

    #[test]
    fn configuration_predicate() {
        assert!(IndexError::configuration("Group", "no primary key").is_configuration());
        assert!(!IndexError::Cancelled.is_configuration());
    }
}
