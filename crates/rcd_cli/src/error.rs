//! CLI error type.

use rcd_index::IndexError;
use rcd_storage::StorageError;
use thiserror::Error;

/// Result type of CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Index failure.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Data file failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Invalid criteria or output JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No index for the requested entity type.
    #[error("unknown entity type '{0}'")]
    UnknownEntity(String),

    /// Unknown output format.
    #[error("unknown format '{0}', expected text or json")]
    UnknownFormat(String),

    /// One or more indexes failed a check or a rebuild.
    #[error("{0}")]
    Failed(String),
}
