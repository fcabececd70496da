//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored document could not be decoded.
    #[error("corrupted document at {path:?} line {line}: {source}")]
    Corrupted {
        /// The store file.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// The decoding failure.
        source: serde_json::Error,
    },

    /// A document could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An argument was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The store is unavailable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
