//! Index configuration.

use crate::error::{IndexError, IndexResult};
use std::path::{Path, PathBuf};

/// Smallest writer memory budget accepted by the search engine.
pub const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;

/// Configuration shared by every index of a store.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Directory holding one sub-directory per entity type.
    pub root: PathBuf,

    /// Memory budget of the index writer, per thread.
    pub writer_heap_bytes: usize,

    /// Number of indexing threads per writer.
    pub writer_threads: usize,

    /// Page size used to stream entities out of the authoritative store
    /// during rebuild.
    pub rebuild_page_size: usize,

    /// A progress line is logged every this many rebuilt documents.
    pub rebuild_log_interval: usize,

    /// Page size of criteria without an explicit count.
    pub default_page_size: usize,

    /// Whether a left-over writer lock is removed on open.
    pub clear_stale_locks: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("index"),
            writer_heap_bytes: 50 * 1024 * 1024, // 50 MB
            writer_threads: 1,
            rebuild_page_size: 10_000,
            rebuild_log_interval: 100_000,
            default_page_size: 100,
            clear_stale_locks: true,
        }
    }
}

impl IndexConfig {
    /// Creates a configuration rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Sets the root directory.
    #[must_use]
    pub fn root(mut self, root: impl AsRef<Path>) -> Self {
        self.root = root.as_ref().to_path_buf();
        self
    }

    /// Sets the writer memory budget per thread.
    #[must_use]
    pub const fn writer_heap_bytes(mut self, bytes: usize) -> Self {
        self.writer_heap_bytes = bytes;
        self
    }

    /// Sets the number of indexing threads.
    #[must_use]
    pub const fn writer_threads(mut self, threads: usize) -> Self {
        self.writer_threads = threads;
        self
    }

    /// Sets the rebuild page size.
    #[must_use]
    pub const fn rebuild_page_size(mut self, size: usize) -> Self {
        self.rebuild_page_size = size;
        self
    }

    /// Sets the rebuild progress interval.
    #[must_use]
    pub const fn rebuild_log_interval(mut self, documents: usize) -> Self {
        self.rebuild_log_interval = documents;
        self
    }

    /// Sets whether stale writer locks are cleared on open.
    #[must_use]
    pub const fn clear_stale_locks(mut self, value: bool) -> Self {
        self.clear_stale_locks = value;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a size is zero or the writer heap is below
    /// [`MIN_WRITER_HEAP_BYTES`].
    pub fn validate(&self) -> IndexResult<()> {
        let problem = if self.writer_threads == 0 {
            Some("writer_threads must be positive".to_string())
        } else if self.writer_heap_bytes < MIN_WRITER_HEAP_BYTES {
            Some(format!(
                "writer_heap_bytes must be at least {MIN_WRITER_HEAP_BYTES}, got {}",
                self.writer_heap_bytes
            ))
        } else if self.rebuild_page_size == 0 {
            Some("rebuild_page_size must be positive".to_string())
        } else if self.default_page_size == 0 {
            Some("default_page_size must be positive".to_string())
        } else {
            None
        };
        match problem {
            Some(message) => Err(IndexError::configuration("IndexConfig", message)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = IndexConfig::default();
        assert_eq!(config.writer_threads, 1);
        assert_eq!(config.rebuild_page_size, 10_000);
        assert_eq!(config.rebuild_log_interval, 100_000);
        assert!(config.clear_stale_locks);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = IndexConfig::new("/tmp/rcd")
            .writer_threads(2)
            .rebuild_page_size(50)
            .clear_stale_locks(false);

        assert_eq!(config.root, PathBuf::from("/tmp/rcd"));
        assert_eq!(config.writer_threads, 2);
        assert_eq!(config.rebuild_page_size, 50);
        assert!(!config.clear_stale_locks);
    }

    #[test]
    fn validate_rejects_small_heap() {
        let config = IndexConfig::default().writer_heap_bytes(1024);
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        assert!(IndexConfig::default().writer_threads(0).validate().is_err());
        assert!(IndexConfig::default().rebuild_page_size(0).validate().is_err());
    }
}
