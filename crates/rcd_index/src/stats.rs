//! Index statistics.
//!
//! Every [`IndexManager`](crate::IndexManager) keeps its own counters.
//!
//! ```rust,ignore
//! let snapshot = manager.stats().snapshot();
//! println!("commits: {}", snapshot.commits);
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one index.
///
/// All counters are atomic and can be read while operations are in progress.
#[derive(Debug, Default)]
pub struct IndexStats {
    /// Committed write transactions.
    commits: AtomicU64,
    /// Rolled back write transactions.
    rollbacks: AtomicU64,
    /// Documents added or replaced.
    documents_written: AtomicU64,
    /// Documents deleted.
    documents_deleted: AtomicU64,
    /// Executed searches.
    searches: AtomicU64,
    /// Completed rebuilds.
    rebuilds: AtomicU64,
    /// Failed operations.
    errors: AtomicU64,
}

impl IndexStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    // === Increment methods (internal use) ===

    pub(crate) fn record_commit(&self, written: u64, deleted: u64) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        self.documents_written.fetch_add(written, Ordering::Relaxed);
        self.documents_deleted.fetch_add(deleted, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rebuild(&self, documents: u64) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        self.documents_written.fetch_add(documents, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    // === Getter methods (public API) ===

    /// Returns the number of committed write transactions.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Returns the number of rolled back write transactions.
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// Returns the number of documents added or replaced.
    pub fn documents_written(&self) -> u64 {
        self.documents_written.load(Ordering::Relaxed)
    }

    /// Returns the number of documents deleted.
    pub fn documents_deleted(&self) -> u64 {
        self.documents_deleted.load(Ordering::Relaxed)
    }

    /// Returns the number of executed searches.
    pub fn searches(&self) -> u64 {
        self.searches.load(Ordering::Relaxed)
    }

    /// Returns the number of completed rebuilds.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    /// Returns the number of failed operations.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> IndexStatsSnapshot {
        IndexStatsSnapshot {
            commits: self.commits(),
            rollbacks: self.rollbacks(),
            documents_written: self.documents_written(),
            documents_deleted: self.documents_deleted(),
            searches: self.searches(),
            rebuilds: self.rebuilds(),
            errors: self.errors(),
        }
    }
}

/// A point-in-time copy of [`IndexStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatsSnapshot {
    /// Committed write transactions.
    pub commits: u64,
    /// Rolled back write transactions.
    pub rollbacks: u64,
    /// Documents added or replaced.
    pub documents_written: u64,
    /// Documents deleted.
    pub documents_deleted: u64,
    /// Executed searches.
    pub searches: u64,
    /// Completed rebuilds.
    pub rebuilds: u64,
    /// Failed operations.
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = IndexStats::new();
        assert_eq!(stats.snapshot(), IndexStatsSnapshot::default());
    }

    #[test]
    fn record_operations() {
        let stats = IndexStats::new();
        stats.record_commit(3, 1);
        stats.record_commit(2, 0);
        stats.record_rollback();
        stats.record_rebuild(10);

        assert_eq!(stats.commits(), 2);
        assert_eq!(stats.rollbacks(), 1);
        assert_eq!(stats.documents_written(), 15);
        assert_eq!(stats.documents_deleted(), 1);
        assert_eq!(stats.rebuilds(), 1);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(IndexStats::new());
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let s = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.record_search();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.searches(), 1000);
    }
}
