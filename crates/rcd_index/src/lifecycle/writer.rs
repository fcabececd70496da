//! Write transactions.

use super::IndexManager;
use crate::error::IndexResult;
use parking_lot::MutexGuard;
use tantivy::{IndexWriter, TantivyDocument, Term};
use tracing::debug;

/// One staged change of a write transaction.
#[derive(Debug, Clone)]
pub enum Change {
    /// Replace the document addressed by `key`.
    Upsert {
        /// Primary key term.
        key: Term,
        /// The new document.
        document: TantivyDocument,
    },
    /// Delete the document addressed by `key`.
    Delete {
        /// Primary key term.
        key: Term,
    },
}

/// Exclusive access to the writer of one index.
///
/// Holds the writer lock for its whole lifetime, so concurrent write
/// transactions on the same index serialize. Changes are staged in memory
/// and applied on [`commit`](Self::commit). Dropping the guard without
/// committing rolls the transaction back.
pub struct IndexWriterGuard<'a> {
    manager: &'a IndexManager,
    writer: MutexGuard<'a, Option<IndexWriter>>,
    changes: Vec<Change>,
    finished: bool,
}

impl<'a> IndexWriterGuard<'a> {
    pub(crate) fn new(manager: &'a IndexManager, writer: MutexGuard<'a, Option<IndexWriter>>) -> Self {
        Self {
            manager,
            writer,
            changes: Vec::new(),
            finished: false,
        }
    }

    /// Stages the replacement of the document addressed by `key`.
    pub fn upsert(&mut self, key: Term, document: TantivyDocument) {
        self.changes.push(Change::Upsert { key, document });
    }

    /// Stages the deletion of the document addressed by `key`.
    pub fn delete(&mut self, key: Term) {
        self.changes.push(Change::Delete { key });
    }

    /// Returns the number of staged changes.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    /// Returns the name of the index.
    #[must_use]
    pub fn index_name(&self) -> &str {
        self.manager.name()
    }

    /// Applies and commits the staged changes, then refreshes readers.
    ///
    /// Call only after the authoritative store committed its own
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns the write failure. Nothing staged is visible on failure.
    pub fn commit(mut self) -> IndexResult<u64> {
        self.finished = true;
        let changes = std::mem::take(&mut self.changes);
        let manager = self.manager;
        let writer = self.writer.as_mut().ok_or_else(|| manager.closed())?;
        manager.commit_changes(writer, changes)
    }

    /// Discards the staged changes.
    pub fn rollback(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        self.finished = true;
        let discarded = std::mem::take(&mut self.changes).len();
        self.manager.stats().record_rollback();
        debug!(
            "rolled back {} changes of index {}",
            discarded,
            self.manager.name()
        );
    }
}

impl Drop for IndexWriterGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.discard();
        }
    }
}

impl std::fmt::Debug for IndexWriterGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriterGuard")
            .field("index", &self.manager.name())
            .field("changes", &self.changes.len())
            .finish_non_exhaustive()
    }
}

/// Writes the documents of a new generation during rebuild.
pub struct RebuildWriter {
    pub(crate) writer: IndexWriter,
    documents: usize,
}

impl RebuildWriter {
    pub(crate) fn new(writer: IndexWriter) -> Self {
        Self {
            writer,
            documents: 0,
        }
    }

    /// Adds a document to the new generation.
    ///
    /// # Errors
    ///
    /// Returns the write failure of the search engine.
    pub fn add(&mut self, document: TantivyDocument) -> IndexResult<()> {
        self.writer.add_document(document)?;
        self.documents += 1;
        Ok(())
    }

    /// Returns the number of documents added so far.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents
    }
}

impl std::fmt::Debug for RebuildWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildWriter")
            .field("documents", &self.documents)
            .finish_non_exhaustive()
    }
}

/// Applies changes to a writer without committing.
///
/// Returns the number of written and deleted documents.
pub(crate) fn apply(writer: &IndexWriter, changes: &[Change]) -> IndexResult<(u64, u64)> {
    let (mut written, mut deleted) = (0, 0);
    for change in changes {
        match change {
            Change::Upsert { key, document } => {
                writer.delete_term(key.clone());
                writer.add_document(document.clone())?;
                written += 1;
            }
            Change::Delete { key } => {
                writer.delete_term(key.clone());
                deleted += 1;
            }
        }
    }
    Ok((written, deleted))
}
