//! Index lifecycle manager.
//!
//! One [`IndexManager`] owns the engine handles of one entity type:
//!
//! ```text
//! CLOSED --open--> READY --(writer, commit)*--> READY --close--> CLOSED
//! ```
//!
//! There is exactly one writer per index, shared by every write transaction
//! and handed out under a mutex, and any number of concurrent searchers.
//! Each searcher is a snapshot of the last refreshed commit.
//!
//! # Lock Order
//!
//! `writer`, then `journal`, then `live`. Readers take `live` only.

mod writer;

pub use writer::{Change, IndexWriterGuard, RebuildWriter};

use crate::config::IndexConfig;
use crate::dir::IndexDirectory;
use crate::error::{IndexError, IndexResult};
use crate::stats::IndexStats;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::fs;
use std::path::Path;
use tantivy::schema::Schema;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyError};
use tracing::{debug, error, info, warn};

/// Meta file written by the engine on index creation.
const META_FILE: &str = "meta.json";

/// Lifecycle state of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// Not opened, or closed. Unusable until opened.
    Closed,
    /// Open for reads and writes.
    Ready,
}

/// Handles of the live generation.
struct Live {
    dir: IndexDirectory,
    reader: IndexReader,
}

/// Owns the writer and readers of one index.
///
/// # Thread Safety
///
/// All methods take `&self`. Writer acquisition blocks while another
/// write transaction on the same index is in flight; indexes of different
/// entity types never contend.
pub struct IndexManager {
    name: String,
    schema: Schema,
    config: IndexConfig,
    writer: Mutex<Option<IndexWriter>>,
    /// Changes committed while a rebuild is in progress.
    journal: Mutex<Option<Vec<Change>>>,
    live: RwLock<Option<Live>>,
    stats: IndexStats,
}

impl IndexManager {
    /// Creates a closed manager of index `name` with the given schema.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: Schema, config: IndexConfig) -> Self {
        Self {
            name: name.into(),
            schema,
            config,
            writer: Mutex::new(None),
            journal: Mutex::new(None),
            live: RwLock::new(None),
            stats: IndexStats::new(),
        }
    }

    /// Returns the stable name of the index.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the engine schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Returns the counters of this index.
    #[must_use]
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> IndexState {
        if self.live.read().is_some() {
            IndexState::Ready
        } else {
            IndexState::Closed
        }
    }

    /// Returns the live generation, `None` when closed.
    #[must_use]
    pub fn generation(&self) -> Option<u64> {
        self.live.read().as_ref().map(|live| live.dir.current())
    }

    /// Returns true while a rebuild of this index is in progress.
    #[must_use]
    pub fn is_rebuilding(&self) -> bool {
        self.journal.lock().is_some()
    }

    /// Opens the index. Opening a ready index does nothing.
    ///
    /// Removes orphan generations and a stale writer lock, recreates a
    /// generation whose schema no longer matches, and commits once if the
    /// index was never committed so readers initialize cleanly.
    ///
    /// # Errors
    ///
    /// Returns `WriteConflict` if another process holds the writer, or the
    /// I/O or engine failure.
    pub fn open(&self) -> IndexResult<()> {
        let mut shared = self.writer.lock();
        let mut live = self.live.write();
        if live.is_some() {
            return Ok(());
        }
        self.config.validate()?;

        let dir = IndexDirectory::open(&self.config.root, &self.name)?;
        dir.sweep_orphans()?;
        let path = dir.current_path();
        if self.config.clear_stale_locks {
            dir.clear_stale_lock(&path)?;
        }

        let index = self.open_or_create(&path)?;
        let mut writer = self.create_writer(&index)?;
        if index.load_metas()?.opstamp == 0 {
            writer.commit()?;
            info!("bootstrap commit of index {}", self.name);
        }
        let reader = open_reader(&index)?;

        info!(
            "opened index {} at generation {} with {} documents",
            self.name,
            dir.current(),
            reader.searcher().num_docs()
        );
        *shared = Some(writer);
        *live = Some(Live { dir, reader });
        Ok(())
    }

    /// Closes the index, waiting for the writer to finish merging.
    ///
    /// Waits for an in-flight write transaction. Closing a closed index
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Returns the engine failure of the writer shutdown.
    pub fn close(&self) -> IndexResult<()> {
        let mut shared = self.writer.lock();
        let mut live = self.live.write();
        let writer = shared.take();
        if live.take().is_none() {
            return Ok(());
        }
        if let Some(writer) = writer {
            writer.wait_merging_threads()?;
        }
        info!("closed index {}", self.name);
        Ok(())
    }

    /// Acquires the shared writer for one write transaction.
    ///
    /// Blocks while another transaction holds it.
    ///
    /// # Errors
    ///
    /// Returns `IndexClosed` if the index is not open.
    pub fn writer(&self) -> IndexResult<IndexWriterGuard<'_>> {
        let writer = self.writer.lock();
        if writer.is_none() {
            return Err(self.closed());
        }
        Ok(IndexWriterGuard::new(self, writer))
    }

    /// Commits a write transaction. Same as [`IndexWriterGuard::commit`].
    ///
    /// # Errors
    ///
    /// Returns the write failure.
    pub fn commit(&self, writer: IndexWriterGuard<'_>) -> IndexResult<u64> {
        writer.commit()
    }

    /// Rolls back a write transaction.
    pub fn rollback(&self, writer: IndexWriterGuard<'_>) {
        writer.rollback();
    }

    /// Returns a reader of the live generation.
    ///
    /// A reader keeps pointing at its generation after a rebuild swap;
    /// prefer [`searcher`](Self::searcher) for one-off queries.
    ///
    /// # Errors
    ///
    /// Returns `IndexClosed` if the index is not open.
    pub fn reader(&self) -> IndexResult<IndexReader> {
        self.live
            .read()
            .as_ref()
            .map(|live| live.reader.clone())
            .ok_or_else(|| self.closed())
    }

    /// Returns a snapshot searcher of the last refreshed commit.
    ///
    /// # Errors
    ///
    /// Returns `IndexClosed` if the index is not open.
    pub fn searcher(&self) -> IndexResult<Searcher> {
        self.live
            .read()
            .as_ref()
            .map(|live| live.reader.searcher())
            .ok_or_else(|| self.closed())
    }

    /// Makes the latest commit visible to new searchers.
    ///
    /// # Errors
    ///
    /// Returns `IndexClosed` if the index is not open, or the engine failure.
    pub fn refresh(&self) -> IndexResult<()> {
        let live = self.live.read();
        let live = live.as_ref().ok_or_else(|| self.closed())?;
        live.reader.reload()?;
        Ok(())
    }

    /// Returns the number of live documents.
    ///
    /// # Errors
    ///
    /// Returns `IndexClosed` if the index is not open.
    pub fn num_docs(&self) -> IndexResult<usize> {
        let count = self.searcher()?.num_docs();
        Ok(usize::try_from(count).unwrap_or(usize::MAX))
    }

    /// Replaces the whole content of the index.
    ///
    /// `fill` writes every document into a fresh generation while the live
    /// generation keeps serving reads and writes. Writes committed in the
    /// meantime are journaled and replayed into the new generation, which
    /// then replaces the live one under the writer lock. On failure the new
    /// generation is discarded and the live one stays untouched.
    ///
    /// Returns the number of documents of the new generation.
    ///
    /// # Errors
    ///
    /// Returns `IndexClosed`, `WriteConflict` if a rebuild is already
    /// running, or the failure of `fill` or the engine.
    pub fn rebuild<F>(&self, fill: F) -> IndexResult<usize>
    where
        F: FnOnce(&mut RebuildWriter) -> IndexResult<()>,
    {
        {
            let mut journal = self.journal.lock();
            if journal.is_some() {
                return Err(IndexError::WriteConflict {
                    index: self.name.clone(),
                    message: "a rebuild is already in progress".into(),
                });
            }
            *journal = Some(Vec::new());
        }

        let result = self.rebuild_generation(fill);
        if result.is_err() {
            *self.journal.lock() = None;
            self.stats.record_error();
        }
        result
    }

    fn rebuild_generation<F>(&self, fill: F) -> IndexResult<usize>
    where
        F: FnOnce(&mut RebuildWriter) -> IndexResult<()>,
    {
        let (generation, path) = {
            let live = self.live.read();
            let live = live.as_ref().ok_or_else(|| self.closed())?;
            live.dir.create_generation()?
        };
        debug!("building generation {} of index {}", generation, self.name);

        let built = self.build_generation(&path, fill);
        let swapped = built.and_then(|(index, rebuilt)| self.swap_generation(generation, index, rebuilt));
        match swapped {
            Ok((previous, documents)) => {
                if let Err(err) = self.remove_generation(previous) {
                    warn!(
                        "could not remove generation {} of index {}: {}",
                        previous, self.name, err
                    );
                }
                self.stats.record_rebuild(documents as u64);
                Ok(documents)
            }
            Err(err) => {
                if let Err(cleanup) = fs::remove_dir_all(&path) {
                    warn!(
                        "could not remove failed generation {} of index {}: {}",
                        generation, self.name, cleanup
                    );
                }
                Err(err)
            }
        }
    }

    fn build_generation<F>(&self, path: &Path, fill: F) -> IndexResult<(Index, RebuildWriter)>
    where
        F: FnOnce(&mut RebuildWriter) -> IndexResult<()>,
    {
        let index = Index::create_in_dir(path, self.schema.clone())?;
        let mut rebuilt = RebuildWriter::new(self.create_writer(&index)?);
        fill(&mut rebuilt)?;
        rebuilt.writer.commit()?;
        Ok((index, rebuilt))
    }

    /// Replays the journal into the new generation and makes it live.
    ///
    /// Returns the previous generation and the document count.
    fn swap_generation(
        &self,
        generation: u64,
        index: Index,
        mut rebuilt: RebuildWriter,
    ) -> IndexResult<(u64, usize)> {
        let mut shared = self.writer.lock();
        let journal = self.journal.lock().take().unwrap_or_default();
        if !journal.is_empty() {
            writer::apply(&rebuilt.writer, &journal)?;
            rebuilt.writer.commit()?;
            debug!(
                "replayed {} journaled changes into index {}",
                journal.len(),
                self.name
            );
        }
        let reader = open_reader(&index)?;
        let documents = usize::try_from(reader.searcher().num_docs()).unwrap_or(usize::MAX);

        let previous = {
            let mut live = self.live.write();
            let live = live.as_mut().ok_or_else(|| self.closed())?;
            let previous = live.dir.swap(generation)?;
            live.reader = reader;
            previous
        };
        let retired = shared.replace(rebuilt.writer);
        drop(shared);

        if let Some(retired) = retired {
            if let Err(err) = retired.wait_merging_threads() {
                warn!("retired writer of index {} failed: {}", self.name, err);
            }
        }
        info!(
            "index {} rebuilt with {} documents at generation {}",
            self.name, documents, generation
        );
        Ok((previous, documents))
    }

    fn remove_generation(&self, generation: u64) -> IndexResult<()> {
        let live = self.live.read();
        let live = live.as_ref().ok_or_else(|| self.closed())?;
        live.dir.remove_generation(generation)
    }

    pub(crate) fn commit_changes(
        &self,
        writer: &mut IndexWriter,
        changes: Vec<Change>,
    ) -> IndexResult<u64> {
        if changes.is_empty() {
            self.stats.record_commit(0, 0);
            return Ok(writer.commit_opstamp());
        }

        let mut journal = self.journal.lock();
        let result = writer::apply(writer, &changes).and_then(|counts| {
            let opstamp = writer.commit()?;
            Ok((opstamp, counts))
        });
        match result {
            Ok((opstamp, (written, deleted))) => {
                if let Some(journal) = journal.as_mut() {
                    journal.extend(changes);
                }
                drop(journal);
                self.stats.record_commit(written, deleted);
                debug!(
                    "committed {} written and {} deleted documents to index {}",
                    written, deleted, self.name
                );
                self.refresh()?;
                Ok(opstamp)
            }
            Err(err) => {
                drop(journal);
                self.stats.record_error();
                error!("commit to index {} failed: {}", self.name, err);
                if let Err(rollback) = writer.rollback() {
                    error!("rollback of index {} failed: {}", self.name, rollback);
                }
                Err(err)
            }
        }
    }

    pub(crate) fn closed(&self) -> IndexError {
        IndexError::IndexClosed(self.name.clone())
    }

    fn open_or_create(&self, path: &Path) -> IndexResult<Index> {
        if path.join(META_FILE).exists() {
            let index = Index::open_in_dir(path)?;
            if index.schema() == self.schema {
                return Ok(index);
            }
            warn!(
                "schema of index {} changed, recreating it empty",
                self.name
            );
            drop(index);
            fs::remove_dir_all(path)?;
            fs::create_dir_all(path)?;
        }
        Ok(Index::create_in_dir(path, self.schema.clone())?)
    }

    fn create_writer(&self, index: &Index) -> IndexResult<IndexWriter> {
        let threads = self.config.writer_threads;
        let budget = self.config.writer_heap_bytes.saturating_mul(threads);
        index
            .writer_with_num_threads(threads, budget)
            .map_err(|err| match err {
                TantivyError::LockFailure(lock, message) => IndexError::WriteConflict {
                    index: self.name.clone(),
                    message: message.unwrap_or_else(|| lock.to_string()),
                },
                other => other.into(),
            })
    }
}

impl Drop for IndexManager {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            error!("closing index {} failed: {}", self.name, err);
        }
    }
}

impl fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexManager")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

fn open_reader(index: &Index) -> IndexResult<IndexReader> {
    Ok(index
        .reader_builder()
        .reload_policy(ReloadPolicy::Manual)
        .try_into()?)
}
