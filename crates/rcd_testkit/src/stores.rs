//! Stores that misbehave while a rebuild reads them.

use parking_lot::{Condvar, Mutex};
use rcd_model::Entity;
use rcd_storage::{AuthoritativeStore, InMemoryStore, PageIter, Pages, StorageError, StorageResult};
use std::sync::Arc;

/// A store whose page iteration fails after a number of pages.
///
/// Counts and snapshots are served normally, so the index looks corrupted
/// and a rebuild starts, then breaks midway.
#[derive(Debug)]
pub struct FailingStore<E> {
    inner: InMemoryStore<E>,
    pages_before_failure: usize,
}

impl<E: Entity + Clone> FailingStore<E> {
    /// Creates a store holding `entities` that fails after
    /// `pages_before_failure` pages.
    pub fn new(entities: impl IntoIterator<Item = E>, pages_before_failure: usize) -> Self {
        Self {
            inner: InMemoryStore::with_entities(entities),
            pages_before_failure,
        }
    }
}

impl<E> AuthoritativeStore<E> for FailingStore<E>
where
    E: Entity + Clone + Send + Sync,
{
    fn total_count(&self) -> StorageResult<usize> {
        self.inner.total_count()
    }

    fn get_all(&self) -> StorageResult<Vec<E>> {
        self.inner.get_all()
    }

    fn iterate_all(&self, page_size: usize) -> StorageResult<Pages<'_, E>> {
        let pages = PageIter::new(self.inner.get_all()?, page_size)?;
        let failure = std::iter::once(Err(StorageError::Unavailable(
            "connection lost while paging".to_string(),
        )));
        Ok(Box::new(pages.take(self.pages_before_failure).chain(failure)))
    }
}

#[derive(Debug, Default)]
struct Gate {
    started: bool,
    released: bool,
}

/// Controls a [`PausingStore`] from the test thread.
#[derive(Debug, Clone, Default)]
pub struct PauseHandle {
    gate: Arc<(Mutex<Gate>, Condvar)>,
}

impl PauseHandle {
    /// Blocks until a rebuild has started reading the store.
    pub fn wait_started(&self) {
        let (lock, condvar) = &*self.gate;
        let mut gate = lock.lock();
        while !gate.started {
            condvar.wait(&mut gate);
        }
    }

    /// Lets the paused rebuild continue.
    pub fn release(&self) {
        let (lock, condvar) = &*self.gate;
        lock.lock().released = true;
        condvar.notify_all();
    }

    fn pause(&self) {
        let (lock, condvar) = &*self.gate;
        let mut gate = lock.lock();
        gate.started = true;
        condvar.notify_all();
        while !gate.released {
            condvar.wait(&mut gate);
        }
    }
}

/// A store whose page iteration pauses before the first page until the
/// test releases it.
#[derive(Debug)]
pub struct PausingStore<E> {
    inner: InMemoryStore<E>,
    handle: PauseHandle,
}

impl<E: Entity + Clone> PausingStore<E> {
    /// Creates a store holding `entities` and the handle controlling it.
    pub fn new(entities: impl IntoIterator<Item = E>) -> (Self, PauseHandle) {
        let handle = PauseHandle::default();
        let store = Self {
            inner: InMemoryStore::with_entities(entities),
            handle: handle.clone(),
        };
        (store, handle)
    }

    /// Inserts or replaces an entity.
    pub fn put(&self, entity: E) -> Option<E> {
        self.inner.put(entity)
    }
}

impl<E> AuthoritativeStore<E> for PausingStore<E>
where
    E: Entity + Clone + Send + Sync,
{
    fn total_count(&self) -> StorageResult<usize> {
        self.inner.total_count()
    }

    fn get_all(&self) -> StorageResult<Vec<E>> {
        self.inner.get_all()
    }

    fn iterate_all(&self, page_size: usize) -> StorageResult<Pages<'_, E>> {
        let snapshot = self.inner.get_all()?;
        let handle = self.handle.clone();
        let mut pages = PageIter::new(snapshot, page_size)?;
        let mut paused = false;
        Ok(Box::new(std::iter::from_fn(move || {
            if !paused {
                paused = true;
                handle.pause();
            }
            pages.next()
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcd_model::Group;

    #[test]
    fn failing_store_breaks_after_pages() {
        let store = FailingStore::new((0..5).map(|i| Group::new(format!("g{i}"))), 1);
        let pages: Vec<_> = store.iterate_all(2).unwrap().collect();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].as_ref().unwrap().len(), 2);
        assert!(matches!(pages[1], Err(StorageError::Unavailable(_))));
        assert_eq!(store.total_count().unwrap(), 5);
    }

    #[test]
    fn pausing_store_waits_for_release() {
        let (store, handle) = PausingStore::new([Group::new("geo")]);
        let store = Arc::new(store);

        let reader = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.iterate_all(10).unwrap().count())
        };
        handle.wait_started();
        handle.release();

        assert_eq!(reader.join().unwrap(), 1);
    }
}
