//! In-memory authoritative store for testing.

use crate::error::StorageResult;
use crate::store::{AuthoritativeStore, PageIter, Pages};
use parking_lot::RwLock;
use rcd_model::Entity;
use std::collections::BTreeMap;

/// An in-memory store keyed by primary key.
///
/// This store keeps all entities in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral data that does not need persistence
///
/// Iteration order is primary key order.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
#[derive(Debug)]
pub struct InMemoryStore<E> {
    entities: RwLock<BTreeMap<String, E>>,
}

impl<E: Entity + Clone> InMemoryStore<E> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(BTreeMap::new()),
        }
    }

    /// Creates a store holding `entities`.
    pub fn with_entities(entities: impl IntoIterator<Item = E>) -> Self {
        let store = Self::new();
        store.put_all(entities);
        store
    }

    /// Inserts or replaces an entity.
    pub fn put(&self, entity: E) -> Option<E> {
        self.entities.write().insert(entity.id().to_string(), entity)
    }

    /// Inserts or replaces several entities.
    pub fn put_all(&self, entities: impl IntoIterator<Item = E>) {
        let mut map = self.entities.write();
        for entity in entities {
            map.insert(entity.id().to_string(), entity);
        }
    }

    /// Removes an entity.
    pub fn remove(&self, id: &str) -> Option<E> {
        self.entities.write().remove(id)
    }

    /// Returns a copy of an entity.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<E> {
        self.entities.read().get(id).cloned()
    }

    /// Removes every entity.
    pub fn clear(&self) {
        self.entities.write().clear();
    }
}

impl<E: Entity + Clone> Default for InMemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> AuthoritativeStore<E> for InMemoryStore<E>
where
    E: Entity + Clone + Send + Sync,
{
    fn total_count(&self) -> StorageResult<usize> {
        Ok(self.entities.read().len())
    }

    fn get_all(&self) -> StorageResult<Vec<E>> {
        Ok(self.entities.read().values().cloned().collect())
    }

    fn iterate_all(&self, page_size: usize) -> StorageResult<Pages<'_, E>> {
        let snapshot = self.get_all()?;
        Ok(Box::new(PageIter::new(snapshot, page_size)?))
    }
}
