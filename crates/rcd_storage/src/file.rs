//! JSON-lines authoritative store.

use crate::error::{StorageError, StorageResult};
use crate::store::{AuthoritativeStore, PageIter, Pages};
use parking_lot::RwLock;
use rcd_model::Entity;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A store persisting one JSON document per line.
///
/// The whole file is loaded on open and kept in memory; every write
/// rewrites the file through a temporary file and an atomic rename, so a
/// crash never leaves a half-written store behind.
///
/// # Thread Safety
///
/// Writers are serialized by an internal lock. Readers see the last
/// persisted state.
#[derive(Debug)]
pub struct JsonLinesStore<E> {
    path: PathBuf,
    entities: RwLock<BTreeMap<String, E>>,
}

impl<E> JsonLinesStore<E>
where
    E: Entity + Clone + Serialize + DeserializeOwned,
{
    /// Opens the store at `path`, creating an empty one if missing.
    ///
    /// # Errors
    ///
    /// Returns `Corrupted` if a line cannot be decoded, or an I/O error.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut entities = BTreeMap::new();
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            for (index, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let entity: E =
                    serde_json::from_str(&line).map_err(|source| StorageError::Corrupted {
                        path: path.to_path_buf(),
                        line: index + 1,
                        source,
                    })?;
                entities.insert(entity.id().to_string(), entity);
            }
        } else if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!("opened {:?} with {} documents", path, entities.len());
        Ok(Self {
            path: path.to_path_buf(),
            entities: RwLock::new(entities),
        })
    }

    /// Returns the store file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts or replaces an entity and persists the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written. The in-memory state
    /// is left unchanged on failure.
    pub fn put(&self, entity: E) -> StorageResult<()> {
        self.put_all([entity])
    }

    /// Inserts or replaces several entities and persists the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written. The in-memory state
    /// is left unchanged on failure.
    pub fn put_all(&self, entities: impl IntoIterator<Item = E>) -> StorageResult<()> {
        let mut map = self.entities.write();
        let mut next = map.clone();
        for entity in entities {
            next.insert(entity.id().to_string(), entity);
        }
        self.persist(&next)?;
        *map = next;
        Ok(())
    }

    /// Removes an entity and persists the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn remove(&self, id: &str) -> StorageResult<Option<E>> {
        let mut map = self.entities.write();
        let mut next = map.clone();
        let removed = next.remove(id);
        if removed.is_some() {
            self.persist(&next)?;
            *map = next;
        }
        Ok(removed)
    }

    /// Returns a copy of an entity.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<E> {
        self.entities.read().get(id).cloned()
    }

    fn persist(&self, entities: &BTreeMap<String, E>) -> StorageResult<()> {
        let temp_path = self.path.with_extension("jsonl.tmp");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        let mut writer = BufWriter::new(file);
        for entity in entities.values() {
            serde_json::to_writer(&mut writer, entity)?;
            writer.write_all(b"\n")?;
        }
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        // Atomic rename
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl<E> AuthoritativeStore<E> for JsonLinesStore<E>
where
    E: Entity + Clone + Serialize + DeserializeOwned + Send + Sync,
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

#[cfg(test)]
mod tests {
    use super::*;
    use rcd_model::{Dictionary, Group};
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("Group.jsonl");
        let store = JsonLinesStore::<Group>::open(&path).unwrap();
        assert_eq!(store.total_count().unwrap(), 0);
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Dictionary.jsonl");
        let dictionary = Dictionary::new("g", "countries");
        {
            let store = JsonLinesStore::open(&path).unwrap();
            store.put(dictionary.clone()).unwrap();
            store.put(Dictionary::new("g", "cities")).unwrap();
        }
        let store = JsonLinesStore::<Dictionary>::open(&path).unwrap();
        assert_eq!(store.total_count().unwrap(), 2);
        assert_eq!(store.get(&dictionary.id), Some(dictionary));
    }

    #[test]
    fn file_remove_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Group.jsonl");
        let group = Group::new("geo");
        let store = JsonLinesStore::open(&path).unwrap();
        store.put(group.clone()).unwrap();
        assert_eq!(store.remove(&group.id).unwrap(), Some(group.clone()));
        assert_eq!(store.remove(&group.id).unwrap(), None);

        let reopened = JsonLinesStore::<Group>::open(&path).unwrap();
        assert_eq!(reopened.total_count().unwrap(), 0);
    }

    #[test]
    fn file_skips_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Group.jsonl");
        let group = Group::new("geo");
        let line = serde_json::to_string(&group).unwrap();
        fs::write(&path, format!("\n{line}\n\n")).unwrap();
        let store = JsonLinesStore::<Group>::open(&path).unwrap();
        assert_eq!(store.total_count().unwrap(), 1);
    }

    #[test]
    fn file_reports_corrupted_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Group.jsonl");
        let line = serde_json::to_string(&Group::new("geo")).unwrap();
        fs::write(&path, format!("{line}\n{{not json\n")).unwrap();
        match JsonLinesStore::<Group>::open(&path) {
            Err(StorageError::Corrupted { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected corruption, got {other:?}"),
        }
    }

    #[test]
    fn file_iterate_all() {
        let dir = tempdir().unwrap();
        let store = JsonLinesStore::open(&dir.path().join("Group.jsonl")).unwrap();
        store
            .put_all((0..5).map(|i| Group::new(format!("g{i}"))))
            .unwrap();
        let total: usize = store
            .iterate_all(2)
            .unwrap()
            .map(|page| page.unwrap().len())
            .sum();
        assert_eq!(total, 5);
    }
}
