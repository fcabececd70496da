//! Document service: indexed reads, indexed writes and rebuild of one
//! entity type.
//!
//! The service owns the index of its entity type and reads the
//! authoritative store only to rebuild it. Writes to the store are the
//! caller's business; the service mirrors them into the index through an
//! [`IndexTransaction`] committed after the store committed.
//!
//! ```rust,ignore
//! let registry = SchemaRegistry::new();
//! let dictionaries = DocumentService::open(&registry, config, store)?;
//!
//! let page = dictionaries.find_by_criteria(
//!     &FilterCriteria::new().filter("name", FilterValue::string_eq("alpha")),
//! )?;
//! ```

use crate::binder::DocumentBinder;
use crate::config::IndexConfig;
use crate::criteria::{CompiledCriteria, CriteriaCompiler};
use crate::error::{IndexError, IndexResult};
use crate::lifecycle::{IndexManager, IndexWriterGuard};
use crate::rebuild::{default_priority, RebuildUnit};
use crate::schema::{SchemaDescriptor, SchemaRegistry};
use crate::search;
use crate::unique::UniquenessScanner;
use rcd_model::{
    ActivityFilter, Condition, Dictionary, DictionaryNamedPath, FilterCriteria, FilterResult,
    FilterValue, Group, Indexed, MetaField, MetaFieldNamedPath, Relation, Versioned,
    NAME_KEY_FIELD, PRIMARY_KEY_FIELD,
};
use rcd_storage::AuthoritativeStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Indexed access to one entity type.
pub struct DocumentService<E> {
    manager: Arc<IndexManager>,
    binder: DocumentBinder<E>,
    compiler: CriteriaCompiler<E>,
    store: Arc<dyn AuthoritativeStore<E>>,
    priority: i32,
}

impl<E: Indexed> DocumentService<E> {
    /// Describes `E`, then opens its index under `config.root`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for bad index metadata or configuration, or
    /// the failure to open the index.
    pub fn open(
        registry: &SchemaRegistry,
        config: IndexConfig,
        store: Arc<dyn AuthoritativeStore<E>>,
    ) -> IndexResult<Self> {
        let schema = registry.describe::<E>()?;
        let manager = Arc::new(IndexManager::new(
            E::ENTITY_TYPE,
            schema.native().schema().clone(),
            config,
        ));
        manager.open()?;
        Ok(Self {
            manager,
            binder: DocumentBinder::new(Arc::clone(&schema)),
            compiler: CriteriaCompiler::new(schema),
            store,
            priority: default_priority(E::ENTITY_TYPE),
        })
    }

    /// Sets the rebuild priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Returns the stable entity type name.
    #[must_use]
    pub fn entity_type(&self) -> &'static str {
        E::ENTITY_TYPE
    }

    /// Returns the index manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<IndexManager> {
        &self.manager
    }

    /// Returns the schema of `E`.
    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaDescriptor<E>> {
        self.binder.schema()
    }

    /// Returns the document binder.
    #[must_use]
    pub fn binder(&self) -> &DocumentBinder<E> {
        &self.binder
    }

    /// Returns the authoritative store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn AuthoritativeStore<E>> {
        &self.store
    }

    /// Returns criteria for the first page of the configured default size.
    #[must_use]
    pub fn default_criteria(&self) -> FilterCriteria {
        let count = i32::try_from(self.manager.config().default_page_size).unwrap_or(i32::MAX);
        FilterCriteria::new().page(0, count)
    }

    /// Compiles `criteria` against the schema of `E`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndexedField` or `Criteria` for invalid criteria.
    pub fn compile(&self, criteria: &FilterCriteria) -> IndexResult<CompiledCriteria> {
        self.compiler.compile(criteria)
    }

    // === Queries ===

    /// Returns one page of matches of `criteria`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndexedField` or `Criteria` for invalid criteria, or
    /// the engine or payload failure.
    pub fn find_by_criteria(&self, criteria: &FilterCriteria) -> IndexResult<FilterResult<E>> {
        let compiled = self.compile(criteria)?;
        let searcher = self.manager.searcher()?;
        self.manager.stats().record_search();
        search::find(&searcher, &self.binder, &compiled, criteria.offset, criteria.limit())
    }

    /// Returns the number of matches of `criteria`, ignoring paging.
    ///
    /// # Errors
    ///
    /// Same as [`find_by_criteria`](Self::find_by_criteria).
    pub fn count(&self, criteria: &FilterCriteria) -> IndexResult<usize> {
        let compiled = self.compile(criteria)?;
        let searcher = self.manager.searcher()?;
        self.manager.stats().record_search();
        search::count(&searcher, &compiled)
    }

    /// Returns the entity with primary key `id`, closed or not.
    ///
    /// # Errors
    ///
    /// Returns the engine or payload failure.
    pub fn find_by_id(&self, id: &str) -> IndexResult<Option<E>> {
        if id.trim().is_empty() {
            return Ok(None);
        }
        let criteria = FilterCriteria::new()
            .filter(PRIMARY_KEY_FIELD, FilterValue::string_eq(id))
            .activity(ActivityFilter::ALL)
            .page(0, 1);
        Ok(self.find_by_criteria(&criteria)?.items.into_iter().next())
    }

    /// Returns the entity with primary key `id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is none, or the engine or payload
    /// failure.
    pub fn get_by_id(&self, id: &str) -> IndexResult<E> {
        self.find_by_id(id)?
            .ok_or_else(|| IndexError::not_found(E::ENTITY_TYPE, id))
    }

    /// Returns the entities with the given primary keys, in the order of
    /// `ids`. Missing keys are skipped.
    ///
    /// # Errors
    ///
    /// Returns the engine or payload failure.
    pub fn find_by_ids(&self, ids: &[&str]) -> IndexResult<Vec<E>> {
        let wanted: Vec<&str> = ids.iter().copied().filter(|id| !id.trim().is_empty()).collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        let criteria = FilterCriteria::unbounded()
            .filter(
                PRIMARY_KEY_FIELD,
                FilterValue::string_set(wanted.iter().copied()).with_inner(Condition::Or),
            )
            .activity(ActivityFilter::ALL);

        let mut found: HashMap<String, E> = self
            .find_by_criteria(&criteria)?
            .items
            .into_iter()
            .map(|entity| (entity.id().to_string(), entity))
            .collect();
        Ok(wanted.into_iter().filter_map(|id| found.remove(id)).collect())
    }

    /// Returns the entities with the given primary keys, in the order of
    /// `ids`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for the first missing key, or the engine or
    /// payload failure.
    pub fn get_by_ids(&self, ids: &[&str]) -> IndexResult<Vec<E>> {
        let found = self.find_by_ids(ids)?;
        if let Some(missing) = ids
            .iter()
            .find(|id| !found.iter().any(|entity| entity.id() == **id))
        {
            return Err(IndexError::not_found(E::ENTITY_TYPE, *missing));
        }
        Ok(found)
    }

    /// Returns every active entity whose `relation_field` is `related_id`,
    /// in natural order.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndexedField` for an unknown relation field, or the
    /// engine or payload failure.
    pub fn find_all_by_relative(&self, relation_field: &str, related_id: &str) -> IndexResult<Vec<E>> {
        let criteria = FilterCriteria::unbounded()
            .filter(relation_field, FilterValue::string_eq(related_id));
        Ok(self.find_by_criteria(&criteria)?.items)
    }

    /// Returns the active entity under `related_id` whose `value_field` is
    /// `value`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateValue` if more than one entity matches, or the
    /// failure of the query.
    pub fn find_unique_by_relative(
        &self,
        relation_field: &str,
        related_id: &str,
        value_field: &str,
        value: &str,
    ) -> IndexResult<Option<E>> {
        let criteria = FilterCriteria::new()
            .filter(relation_field, FilterValue::string_eq(related_id))
            .filter(value_field, FilterValue::string_eq(value))
            .page(0, 2);
        let mut items = self.find_by_criteria(&criteria)?.items;
        if items.len() > 1 {
            return Err(IndexError::duplicate_value(E::ENTITY_TYPE, value_field, value));
        }
        Ok(items.pop())
    }

    /// Returns a uniqueness scanner of `field`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndexedField` unless `field` is filterable and
    /// sortable.
    pub fn scanner(&self, field: &str) -> IndexResult<UniquenessScanner<E>> {
        UniquenessScanner::new(Arc::clone(&self.manager), Arc::clone(self.schema()), field)
    }

    // === Writes ===

    /// Starts an index write transaction.
    ///
    /// Blocks while another write transaction on this index is open.
    ///
    /// # Errors
    ///
    /// Returns `IndexClosed` if the index is not open.
    pub fn begin(&self) -> IndexResult<IndexTransaction<'_, E>> {
        Ok(IndexTransaction {
            binder: &self.binder,
            guard: self.manager.writer()?,
        })
    }

    // === Rebuild ===

    /// Returns true if the index and the store disagree on the number of
    /// documents.
    ///
    /// # Errors
    ///
    /// Returns the failure of either count.
    pub fn is_corrupted(&self) -> IndexResult<bool> {
        let indexed = self.manager.num_docs()?;
        let expected = self.store.total_count()?;
        if indexed != expected {
            debug!(
                "{}",
                IndexError::IndexCorrupted {
                    index: E::ENTITY_TYPE.to_string(),
                    indexed,
                    expected,
                }
            );
        }
        Ok(indexed != expected)
    }

    /// Rebuilds the index from the store and returns its document count.
    ///
    /// The previous content stays visible until the new one replaces it.
    ///
    /// # Errors
    ///
    /// Returns the storage, encoding or engine failure. The previous
    /// content stays visible on failure.
    pub fn execute_rebuild(&self) -> IndexResult<usize> {
        let started = Instant::now();
        let config = self.manager.config();
        let page_size = config.rebuild_page_size;
        let interval = config.rebuild_log_interval;
        let expected = self.store.total_count()?;
        info!("rebuilding index {} from {} entities", E::ENTITY_TYPE, expected);

        let documents = self.manager.rebuild(|writer| {
            for page in self.store.iterate_all(page_size)? {
                for entity in page? {
                    writer.add(self.binder.encode(&entity)?)?;
                    if interval > 0 && writer.document_count() % interval == 0 {
                        info!(
                            "rebuilding index {}: {}/{} documents",
                            E::ENTITY_TYPE,
                            writer.document_count(),
                            expected
                        );
                    }
                }
            }
            Ok(())
        })?;

        info!(
            "rebuilt index {} with {} documents in {:?}",
            E::ENTITY_TYPE,
            documents,
            started.elapsed()
        );
        Ok(documents)
    }

    /// Closes the index.
    ///
    /// # Errors
    ///
    /// Returns the engine failure of the writer shutdown.
    pub fn close(&self) -> IndexResult<()> {
        self.manager.close()
    }
}

impl<E: Indexed> RebuildUnit for DocumentService<E> {
    fn name(&self) -> &str {
        E::ENTITY_TYPE
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_corrupted(&self) -> IndexResult<bool> {
        DocumentService::is_corrupted(self)
    }

    fn total_document_count(&self) -> IndexResult<usize> {
        Ok(self.store.total_count()?)
    }

    fn execute_rebuild(&self) -> IndexResult<usize> {
        DocumentService::execute_rebuild(self)
    }
}

impl<E> std::fmt::Debug for DocumentService<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("manager", &self.manager)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

// === Named paths ===

impl<E: Indexed> DocumentService<E> {
    /// Returns the active entity named `name`, compared case-insensitively,
    /// optionally restricted to the children of `parent`.
    fn find_named(&self, parent: Option<(&str, &str)>, name: &str) -> IndexResult<Option<E>> {
        // A blank filter value would mean "no name".
        if name.trim().is_empty() {
            return Ok(None);
        }
        let mut criteria = FilterCriteria::new();
        if let Some((relation_field, related_id)) = parent {
            criteria = criteria.filter(relation_field, FilterValue::string_eq(related_id));
        }
        let criteria = criteria
            .filter(NAME_KEY_FIELD, FilterValue::string_eq(name.to_lowercase()))
            .page(0, 1);
        Ok(self.find_by_criteria(&criteria)?.items.into_iter().next())
    }
}

impl DocumentService<Dictionary> {
    /// Resolves `group.dictionary`. Names compare case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns the failure of either lookup.
    pub fn find_by_path(
        &self,
        groups: &DocumentService<Group>,
        path: &DictionaryNamedPath,
    ) -> IndexResult<Option<Dictionary>> {
        let Some(group) = groups.find_named(None, &path.group_name)? else {
            return Ok(None);
        };
        self.find_named(
            Some((Dictionary::RELATION_FIELD, &group.id)),
            &path.dictionary_name,
        )
    }
}

impl DocumentService<MetaField> {
    /// Resolves `group.dictionary[field]`. Names compare case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns the failure of any lookup.
    pub fn find_by_path(
        &self,
        dictionaries: &DocumentService<Dictionary>,
        groups: &DocumentService<Group>,
        path: &MetaFieldNamedPath,
    ) -> IndexResult<Option<MetaField>> {
        let Some(dictionary) = dictionaries.find_by_path(groups, &path.dictionary)? else {
            return Ok(None);
        };
        self.find_named(
            Some((MetaField::RELATION_FIELD, &dictionary.id)),
            &path.field_name,
        )
    }
}

/// Index side of one write transaction.
///
/// Stage the changes the authoritative store committed, then
/// [`commit`](Self::commit). Dropping the transaction rolls it back.
pub struct IndexTransaction<'a, E> {
    binder: &'a DocumentBinder<E>,
    guard: IndexWriterGuard<'a>,
}

impl<E: Indexed> IndexTransaction<'_, E> {
    /// Stages an insert or replacement of `entity`.
    ///
    /// # Errors
    ///
    /// Returns the encoding failure.
    pub fn upsert(&mut self, entity: &E) -> IndexResult<()> {
        let document = self.binder.encode(entity)?;
        self.guard.upsert(self.binder.key_term(entity.id()), document);
        Ok(())
    }

    /// Stages inserts or replacements of `entities`.
    ///
    /// # Errors
    ///
    /// Returns the first encoding failure.
    pub fn upsert_all<'e>(&mut self, entities: impl IntoIterator<Item = &'e E>) -> IndexResult<()>
    where
        E: 'e,
    {
        for entity in entities {
            self.upsert(entity)?;
        }
        Ok(())
    }

    /// Stages the removal of the entity with primary key `id`.
    pub fn remove(&mut self, id: &str) {
        self.guard.delete(self.binder.key_term(id));
    }

    /// Returns the number of staged changes.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.guard.change_count()
    }

    /// Commits the staged changes and refreshes readers.
    ///
    /// Call only after the authoritative store committed.
    ///
    /// # Errors
    ///
    /// Returns the write failure. Nothing staged is visible on failure.
    pub fn commit(self) -> IndexResult<u64> {
        self.guard.commit()
    }

    /// Discards the staged changes.
    pub fn rollback(self) {
        self.guard.rollback();
    }
}

impl<E: Indexed + Versioned> IndexTransaction<'_, E> {
    /// Marks `entities` as closed and stages their replacement.
    ///
    /// The caller persists the closed entities to the store.
    ///
    /// # Errors
    ///
    /// Returns the first encoding failure.
    pub fn close_entities(&mut self, entities: &mut [E]) -> IndexResult<()> {
        for entity in entities.iter_mut() {
            entity.close();
            self.upsert(entity)?;
        }
        Ok(())
    }
}

impl<E> std::fmt::Debug for IndexTransaction<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexTransaction")
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}
