//! Test fixtures and index helpers.
//!
//! Provides a document service over a temporary index directory and the
//! sample data sets shared by the integration tests.

use rcd_index::{DocumentService, IndexConfig, RebuildUnit, SchemaRegistry};
use rcd_model::Indexed;
use rcd_storage::{AuthoritativeStore, InMemoryStore};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A document service over an in-memory store and a temporary index.
pub struct TestService<E: Indexed> {
    /// The service under test.
    pub service: Arc<DocumentService<E>>,
    /// The authoritative store behind the service.
    pub store: Arc<InMemoryStore<E>>,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl<E: Indexed> TestService<E> {
    /// Creates a service over an empty store.
    pub fn new() -> Self {
        Self::with_entities(Vec::new())
    }

    /// Creates a service whose store holds `entities`. The index stays
    /// empty until it is synced or rebuilt.
    pub fn with_entities(entities: impl IntoIterator<Item = E>) -> Self {
        Self::with_config(entities, |config| config)
    }

    /// Creates a service with an adjusted index configuration.
    pub fn with_config(
        entities: impl IntoIterator<Item = E>,
        configure: impl FnOnce(IndexConfig) -> IndexConfig,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(InMemoryStore::with_entities(entities));
        let service = Arc::new(open_service(&temp_dir, Arc::clone(&store) as _, configure));
        Self {
            service,
            store,
            temp_dir,
        }
    }

    /// Creates a service whose store and index both hold `entities`.
    pub fn synced(entities: impl IntoIterator<Item = E>) -> Self {
        let test = Self::with_entities(entities);
        test.sync();
        test
    }

    /// Returns the index root directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the service as a rebuild unit.
    pub fn unit(&self) -> Arc<dyn RebuildUnit> {
        Arc::clone(&self.service) as Arc<dyn RebuildUnit>
    }

    /// Writes `entities` to the store and the index in one transaction.
    pub fn put_all(&self, entities: &[E]) {
        let mut tx = self.service.begin().expect("Failed to begin transaction");
        tx.upsert_all(entities).expect("Failed to index entities");
        tx.commit().expect("Failed to commit");
        self.store.put_all(entities.iter().cloned());
    }

    /// Indexes every stored entity without a rebuild.
    pub fn sync(&self) {
        let entities = self.store.get_all().expect("Failed to read store");
        let mut tx = self.service.begin().expect("Failed to begin transaction");
        tx.upsert_all(&entities).expect("Failed to index entities");
        tx.commit().expect("Failed to commit");
    }
}

impl<E: Indexed> Default for TestService<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Indexed> std::ops::Deref for TestService<E> {
    type Target = DocumentService<E>;

    fn deref(&self) -> &Self::Target {
        &self.service
    }
}

/// Opens a service for `E` under `temp_dir` over any store.
pub fn open_service<E: Indexed>(
    temp_dir: &TempDir,
    store: Arc<dyn AuthoritativeStore<E>>,
    configure: impl FnOnce(IndexConfig) -> IndexConfig,
) -> DocumentService<E> {
    let config = configure(IndexConfig::new(temp_dir.path()));
    DocumentService::open(&SchemaRegistry::new(), config, store).expect("Failed to open service")
}

/// Sample data sets.
pub mod scenarios {
    use rcd_model::{Dictionary, Field, Group, MetaField, Versioned};

    /// Group id shared by the sample dictionaries.
    pub const GROUP_ID: &str = "group-1";

    /// Meta-field id shared by the sample fields.
    pub const META_FIELD_ID: &str = "meta-field-1";

    /// Dictionaries alpha and beta, active, and gamma, closed.
    pub fn alpha_beta_gamma() -> Vec<Dictionary> {
        let mut gamma = Dictionary::new(GROUP_ID, "gamma");
        gamma.close();
        vec![
            Dictionary::new(GROUP_ID, "beta"),
            gamma,
            Dictionary::new(GROUP_ID, "alpha"),
        ]
    }

    /// `count` dictionaries of one group named `d000`, `d001`, and so on.
    pub fn numbered_dictionaries(count: usize) -> Vec<Dictionary> {
        (0..count)
            .map(|i| Dictionary::new(GROUP_ID, format!("d{i:03}")))
            .collect()
    }

    /// Field values of one meta-field.
    pub fn sibling_fields(values: &[&str]) -> Vec<Field> {
        values
            .iter()
            .map(|value| Field::new(META_FIELD_ID, *value))
            .collect()
    }

    /// A group holding one dictionary holding one meta-field.
    pub fn hierarchy() -> (Group, Dictionary, MetaField) {
        let group = Group::new("geo");
        let dictionary = Dictionary::new(&group.id, "countries");
        let meta_field = MetaField::new(&dictionary.id, "code");
        (group, dictionary, meta_field)
    }
}
