//! Every indexed entity type, backed by its JSON-lines data file.

use crate::error::{CliError, CliResult};
use rcd_index::{
    DocumentService, EventBus, IndexConfig, IndexResult, IndexStatsSnapshot, RebuildCoordinator,
    RebuildUnit, SchemaRegistry,
};
use rcd_model::{
    Dictionary, Field, FilterCriteria, Group, Indexed, MetaField, RecodeRule, RecodeRuleSet, Record,
};
use rcd_storage::{AuthoritativeStore, JsonLinesStore};
use std::path::Path;
use std::sync::Arc;

/// Type-erased view of one document service.
pub trait Entry: Send + Sync {
    /// Returns the stable entity type name.
    fn name(&self) -> &'static str;

    /// Returns the criteria used when none are given.
    fn default_criteria(&self) -> FilterCriteria;

    /// Runs `criteria` and returns the result as JSON.
    fn query(&self, criteria: &FilterCriteria) -> CliResult<serde_json::Value>;

    /// Returns the live documents of the index.
    fn indexed_count(&self) -> IndexResult<usize>;

    /// Returns the entities of the data file.
    fn stored_count(&self) -> IndexResult<usize>;

    /// Returns the live generation.
    fn generation(&self) -> Option<u64>;

    /// Returns the index counters.
    fn stats(&self) -> IndexStatsSnapshot;

    /// Closes the index.
    fn close(&self) -> IndexResult<()>;
}

impl<E: Indexed> Entry for DocumentService<E> {
    fn name(&self) -> &'static str {
        E::ENTITY_TYPE
    }

    fn default_criteria(&self) -> FilterCriteria {
        DocumentService::default_criteria(self)
    }

    fn query(&self, criteria: &FilterCriteria) -> CliResult<serde_json::Value> {
        let result = self.find_by_criteria(criteria)?;
        Ok(serde_json::to_value(result)?)
    }

    fn indexed_count(&self) -> IndexResult<usize> {
        self.manager().num_docs()
    }

    fn stored_count(&self) -> IndexResult<usize> {
        Ok(self.store().total_count()?)
    }

    fn generation(&self) -> Option<u64> {
        self.manager().generation()
    }

    fn stats(&self) -> IndexStatsSnapshot {
        self.manager().stats().snapshot()
    }

    fn close(&self) -> IndexResult<()> {
        DocumentService::close(self)
    }
}

/// All indexes of a store plus the rebuild coordinator over them.
pub struct Catalog {
    entries: Vec<Arc<dyn Entry>>,
    coordinator: RebuildCoordinator,
}

impl Catalog {
    /// Opens every index under `config.root`, reading data files from
    /// `data_dir`.
    pub fn open(data_dir: &Path, config: IndexConfig) -> CliResult<Self> {
        let registry = SchemaRegistry::new();
        let mut catalog = Self {
            entries: Vec::new(),
            coordinator: RebuildCoordinator::new(Arc::new(EventBus::new())),
        };
        catalog.add::<Group>(&registry, data_dir, &config)?;
        catalog.add::<Dictionary>(&registry, data_dir, &config)?;
        catalog.add::<MetaField>(&registry, data_dir, &config)?;
        catalog.add::<Field>(&registry, data_dir, &config)?;
        catalog.add::<RecodeRuleSet>(&registry, data_dir, &config)?;
        catalog.add::<RecodeRule>(&registry, data_dir, &config)?;
        catalog.add::<Record>(&registry, data_dir, &config)?;
        Ok(catalog)
    }

    fn add<E: Indexed>(
        &mut self,
        registry: &SchemaRegistry,
        data_dir: &Path,
        config: &IndexConfig,
    ) -> CliResult<()> {
        let path = data_dir.join(format!("{}.jsonl", E::ENTITY_TYPE));
        let store: Arc<dyn AuthoritativeStore<E>> = Arc::new(JsonLinesStore::<E>::open(&path)?);
        let service = Arc::new(DocumentService::open(registry, config.clone(), store)?);
        self.entries.push(Arc::clone(&service) as Arc<dyn Entry>);
        self.coordinator.register(service as Arc<dyn RebuildUnit>);
        Ok(())
    }

    /// Returns the entries in rebuild order.
    pub fn entries(&self) -> &[Arc<dyn Entry>] {
        &self.entries
    }

    /// Returns the entry of `name`, compared case-insensitively.
    pub fn entry(&self, name: &str) -> CliResult<&Arc<dyn Entry>> {
        self.entries
            .iter()
            .find(|entry| entry.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| CliError::UnknownEntity(name.to_string()))
    }

    /// Returns the rebuild coordinator.
    pub fn coordinator(&self) -> &RebuildCoordinator {
        &self.coordinator
    }

    /// Closes every index.
    pub fn close(&self) -> CliResult<()> {
        for entry in &self.entries {
            entry.close()?;
        }
        Ok(())
    }
}
