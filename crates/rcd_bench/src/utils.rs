//! Benchmark utilities.

use rand::seq::SliceRandom;
use rand::Rng;
use rcd_index::{DocumentService, IndexConfig, SchemaRegistry};
use rcd_model::{Dictionary, Indexed, Versioned};
use rcd_storage::{AuthoritativeStore, InMemoryStore};
use std::path::Path;
use std::sync::Arc;

const WORDS: &[&str] = &[
    "country", "currency", "region", "code", "unit", "measure", "product", "category", "tariff",
    "address", "language", "industry", "customs", "account", "ledger",
];

/// Generate a random description of `words` words.
pub fn random_text(words: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..words)
        .filter_map(|_| WORDS.choose(&mut rng).copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Generate dictionaries spread over `groups` groups, a tenth of them closed.
pub fn generate_dictionaries(count: usize, groups: usize) -> Vec<Dictionary> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let group = rng.gen_range(0..groups.max(1));
            let mut dictionary = Dictionary::new(format!("group-{group}"), format!("dictionary {i:06}"));
            dictionary.description = Some(random_text(6));
            if rng.gen_ratio(1, 10) {
                dictionary.close();
            }
            dictionary
        })
        .collect()
}

/// Open a service over an in-memory store holding `entities`, rebuilt.
pub fn open_indexed<E: Indexed>(root: &Path, entities: Vec<E>) -> DocumentService<E> {
    let store: Arc<dyn AuthoritativeStore<E>> = Arc::new(InMemoryStore::with_entities(entities));
    let service = DocumentService::open(&SchemaRegistry::new(), IndexConfig::new(root), store)
        .expect("Failed to open service");
    service.execute_rebuild().expect("Failed to rebuild");
    service
}
