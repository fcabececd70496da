//! Memoizing schema registry.

use super::{Capabilities, IndexedFieldDescriptor, NativeSchema, SchemaDescriptor};
use crate::error::{IndexError, IndexResult};
use parking_lot::RwLock;
use rcd_model::{Indexed, ValueKind, DEFAULT_SEARCH_FIELD, PAYLOAD_FIELD};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builds and caches one [`SchemaDescriptor`] per entity type.
///
/// The registry is constructed once at startup and shared by reference
/// with every component that needs schema lookups.
///
/// # Thread Safety
///
/// Lookups take a read lock. A descriptor built concurrently by two
/// threads is inserted once; both callers receive the cached instance.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the descriptor of `E`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the metadata of `E` is invalid.
    pub fn describe<E: Indexed>(&self) -> IndexResult<Arc<SchemaDescriptor<E>>> {
        let key = TypeId::of::<E>();
        if let Some(cached) = self.schemas.read().get(&key) {
            return downcast::<E>(cached.clone());
        }

        let descriptor: Arc<dyn Any + Send + Sync> = Arc::new(build::<E>()?);
        let cached = self
            .schemas
            .write()
            .entry(key)
            .or_insert(descriptor)
            .clone();
        debug!("registered index schema of {}", E::ENTITY_TYPE);
        downcast::<E>(cached)
    }

    /// Resolves a logical field name of `E`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the metadata of `E` is invalid, or
    /// `UnknownIndexedField` if no field has that name.
    pub fn field_descriptor<E: Indexed>(
        &self,
        logical_name: &str,
    ) -> IndexResult<IndexedFieldDescriptor<E>> {
        self.describe::<E>()?.field(logical_name).cloned()
    }

    /// Returns the number of registered entity types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    /// Returns true if no entity type has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("types", &self.len())
            .finish_non_exhaustive()
    }
}

fn downcast<E: Indexed>(
    cached: Arc<dyn Any + Send + Sync>,
) -> IndexResult<Arc<SchemaDescriptor<E>>> {
    cached
        .downcast::<SchemaDescriptor<E>>()
        .map_err(|_| IndexError::configuration(E::ENTITY_TYPE, "schema registered under a foreign type"))
}

fn build<E: Indexed>() -> IndexResult<SchemaDescriptor<E>> {
    let entity_type = E::ENTITY_TYPE;
    let metadata = E::INDEX_METADATA;

    if entity_type.is_empty()
        || !entity_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(IndexError::configuration(
            entity_type,
            "entity type name must be a non-empty directory-safe name",
        ));
    }

    if metadata.primary_key.is_empty() {
        return Err(IndexError::configuration(
            entity_type,
            "missing primary key declaration",
        ));
    }
    let pk_accessor = E::accessor(metadata.primary_key).ok_or_else(|| {
        IndexError::configuration(
            entity_type,
            format!("primary key '{}' has no accessor", metadata.primary_key),
        )
    })?;
    if !matches!(pk_accessor.kind, ValueKind::String) {
        return Err(IndexError::configuration(
            entity_type,
            format!("primary key must be a string, found {:?}", pk_accessor.kind),
        ));
    }
    let primary_key = IndexedFieldDescriptor {
        name: metadata.primary_key.to_string(),
        source: metadata.primary_key.to_string(),
        kind: pk_accessor.kind,
        accessor: pk_accessor,
        capabilities: Capabilities {
            searchable: false,
            filterable: true,
            sortable: true,
        },
        aliases: Vec::new(),
    };

    let mut fields: Vec<IndexedFieldDescriptor<E>> = Vec::new();
    for declaration in metadata.fields {
        let name = declaration.name;
        if name == metadata.primary_key || fields.iter().any(|f| f.source == name && !f.is_alias()) {
            return Err(IndexError::configuration(
                entity_type,
                format!("field '{name}' is declared twice"),
            ));
        }
        if name == PAYLOAD_FIELD || name == DEFAULT_SEARCH_FIELD {
            return Err(IndexError::configuration(
                entity_type,
                format!("field name '{name}' is reserved"),
            ));
        }
        let accessor = E::accessor(name).ok_or_else(|| {
            IndexError::configuration(entity_type, format!("declared field '{name}' has no accessor"))
        })?;
        if !accessor.kind.is_indexable() {
            return Err(IndexError::configuration(
                entity_type,
                format!("unsupported value type {:?} of field '{name}'", accessor.kind),
            ));
        }
        let capabilities = Capabilities {
            searchable: declaration.search,
            filterable: declaration.filter,
            sortable: declaration.sort,
        };
        fields.push(IndexedFieldDescriptor {
            name: name.to_string(),
            source: name.to_string(),
            kind: accessor.kind,
            accessor,
            capabilities,
            aliases: declaration.aliases.iter().map(|a| (*a).to_string()).collect(),
        });
        // An alias carries the value of its delegate under another name.
        for alias in declaration.aliases {
            fields.push(IndexedFieldDescriptor {
                name: (*alias).to_string(),
                source: name.to_string(),
                kind: accessor.kind,
                accessor,
                capabilities: Capabilities {
                    searchable: false,
                    ..capabilities
                },
                aliases: Vec::new(),
            });
        }
    }

    for collection in metadata.collections {
        match E::accessor(collection) {
            Some(accessor) if accessor.kind == ValueKind::Collection => {}
            _ => {
                return Err(IndexError::configuration(
                    entity_type,
                    format!("'{collection}' is not a collection field"),
                ))
            }
        }
    }

    if let Some(name_field) = metadata.name_field {
        let sortable = fields
            .iter()
            .any(|f| f.name == name_field && f.capabilities.sortable);
        if !sortable {
            return Err(IndexError::configuration(
                entity_type,
                format!("name field '{name_field}' must be declared sortable"),
            ));
        }
    }

    let native = NativeSchema::build(entity_type, &primary_key, &fields)?;
    Ok(SchemaDescriptor {
        entity_type,
        primary_key,
        fields,
        collections: metadata.collections.to_vec(),
        name_field: metadata.name_field,
        native,
    })
}
