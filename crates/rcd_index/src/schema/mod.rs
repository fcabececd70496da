//! Schema registry.
//!
//! Derives, from the static [`IndexMetadata`](rcd_model::IndexMetadata) of
//! an entity type, which fields are indexed and with what capabilities, and
//! lays them out as physical fields of the search engine.
//!
//! Descriptors are built once per entity type, validated at that point and
//! cached by the [`SchemaRegistry`] for the lifetime of the registry.

mod native;
mod registry;

pub use native::NativeSchema;
pub use registry::SchemaRegistry;

use crate::error::{IndexError, IndexResult};
use rcd_model::{FieldAccessor, FieldValue, ValueKind};
use std::fmt;

/// What an indexed field can be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Contributes tokens to the free-text field.
    pub searchable: bool,
    /// Usable in filters.
    pub filterable: bool,
    /// Usable as a sort key.
    pub sortable: bool,
}

impl Capabilities {
    /// Merges two capability sets.
    #[must_use]
    pub const fn union(self, other: Capabilities) -> Capabilities {
        Capabilities {
            searchable: self.searchable || other.searchable,
            filterable: self.filterable || other.filterable,
            sortable: self.sortable || other.sortable,
        }
    }
}

/// Describes one indexed field of an entity type.
pub struct IndexedFieldDescriptor<E> {
    /// Logical name, also the physical field name.
    pub name: String,
    /// Declared field the value is read from. Differs from `name` for aliases.
    pub source: String,
    /// Kind of the value.
    pub kind: ValueKind,
    /// Reads the value.
    pub accessor: FieldAccessor<E>,
    /// Capabilities.
    pub capabilities: Capabilities,
    /// Aliases of a declared field. Empty for alias descriptors.
    pub aliases: Vec<String>,
}

impl<E> IndexedFieldDescriptor<E> {
    /// Returns true if this descriptor is an alias of another field.
    #[must_use]
    pub fn is_alias(&self) -> bool {
        self.name != self.source
    }

    /// Reads the field value of `entity`.
    pub fn read(&self, entity: &E) -> FieldValue {
        self.accessor.get(entity)
    }
}

impl<E> Clone for IndexedFieldDescriptor<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            source: self.source.clone(),
            kind: self.kind,
            accessor: self.accessor,
            capabilities: self.capabilities,
            aliases: self.aliases.clone(),
        }
    }
}

impl<E> fmt::Debug for IndexedFieldDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedFieldDescriptor")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .field("aliases", &self.aliases)
            .finish_non_exhaustive()
    }
}

/// Indexed layout of one entity type.
///
/// Immutable once built.
pub struct SchemaDescriptor<E> {
    entity_type: &'static str,
    primary_key: IndexedFieldDescriptor<E>,
    fields: Vec<IndexedFieldDescriptor<E>>,
    collections: Vec<&'static str>,
    name_field: Option<&'static str>,
    native: NativeSchema,
}

impl<E> SchemaDescriptor<E> {
    /// Returns the stable entity type name.
    #[must_use]
    pub fn entity_type(&self) -> &'static str {
        self.entity_type
    }

    /// Returns the primary key descriptor.
    #[must_use]
    pub fn primary_key(&self) -> &IndexedFieldDescriptor<E> {
        &self.primary_key
    }

    /// Returns the declared and alias descriptors in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[IndexedFieldDescriptor<E>] {
        &self.fields
    }

    /// Returns the collection fields stripped from the payload.
    #[must_use]
    pub fn collections(&self) -> &[&'static str] {
        &self.collections
    }

    /// Returns the name field of named entity types.
    #[must_use]
    pub fn name_field(&self) -> Option<&'static str> {
        self.name_field
    }

    /// Returns the physical layout.
    #[must_use]
    pub fn native(&self) -> &NativeSchema {
        &self.native
    }

    /// Returns true if the entity type has a change-type field.
    #[must_use]
    pub fn is_versioned(&self) -> bool {
        self.field(rcd_model::CHANGE_TYPE_FIELD).is_ok()
    }

    /// Resolves a logical field name.
    ///
    /// Finds the primary key, or the first declared or alias field with
    /// that name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndexedField` if no field has that name.
    pub fn field(&self, name: &str) -> IndexResult<&IndexedFieldDescriptor<E>> {
        if self.primary_key.name == name {
            return Ok(&self.primary_key);
        }
        self.fields
            .iter()
            .find(|descriptor| descriptor.name == name)
            .ok_or_else(|| IndexError::unknown_field(self.entity_type, name))
    }

    /// Resolves a logical field name usable in filters.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndexedField` if the field is unknown or not filterable.
    pub fn filterable(&self, name: &str) -> IndexResult<&IndexedFieldDescriptor<E>> {
        let descriptor = self.field(name)?;
        if descriptor.capabilities.filterable {
            Ok(descriptor)
        } else {
            Err(IndexError::unknown_field(self.entity_type, name))
        }
    }

    /// Resolves a logical field name usable as a sort key.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndexedField` if the field is unknown or not sortable.
    pub fn sortable(&self, name: &str) -> IndexResult<&IndexedFieldDescriptor<E>> {
        let descriptor = self.field(name)?;
        if descriptor.capabilities.sortable {
            Ok(descriptor)
        } else {
            Err(IndexError::unknown_field(self.entity_type, name))
        }
    }

    /// Returns the searchable declared fields.
    pub fn searchable(&self) -> impl Iterator<Item = &IndexedFieldDescriptor<E>> {
        self.fields
            .iter()
            .filter(|descriptor| descriptor.capabilities.searchable && !descriptor.is_alias())
    }
}

impl<E> fmt::Debug for SchemaDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaDescriptor")
            .field("entity_type", &self.entity_type)
            .field("primary_key", &self.primary_key.name)
            .field("fields", &self.fields)
            .field("collections", &self.collections)
            .field("name_field", &self.name_field)
            .finish_non_exhaustive()
    }
}
