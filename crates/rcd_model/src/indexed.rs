//! Static index metadata declarations.
//!
//! Every indexed entity type declares, once and statically, which of its
//! fields are indexed and with which capabilities. The declaration names
//! fields only; the entity resolves each name to a [`FieldAccessor`] through
//! [`Indexed::accessor`]. The schema registry validates the pair at startup.
//!
//! # Example
//!
//! ```rust,ignore
//! impl Indexed for Field {
//!     const ENTITY_TYPE: &'static str = "Field";
//!     const INDEX_METADATA: IndexMetadata = IndexMetadata::new(PRIMARY_KEY_FIELD)
//!         .fields(&[
//!             FieldDeclaration::new("metaFieldId"),
//!             FieldDeclaration::new("value").searchable(),
//!         ]);
//!
//!     fn accessor(field: &str) -> Option<FieldAccessor<Self>> {
//!         match field {
//!             "id" => Some(FieldAccessor::new(ValueKind::String, |f| FieldValue::text(&f.id))),
//!             _ => None,
//!         }
//!     }
//! }
//! ```

use crate::entity::Entity;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Logical name of the primary key field.
pub const PRIMARY_KEY_FIELD: &str = "id";

/// Logical name of the lowercased name of named entities. Resolves names
/// case-insensitively through an exact filter.
pub const NAME_KEY_FIELD: &str = "nameKey";

/// Logical name of the change-type field of versioned entities.
pub const CHANGE_TYPE_FIELD: &str = "changeType";

/// Physical name of the synthesized free-text field.
pub const DEFAULT_SEARCH_FIELD: &str = "defaultSearch";

/// Physical name of the serialized entity snapshot.
pub const PAYLOAD_FIELD: &str = "payload";

/// Kind of value an accessor produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Text, indexed as an exact-match token.
    String,
    /// Integer or decimal, indexed as canonical text.
    Number,
    /// Instant, indexed as epoch milliseconds.
    Date,
    /// Enumeration, indexed by name.
    Enum,
    /// Boolean, indexed as `true`/`false`.
    Boolean,
    /// A collection of values. Never indexable.
    Collection,
}

impl ValueKind {
    /// Returns true if values of this kind can be indexed.
    #[must_use]
    pub const fn is_indexable(self) -> bool {
        !matches!(self, ValueKind::Collection)
    }
}

/// A scalar value read from an entity field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// No value.
    Null,
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Decimal value.
    Float(f64),
    /// Instant value.
    Date(DateTime<Utc>),
    /// Enumeration value, by name.
    Enum(&'static str),
    /// Boolean value.
    Bool(bool),
}

impl FieldValue {
    /// Creates a text value.
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// Creates a text value, or `Null` when absent.
    pub fn optional_text(value: Option<&str>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::text)
    }

    /// Returns true for `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

/// Reads one field of an entity.
pub struct FieldAccessor<E> {
    /// Kind of the produced value.
    pub kind: ValueKind,
    /// Reads the value.
    pub read: fn(&E) -> FieldValue,
}

impl<E> FieldAccessor<E> {
    /// Creates an accessor.
    #[must_use]
    pub const fn new(kind: ValueKind, read: fn(&E) -> FieldValue) -> Self {
        Self { kind, read }
    }

    /// Reads the value from `entity`.
    pub fn get(&self, entity: &E) -> FieldValue {
        (self.read)(entity)
    }
}

impl<E> Clone for FieldAccessor<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for FieldAccessor<E> {}

impl<E> fmt::Debug for FieldAccessor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Declaration of one indexed field.
///
/// Defaults follow the common case: filterable and sortable, not searchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDeclaration {
    /// Logical field name.
    pub name: &'static str,
    /// Contributes tokens to the free-text field.
    pub search: bool,
    /// Indexed for exact matching.
    pub filter: bool,
    /// Stored for sorting.
    pub sort: bool,
    /// Extra logical names resolving to this field.
    pub aliases: &'static [&'static str],
}

impl FieldDeclaration {
    /// Declares a filterable, sortable field.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            search: false,
            filter: true,
            sort: true,
            aliases: &[],
        }
    }

    /// Marks the field as searchable.
    #[must_use]
    pub const fn searchable(mut self) -> Self {
        self.search = true;
        self
    }

    /// Disables filtering.
    #[must_use]
    pub const fn not_filterable(mut self) -> Self {
        self.filter = false;
        self
    }

    /// Disables sorting.
    #[must_use]
    pub const fn not_sortable(mut self) -> Self {
        self.sort = false;
        self
    }

    /// Sets the aliases.
    #[must_use]
    pub const fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }
}

/// Index metadata of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMetadata {
    /// Logical name of the primary key.
    pub primary_key: &'static str,
    /// Indexed fields, in declaration order.
    pub fields: &'static [FieldDeclaration],
    /// Fields holding collections, stripped from the stored payload.
    pub collections: &'static [&'static str],
    /// Name field of `Named` entities, sorted before the primary key by default.
    pub name_field: Option<&'static str>,
}

impl IndexMetadata {
    /// Creates metadata with the given primary key and no fields.
    #[must_use]
    pub const fn new(primary_key: &'static str) -> Self {
        Self {
            primary_key,
            fields: &[],
            collections: &[],
            name_field: None,
        }
    }

    /// Sets the indexed fields.
    #[must_use]
    pub const fn fields(mut self, fields: &'static [FieldDeclaration]) -> Self {
        self.fields = fields;
        self
    }

    /// Sets the collection fields.
    #[must_use]
    pub const fn collections(mut self, collections: &'static [&'static str]) -> Self {
        self.collections = collections;
        self
    }

    /// Marks the entity as named by `field`.
    #[must_use]
    pub const fn named(mut self, field: &'static str) -> Self {
        self.name_field = Some(field);
        self
    }
}

/// An entity type stored in the search index.
pub trait Indexed: Entity + Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Stable name of the entity type. Names the index directory.
    const ENTITY_TYPE: &'static str;

    /// Static index metadata.
    const INDEX_METADATA: IndexMetadata;

    /// Resolves a logical field name to an accessor.
    fn accessor(field: &str) -> Option<FieldAccessor<Self>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_defaults() {
        let decl = FieldDeclaration::new("name");
        assert!(decl.filter);
        assert!(decl.sort);
        assert!(!decl.search);
        assert!(decl.aliases.is_empty());
    }

    #[test]
    fn declaration_builder() {
        let decl = FieldDeclaration::new("fromFieldId")
            .searchable()
            .not_sortable()
            .aliases(&["fieldId"]);
        assert!(decl.search);
        assert!(!decl.sort);
        assert_eq!(decl.aliases, &["fieldId"]);
    }

    #[test]
    fn metadata_builder() {
        const FIELDS: &[FieldDeclaration] = &[FieldDeclaration::new("name")];
        let meta = IndexMetadata::new("id")
            .fields(FIELDS)
            .collections(&["children"])
            .named("name");
        assert_eq!(meta.primary_key, "id");
        assert_eq!(meta.fields.len(), 1);
        assert_eq!(meta.name_field, Some("name"));
    }

    #[test]
    fn collections_are_not_indexable() {
        assert!(!ValueKind::Collection.is_indexable());
        assert!(ValueKind::Date.is_indexable());
    }
}
