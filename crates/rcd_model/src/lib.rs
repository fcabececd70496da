//! # RCD Model
//!
//! Entity model shared by the RCD master-data store.
//!
//! This crate provides:
//! - Entity capabilities (`Entity`, `Versioned`, `Named`, `Relation`)
//! - Change types and soft-versioned history
//! - The domain documents (groups, dictionaries, meta-fields, fields, records)
//!   and recoding rules
//! - Static index metadata declarations consumed by the schema registry
//! - The serializable filter criteria model
//! - Named paths used as alternate lookup keys

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod criteria;
mod document;
mod entity;
mod error;
mod indexed;
mod path;
mod rule;

pub use change::{ChangeType, ChangeTypeSet, History};
pub use criteria::{
    ActivityFilter, Condition, FilterCriteria, FilterResult, FilterValue, Filters, SortOrder,
    COUNT_ALL, COUNT_DEFAULT,
};
pub use document::{Dictionary, Field, Group, MetaField, MetaFieldType, Record};
pub use entity::{new_id, Entity, Named, Relation, Versioned};
pub use error::{ModelError, ModelResult};
pub use indexed::{
    FieldAccessor, FieldDeclaration, FieldValue, IndexMetadata, Indexed, ValueKind,
    CHANGE_TYPE_FIELD, DEFAULT_SEARCH_FIELD, NAME_KEY_FIELD, PAYLOAD_FIELD, PRIMARY_KEY_FIELD,
};
pub use path::{DictionaryNamedPath, FieldNamedPath, MetaFieldNamedPath};
pub use rule::{RecodeRule, RecodeRuleSet};

/// Model version for compatibility checks.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
