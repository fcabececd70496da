//! Master-data documents.
//!
//! The hierarchy is group → dictionary → meta-field → field, with records
//! grouping the fields of one dictionary row. Parent entities hold their
//! children in collection fields which are never stored in the index
//! payload; callers re-attach them from relations.

use crate::change::History;
use crate::entity::{new_id, Entity, Named, Relation, Versioned};
use crate::indexed::{
    FieldAccessor, FieldDeclaration, FieldValue, IndexMetadata, Indexed, ValueKind,
    NAME_KEY_FIELD, PRIMARY_KEY_FIELD,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub(crate) const HISTORY_FIELDS: [FieldDeclaration; 3] = [
    FieldDeclaration::new("historyId"),
    FieldDeclaration::new("changeType"),
    FieldDeclaration::new("changeDate"),
];

/// Resolves the accessors shared by every versioned entity.
pub(crate) fn history_accessor<E: Versioned>(field: &str) -> Option<FieldAccessor<E>> {
    match field {
        "historyId" => Some(FieldAccessor::new(ValueKind::String, |e: &E| {
            FieldValue::text(&e.history().history_id)
        })),
        "changeType" => Some(FieldAccessor::new(ValueKind::Enum, |e: &E| {
            FieldValue::Enum(e.history().change_type.name())
        })),
        "changeDate" => Some(FieldAccessor::new(ValueKind::Date, |e: &E| {
            FieldValue::Date(e.history().change_date)
        })),
        _ => None,
    }
}

macro_rules! versioned {
    ($ty:ty) => {
        impl Entity for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        }

        impl Versioned for $ty {
            fn history(&self) -> &History {
                &self.history
            }

            fn history_mut(&mut self) -> &mut History {
                &mut self.history
            }
        }
    };
}

pub(crate) use versioned;

/// A top-level group of dictionaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Primary key.
    pub id: String,
    /// Version history.
    pub history: History,
    /// Unique group name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Owning user or department.
    pub owner: Option<String>,
    /// Dictionaries of this group.
    #[serde(default)]
    pub descendants: Vec<Dictionary>,
}

impl Group {
    /// Creates a new group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            history: History::created(),
            name: name.into(),
            description: None,
            owner: None,
            descendants: Vec::new(),
        }
    }
}

versioned!(Group);

impl Named for Group {
    fn name(&self) -> &str {
        &self.name
    }
}

const GROUP_FIELDS: &[FieldDeclaration] = &[
    HISTORY_FIELDS[0],
    HISTORY_FIELDS[1],
    HISTORY_FIELDS[2],
    FieldDeclaration::new("name").searchable(),
    FieldDeclaration::new("description").searchable(),
    FieldDeclaration::new(NAME_KEY_FIELD).not_sortable(),
    FieldDeclaration::new("owner"),
];

impl Indexed for Group {
    const ENTITY_TYPE: &'static str = "Group";
    const INDEX_METADATA: IndexMetadata = IndexMetadata::new(PRIMARY_KEY_FIELD)
        .fields(GROUP_FIELDS)
        .collections(&["descendants"])
        .named("name");

    fn accessor(field: &str) -> Option<FieldAccessor<Self>> {
        match field {
            "id" => Some(FieldAccessor::new(ValueKind::String, |g: &Self| {
                FieldValue::text(&g.id)
            })),
            "name" => Some(FieldAccessor::new(ValueKind::String, |g: &Self| {
                FieldValue::text(&g.name)
            })),
            NAME_KEY_FIELD => Some(FieldAccessor::new(ValueKind::String, |g: &Self| {
                FieldValue::text(g.name.to_lowercase())
            })),
            "description" => Some(FieldAccessor::new(ValueKind::String, |g: &Self| {
                FieldValue::optional_text(g.description.as_deref())
            })),
            "owner" => Some(FieldAccessor::new(ValueKind::String, |g: &Self| {
                FieldValue::optional_text(g.owner.as_deref())
            })),
            "descendants" => Some(FieldAccessor::new(ValueKind::Collection, |_: &Self| {
                FieldValue::Null
            })),
            other => history_accessor(other),
        }
    }
}

/// A dictionary: a typed table of master data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dictionary {
    /// Primary key.
    pub id: String,
    /// Version history.
    pub history: History,
    /// Owning group.
    pub group_id: String,
    /// Name, unique within the group.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Data version label.
    pub version: Option<String>,
    /// Meta-fields (columns) of this dictionary.
    #[serde(default)]
    pub descendants: Vec<MetaField>,
}

impl Dictionary {
    /// Creates a new dictionary in `group_id`.
    pub fn new(group_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            history: History::created(),
            group_id: group_id.into(),
            name: name.into(),
            description: None,
            version: None,
            descendants: Vec::new(),
        }
    }
}

versioned!(Dictionary);

impl Named for Dictionary {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Relation for Dictionary {
    const RELATION_FIELD: &'static str = "groupId";

    fn related_id(&self) -> &str {
        &self.group_id
    }
}

const DICTIONARY_FIELDS: &[FieldDeclaration] = &[
    HISTORY_FIELDS[0],
    HISTORY_FIELDS[1],
    HISTORY_FIELDS[2],
    FieldDeclaration::new("groupId").not_sortable(),
    FieldDeclaration::new("name").searchable(),
    FieldDeclaration::new("description").searchable(),
    FieldDeclaration::new(NAME_KEY_FIELD).not_sortable(),
    FieldDeclaration::new("version"),
];

impl Indexed for Dictionary {
    const ENTITY_TYPE: &'static str = "Dictionary";
    const INDEX_METADATA: IndexMetadata = IndexMetadata::new(PRIMARY_KEY_FIELD)
        .fields(DICTIONARY_FIELDS)
        .collections(&["descendants"])
        .named("name");

    fn accessor(field: &str) -> Option<FieldAccessor<Self>> {
        match field {
            "id" => Some(FieldAccessor::new(ValueKind::String, |d: &Self| {
                FieldValue::text(&d.id)
            })),
            "groupId" => Some(FieldAccessor::new(ValueKind::String, |d: &Self| {
                FieldValue::text(&d.group_id)
            })),
            "name" => Some(FieldAccessor::new(ValueKind::String, |d: &Self| {
                FieldValue::text(&d.name)
            })),
            NAME_KEY_FIELD => Some(FieldAccessor::new(ValueKind::String, |d: &Self| {
                FieldValue::text(d.name.to_lowercase())
            })),
            "description" => Some(FieldAccessor::new(ValueKind::String, |d: &Self| {
                FieldValue::optional_text(d.description.as_deref())
            })),
            "version" => Some(FieldAccessor::new(ValueKind::String, |d: &Self| {
                FieldValue::optional_text(d.version.as_deref())
            })),
            "descendants" => Some(FieldAccessor::new(ValueKind::Collection, |_: &Self| {
                FieldValue::Null
            })),
            other => history_accessor(other),
        }
    }
}

/// Data type of a meta-field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetaFieldType {
    /// Free text.
    #[default]
    String,
    /// Numeric value.
    Number,
    /// Calendar date.
    Date,
    /// Web address.
    Url,
    /// E-mail address.
    Email,
}

impl MetaFieldType {
    /// Returns the stable name stored in the index.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            MetaFieldType::String => "STRING",
            MetaFieldType::Number => "NUMBER",
            MetaFieldType::Date => "DATE",
            MetaFieldType::Url => "URL",
            MetaFieldType::Email => "EMAIL",
        }
    }
}

/// A column definition of a dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaField {
    /// Primary key.
    pub id: String,
    /// Version history.
    pub history: History,
    /// Owning dictionary.
    pub dictionary_id: String,
    /// Name, unique within the dictionary.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Data type.
    #[serde(rename = "type")]
    pub field_type: MetaFieldType,
    /// Bit flags, see [`MetaField::FLAG_UNIQUE`].
    pub flags: i32,
    /// Column position.
    pub ordinal: i32,
    /// Field values of this column.
    #[serde(default)]
    pub descendants: Vec<Field>,
}

impl MetaField {
    /// Values of the column must be unique.
    pub const FLAG_UNIQUE: i32 = 0b001;
    /// Column is the primary key of its dictionary. Implies unique.
    pub const FLAG_PRIMARY: i32 = 0b011;
    /// Column is hidden from presentation.
    pub const FLAG_HIDDEN: i32 = 0b100;

    /// Creates a new meta-field in `dictionary_id`.
    pub fn new(dictionary_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            history: History::created(),
            dictionary_id: dictionary_id.into(),
            name: name.into(),
            description: None,
            field_type: MetaFieldType::String,
            flags: 0,
            ordinal: 0,
            descendants: Vec::new(),
        }
    }

    /// Returns true if all `flag` bits are set.
    #[must_use]
    pub const fn has_flag(&self, flag: i32) -> bool {
        self.flags & flag == flag
    }

    /// Returns true if values must be unique.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.has_flag(Self::FLAG_UNIQUE)
    }

    /// Returns true if this is the primary column.
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        self.has_flag(Self::FLAG_PRIMARY)
    }

    /// Returns true if the column is hidden.
    #[must_use]
    pub const fn is_hidden(&self) -> bool {
        self.has_flag(Self::FLAG_HIDDEN)
    }
}

versioned!(MetaField);

impl Named for MetaField {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Relation for MetaField {
    const RELATION_FIELD: &'static str = "dictionaryId";

    fn related_id(&self) -> &str {
        &self.dictionary_id
    }
}

const META_FIELD_FIELDS: &[FieldDeclaration] = &[
    HISTORY_FIELDS[0],
    HISTORY_FIELDS[1],
    HISTORY_FIELDS[2],
    FieldDeclaration::new("dictionaryId"),
    FieldDeclaration::new("name").searchable(),
    FieldDeclaration::new("description").searchable(),
    FieldDeclaration::new(NAME_KEY_FIELD).not_sortable(),
    FieldDeclaration::new("type"),
    FieldDeclaration::new("flags"),
    FieldDeclaration::new("ordinal"),
];

impl Indexed for MetaField {
    const ENTITY_TYPE: &'static str = "MetaField";
    const INDEX_METADATA: IndexMetadata = IndexMetadata::new(PRIMARY_KEY_FIELD)
        .fields(META_FIELD_FIELDS)
        .collections(&["descendants"])
        .named("name");

    fn accessor(field: &str) -> Option<FieldAccessor<Self>> {
        match field {
            "id" => Some(FieldAccessor::new(ValueKind::String, |m: &Self| {
                FieldValue::text(&m.id)
            })),
            "dictionaryId" => Some(FieldAccessor::new(ValueKind::String, |m: &Self| {
                FieldValue::text(&m.dictionary_id)
            })),
            "name" => Some(FieldAccessor::new(ValueKind::String, |m: &Self| {
                FieldValue::text(&m.name)
            })),
            NAME_KEY_FIELD => Some(FieldAccessor::new(ValueKind::String, |m: &Self| {
                FieldValue::text(m.name.to_lowercase())
            })),
            "description" => Some(FieldAccessor::new(ValueKind::String, |m: &Self| {
                FieldValue::optional_text(m.description.as_deref())
            })),
            "type" => Some(FieldAccessor::new(ValueKind::Enum, |m: &Self| {
                FieldValue::Enum(m.field_type.name())
            })),
            "flags" => Some(FieldAccessor::new(ValueKind::Number, |m: &Self| {
                FieldValue::Integer(i64::from(m.flags))
            })),
            "ordinal" => Some(FieldAccessor::new(ValueKind::Number, |m: &Self| {
                FieldValue::Integer(i64::from(m.ordinal))
            })),
            "descendants" => Some(FieldAccessor::new(ValueKind::Collection, |_: &Self| {
                FieldValue::Null
            })),
            other => history_accessor(other),
        }
    }
}

/// One value of a meta-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Primary key.
    pub id: String,
    /// Version history.
    pub history: History,
    /// Owning meta-field.
    pub meta_field_id: String,
    /// Name of the owning meta-field.
    pub name: Option<String>,
    /// The value.
    pub value: Option<String>,
}

impl Field {
    /// Creates a new field value of `meta_field_id`.
    pub fn new(meta_field_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            history: History::created(),
            meta_field_id: meta_field_id.into(),
            name: None,
            value: Some(value.into()),
        }
    }
}

versioned!(Field);

impl Relation for Field {
    const RELATION_FIELD: &'static str = "metaFieldId";

    fn related_id(&self) -> &str {
        &self.meta_field_id
    }
}

const FIELD_FIELDS: &[FieldDeclaration] = &[
    HISTORY_FIELDS[0],
    HISTORY_FIELDS[1],
    HISTORY_FIELDS[2],
    FieldDeclaration::new("metaFieldId"),
    FieldDeclaration::new("name"),
    FieldDeclaration::new("value").searchable(),
];

impl Indexed for Field {
    const ENTITY_TYPE: &'static str = "Field";
    const INDEX_METADATA: IndexMetadata = IndexMetadata::new(PRIMARY_KEY_FIELD).fields(FIELD_FIELDS);

    fn accessor(field: &str) -> Option<FieldAccessor<Self>> {
        match field {
            "id" => Some(FieldAccessor::new(ValueKind::String, |f: &Self| {
                FieldValue::text(&f.id)
            })),
            "metaFieldId" => Some(FieldAccessor::new(ValueKind::String, |f: &Self| {
                FieldValue::text(&f.meta_field_id)
            })),
            "name" => Some(FieldAccessor::new(ValueKind::String, |f: &Self| {
                FieldValue::optional_text(f.name.as_deref())
            })),
            "value" => Some(FieldAccessor::new(ValueKind::String, |f: &Self| {
                FieldValue::optional_text(f.value.as_deref())
            })),
            other => history_accessor(other),
        }
    }
}

/// One row of a dictionary: its field values keyed by meta-field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Primary key.
    pub id: String,
    /// Owning dictionary.
    pub dictionary_id: String,
    /// Field values, keyed by meta-field name.
    #[serde(default)]
    pub fields: BTreeMap<String, Field>,
}

impl Record {
    /// Creates an empty record in `dictionary_id`.
    pub fn new(dictionary_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            dictionary_id: dictionary_id.into(),
            fields: BTreeMap::new(),
        }
    }
}

impl Entity for Record {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Relation for Record {
    const RELATION_FIELD: &'static str = "dictionaryId";

    fn related_id(&self) -> &str {
        &self.dictionary_id
    }
}

const RECORD_FIELDS: &[FieldDeclaration] = &[
    FieldDeclaration::new("dictionaryId")
];

impl Indexed for Record {
    const ENTITY_TYPE: &'static str = "Record";
    const INDEX_METADATA: IndexMetadata = IndexMetadata::new(PRIMARY_KEY_FIELD)
        .fields(RECORD_FIELDS)
        .collections(&["fields"]);

    fn accessor(field: &str) -> Option<FieldAccessor<Self>> {
        match field {
            "id" => Some(FieldAccessor::new(ValueKind::String, |r: &Self| {
                FieldValue::text(&r.id)
            })),
            "dictionaryId" => Some(FieldAccessor::new(ValueKind::String, |r: &Self| {
                FieldValue::text(&r.dictionary_id)
            })),
            "fields" => Some(FieldAccessor::new(ValueKind::Collection, |_: &Self| {
                FieldValue::Null
            })),
            _ => None,
        }
    }
}
