//! Named paths.
//!
//! A named path is a human readable, hierarchical key into the store used
//! as an alternate lookup route next to primary keys:
//!
//! | Path | Display form |
//! |------|--------------|
//! | [`DictionaryNamedPath`] | `group.dictionary` |
//! | [`MetaFieldNamedPath`] | `group.dictionary[field]` |
//! | [`FieldNamedPath`] | `group.dictionary[field]='value'` |
//!
//! Names compare case-insensitively; field values compare exactly.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

fn names_equal(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn require_name<'a>(path: &str, part: &'a str, what: &str) -> ModelResult<&'a str> {
    let part = part.trim();
    if part.is_empty() {
        Err(ModelError::invalid_path(path, format!("missing {what} name")))
    } else {
        Ok(part)
    }
}

/// Path to a dictionary: `group.dictionary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryNamedPath {
    /// Group name.
    pub group_name: String,
    /// Dictionary name.
    pub dictionary_name: String,
}

impl DictionaryNamedPath {
    /// Creates a path.
    pub fn new(group_name: impl Into<String>, dictionary_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            dictionary_name: dictionary_name.into(),
        }
    }

    /// Extends the path to a meta-field.
    pub fn meta_field(&self, field_name: impl Into<String>) -> MetaFieldNamedPath {
        MetaFieldNamedPath {
            dictionary: self.clone(),
            field_name: field_name.into(),
        }
    }
}

impl fmt::Display for DictionaryNamedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group_name, self.dictionary_name)
    }
}

impl FromStr for DictionaryNamedPath {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        let (group, dictionary) = s
            .split_once('.')
            .ok_or_else(|| ModelError::invalid_path(s, "expected 'group.dictionary'"))?;
        Ok(Self::new(
            require_name(s, group, "group")?,
            require_name(s, dictionary, "dictionary")?,
        ))
    }
}

impl PartialEq for DictionaryNamedPath {
    fn eq(&self, other: &Self) -> bool {
        names_equal(&self.group_name, &other.group_name)
            && names_equal(&self.dictionary_name, &other.dictionary_name)
    }
}

impl Eq for DictionaryNamedPath {}

impl Hash for DictionaryNamedPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group_name.to_lowercase().hash(state);
        self.dictionary_name.to_lowercase().hash(state);
    }
}

/// Path to a meta-field: `group.dictionary[field]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaFieldNamedPath {
    /// Path of the owning dictionary.
    pub dictionary: DictionaryNamedPath,
    /// Meta-field name.
    pub field_name: String,
}

impl MetaFieldNamedPath {
    /// Creates a path.
    pub fn new(
        group_name: impl Into<String>,
        dictionary_name: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        DictionaryNamedPath::new(group_name, dictionary_name).meta_field(field_name)
    }

    /// Extends the path to a field value.
    pub fn value(&self, field_value: impl Into<String>) -> FieldNamedPath {
        FieldNamedPath {
            meta_field: self.clone(),
            field_value: field_value.into(),
        }
    }
}

impl fmt::Display for MetaFieldNamedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.dictionary, self.field_name)
    }
}

impl FromStr for MetaFieldNamedPath {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        let body = s
            .strip_suffix(']')
            .ok_or_else(|| ModelError::invalid_path(s, "expected 'group.dictionary[field]'"))?;
        let (dictionary, field) = body
            .rsplit_once('[')
            .ok_or_else(|| ModelError::invalid_path(s, "missing '['"))?;
        Ok(MetaFieldNamedPath {
            dictionary: dictionary.parse()?,
            field_name: require_name(s, field, "field")?.to_string(),
        })
    }
}

impl PartialEq for MetaFieldNamedPath {
    fn eq(&self, other: &Self) -> bool {
        self.dictionary == other.dictionary && names_equal(&self.field_name, &other.field_name)
    }
}

impl Eq for MetaFieldNamedPath {}

impl Hash for MetaFieldNamedPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dictionary.hash(state);
        self.field_name.to_lowercase().hash(state);
    }
}

/// Path to a field value: `group.dictionary[field]='value'`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldNamedPath {
    /// Path of the owning meta-field.
    pub meta_field: MetaFieldNamedPath,
    /// The field value.
    pub field_value: String,
}

impl fmt::Display for FieldNamedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}='{}'", self.meta_field, self.field_value)
    }
}

impl FromStr for FieldNamedPath {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        let (meta_field, value) = s
            .split_once("]='")
            .ok_or_else(|| ModelError::invalid_path(s, "expected \"[field]='value'\""))?;
        let value = value
            .strip_suffix('\'')
            .ok_or_else(|| ModelError::invalid_path(s, "unterminated value"))?;
        Ok(FieldNamedPath {
            meta_field: format!("{meta_field}]").parse()?,
            field_value: value.to_string(),
        })
    }
}
