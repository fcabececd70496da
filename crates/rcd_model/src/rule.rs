//! Recoding rules.
//!
//! A rule set maps the values of one dictionary onto another; each rule maps
//! one source field value onto one target field value. Both field ids are
//! also indexed under the shared alias `fieldId`, so a single filter finds
//! every rule that touches a field from either side.

use crate::change::History;
use crate::document::{history_accessor, versioned, HISTORY_FIELDS};
use crate::entity::{new_id, Entity, Named, Relation, Versioned};
use crate::indexed::{
    FieldAccessor, FieldDeclaration, FieldValue, IndexMetadata, Indexed, ValueKind,
    PRIMARY_KEY_FIELD,
};
use serde::{Deserialize, Serialize};

/// A named set of recoding rules between two dictionaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecodeRuleSet {
    /// Primary key.
    pub id: String,
    /// Version history.
    pub history: History,
    /// Rule set name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Source dictionary.
    pub from_dictionary_id: String,
    /// Target dictionary.
    pub to_dictionary_id: String,
    /// Default target field for values without a rule.
    pub default_field_id: Option<String>,
    /// Rules of this set.
    #[serde(default)]
    pub recode_rules: Vec<RecodeRule>,
}

impl RecodeRuleSet {
    /// Creates a rule set between two dictionaries.
    pub fn new(
        name: impl Into<String>,
        from_dictionary_id: impl Into<String>,
        to_dictionary_id: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            history: History::created(),
            name: name.into(),
            description: None,
            from_dictionary_id: from_dictionary_id.into(),
            to_dictionary_id: to_dictionary_id.into(),
            default_field_id: None,
            recode_rules: Vec::new(),
        }
    }
}

versioned!(RecodeRuleSet);

impl Named for RecodeRuleSet {
    fn name(&self) -> &str {
        &self.name
    }
}

const RULE_SET_FIELDS: &[FieldDeclaration] = &[
    HISTORY_FIELDS[0],
    HISTORY_FIELDS[1],
    HISTORY_FIELDS[2],
    FieldDeclaration::new("name").searchable(),
    FieldDeclaration::new("description").searchable(),
    FieldDeclaration::new("fromDictionaryId").aliases(&["dictionaryId"]),
    FieldDeclaration::new("toDictionaryId").aliases(&["dictionaryId"]),
    FieldDeclaration::new("defaultFieldId"),
];

impl Indexed for RecodeRuleSet {
    const ENTITY_TYPE: &'static str = "RecodeRuleSet";
    const INDEX_METADATA: IndexMetadata = IndexMetadata::new(PRIMARY_KEY_FIELD)
        .fields(RULE_SET_FIELDS)
        .collections(&["recodeRules"])
        .named("name");

    fn accessor(field: &str) -> Option<FieldAccessor<Self>> {
        match field {
            "id" => Some(FieldAccessor::new(ValueKind::String, |s: &Self| {
                FieldValue::text(&s.id)
            })),
            "name" => Some(FieldAccessor::new(ValueKind::String, |s: &Self| {
                FieldValue::text(&s.name)
            })),
            "description" => Some(FieldAccessor::new(ValueKind::String, |s: &Self| {
                FieldValue::optional_text(s.description.as_deref())
            })),
            "fromDictionaryId" => Some(FieldAccessor::new(ValueKind::String, |s: &Self| {
                FieldValue::text(&s.from_dictionary_id)
            })),
            "toDictionaryId" => Some(FieldAccessor::new(ValueKind::String, |s: &Self| {
                FieldValue::text(&s.to_dictionary_id)
            })),
            "defaultFieldId" => Some(FieldAccessor::new(ValueKind::String, |s: &Self| {
                FieldValue::optional_text(s.default_field_id.as_deref())
            })),
            "recodeRules" => Some(FieldAccessor::new(ValueKind::Collection, |_: &Self| {
                FieldValue::Null
            })),
            other => history_accessor(other),
        }
    }
}

/// Maps one source field value onto one target field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecodeRule {
    /// Primary key.
    pub id: String,
    /// Version history.
    pub history: History,
    /// Owning rule set.
    pub recode_rule_set_id: String,
    /// Source field.
    pub from_field_id: String,
    /// Target field.
    pub to_field_id: String,
}

impl RecodeRule {
    /// Creates a rule in `recode_rule_set_id`.
    pub fn new(
        recode_rule_set_id: impl Into<String>,
        from_field_id: impl Into<String>,
        to_field_id: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            history: History::created(),
            recode_rule_set_id: recode_rule_set_id.into(),
            from_field_id: from_field_id.into(),
            to_field_id: to_field_id.into(),
        }
    }
}

versioned!(RecodeRule);

impl Relation for RecodeRule {
    const RELATION_FIELD: &'static str = "recodeRuleSetId";

    fn related_id(&self) -> &str {
        &self.recode_rule_set_id
    }
}

const RULE_FIELDS: &[FieldDeclaration] = &[
    HISTORY_FIELDS[0],
    HISTORY_FIELDS[1],
    HISTORY_FIELDS[2],
    FieldDeclaration::new("recodeRuleSetId"),
    FieldDeclaration::new("fromFieldId").aliases(&["fieldId"]),
    FieldDeclaration::new("toFieldId").aliases(&["fieldId"]),
];

impl Indexed for RecodeRule {
    const ENTITY_TYPE: &'static str = "RecodeRule";
    const INDEX_METADATA: IndexMetadata = IndexMetadata::new(PRIMARY_KEY_FIELD).fields(RULE_FIELDS);

    fn accessor(field: &str) -> Option<FieldAccessor<Self>> {
        match field {
            "id" => Some(FieldAccessor::new(ValueKind::String, |r: &Self| {
                FieldValue::text(&r.id)
            })),
            "recodeRuleSetId" => Some(FieldAccessor::new(ValueKind::String, |r: &Self| {
                FieldValue::text(&r.recode_rule_set_id)
            })),
            "fromFieldId" => Some(FieldAccessor::new(ValueKind::String, |r: &Self| {
                FieldValue::text(&r.from_field_id)
            })),
            "toFieldId" => Some(FieldAccessor::new(ValueKind::String, |r: &Self| {
                FieldValue::text(&r.to_field_id)
            })),
            other => history_accessor(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_aliases_share_field_id() {
        let from = RULE_FIELDS.iter().find(|d| d.name == "fromFieldId").unwrap();
        let to = RULE_FIELDS.iter().find(|d| d.name == "toFieldId").unwrap();
        assert_eq!(from.aliases, to.aliases);
        assert_eq!(from.aliases, &["fieldId"]);
    }

    #[test]
    fn rule_relation() {
        let rule = RecodeRule::new("set", "a", "b");
        assert_eq!(rule.related_id(), "set");
        assert_eq!(RecodeRule::RELATION_FIELD, "recodeRuleSetId");
        assert!(rule.is_active());
    }
}
