//! Document binder.
//!
//! Converts entities to index documents and back, driven by the
//! [`SchemaDescriptor`] of the entity type:
//!
//! * every filterable or sortable field is written to its physical field,
//!   encoded by value kind,
//! * searchable fields contribute their words to the free-text field,
//! * the payload holds a snapshot of the entity without collections.
//!
//! Decoding reads the payload only. Collection fields come back empty and
//! are re-attached by the caller from relations.

pub mod payload;
pub mod tokenizer;

use crate::error::{IndexError, IndexResult};
use crate::schema::SchemaDescriptor;
use rcd_model::{FieldValue, Indexed, ValueKind};
use std::sync::Arc;
use tantivy::schema::Value;
use tantivy::{TantivyDocument, Term};

/// Indexed value of an absent date.
///
/// Smaller than every real instant, so open-start ranges can exclude it.
pub const NULL_DATE: i64 = i64::MIN;

/// A field value in its indexed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedValue {
    /// Exact-match token.
    Text(String),
    /// Epoch milliseconds.
    Date(i64),
}

/// Canonical text of a number.
///
/// Whole numbers are written without a fractional part, so `42` and `42.0`
/// index to the same token.
#[must_use]
pub fn canonical_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = value as i64;
        whole.to_string()
    } else {
        value.to_string()
    }
}

/// Encodes one field value, checking it against the declared kind.
///
/// Returns `None` for absent values. Blank strings count as absent.
///
/// # Errors
///
/// Returns `Configuration` if the value does not match `kind`.
pub fn encode_value(
    entity_type: &str,
    field: &str,
    kind: ValueKind,
    value: &FieldValue,
) -> IndexResult<Option<EncodedValue>> {
    let encoded = match (kind, value) {
        (_, FieldValue::Null) => None,
        (ValueKind::String | ValueKind::Enum, FieldValue::Text(text)) => {
            if text.trim().is_empty() {
                None
            } else {
                Some(EncodedValue::Text(text.clone()))
            }
        }
        (ValueKind::Number, FieldValue::Integer(number)) => {
            Some(EncodedValue::Text(number.to_string()))
        }
        (ValueKind::Number, FieldValue::Float(number)) => {
            Some(EncodedValue::Text(canonical_number(*number)))
        }
        (ValueKind::Date, FieldValue::Date(date)) => {
            Some(EncodedValue::Date(date.timestamp_millis()))
        }
        (ValueKind::Enum, FieldValue::Enum(name)) => Some(EncodedValue::Text((*name).to_string())),
        (ValueKind::Boolean, FieldValue::Bool(flag)) => Some(EncodedValue::Text(flag.to_string())),
        (kind, value) => {
            return Err(IndexError::configuration(
                entity_type,
                format!("field '{field}' declared as {kind:?} produced {value:?}"),
            ))
        }
    };
    Ok(encoded)
}

/// Converts entities of type `E` to and from index documents.
pub struct DocumentBinder<E> {
    schema: Arc<SchemaDescriptor<E>>,
}

impl<E: Indexed> DocumentBinder<E> {
    /// Creates a binder over `schema`.
    #[must_use]
    pub fn new(schema: Arc<SchemaDescriptor<E>>) -> Self {
        Self { schema }
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaDescriptor<E>> {
        &self.schema
    }

    /// Encodes `entity` into an index document.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if an accessor produces a value of the wrong
    /// kind, or `Payload` if the snapshot cannot be serialized.
    pub fn encode(&self, entity: &E) -> IndexResult<TantivyDocument> {
        let native = self.schema.native();
        let entity_type = self.schema.entity_type();
        let mut document = TantivyDocument::default();

        let descriptors = std::iter::once(self.schema.primary_key()).chain(self.schema.fields());
        for descriptor in descriptors {
            let Some((field, kind)) = native.field_with_kind(&descriptor.name) else {
                continue;
            };
            let value = descriptor.read(entity);
            match encode_value(entity_type, &descriptor.name, kind, &value)? {
                Some(EncodedValue::Text(text)) => document.add_text(field, text),
                Some(EncodedValue::Date(millis)) => document.add_i64(field, millis),
                None if kind == ValueKind::Date => document.add_i64(field, NULL_DATE),
                None => {}
            }
        }

        let texts: Vec<String> = self
            .schema
            .searchable()
            .filter_map(|descriptor| search_text(&descriptor.read(entity)))
            .collect();
        let search = tokenizer::join_search_text(texts.iter().map(String::as_str));
        if !search.is_empty() {
            document.add_text(native.default_search(), search);
        }

        let bytes = payload::encode(entity, self.schema.collections())?;
        document.add_bytes(native.payload(), bytes.as_slice());
        Ok(document)
    }

    /// Decodes an entity from its payload.
    ///
    /// # Errors
    ///
    /// Returns `Payload` if the document has no payload or it is invalid.
    pub fn decode(&self, document: &TantivyDocument) -> IndexResult<E> {
        let bytes = document
            .get_first(self.schema.native().payload())
            .and_then(|value| value.as_bytes())
            .ok_or_else(|| {
                IndexError::payload(format!(
                    "{} document has no payload",
                    self.schema.entity_type()
                ))
            })?;
        payload::decode(bytes)
    }

    /// Returns the primary key stored in `document`.
    #[must_use]
    pub fn key_of(&self, document: &TantivyDocument) -> Option<String> {
        document
            .get_first(self.schema.native().primary_key())
            .and_then(|value| value.as_str())
            .map(str::to_string)
    }

    /// Returns the term addressing the document with primary key `id`.
    #[must_use]
    pub fn key_term(&self, id: &str) -> Term {
        Term::from_field_text(self.schema.native().primary_key(), id)
    }
}

impl<E> std::fmt::Debug for DocumentBinder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBinder")
            .field("entity_type", &self.schema.entity_type())
            .finish_non_exhaustive()
    }
}

fn search_text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Text(text) if !text.trim().is_empty() => Some(text.clone()),
        FieldValue::Enum(name) => Some((*name).to_string()),
        FieldValue::Integer(number) => Some(number.to_string()),
        FieldValue::Float(number) => Some(canonical_number(*number)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use chrono::{TimeZone, Utc};
    use rcd_model::{
        ChangeType, Dictionary, Field, History, MetaField, MetaFieldType, Record,
        DEFAULT_SEARCH_FIELD,
    };

    fn binder<E: Indexed>() -> DocumentBinder<E> {
        DocumentBinder::new(SchemaRegistry::new().describe::<E>().unwrap())
    }

    fn texts(document: &TantivyDocument, field: tantivy::schema::Field) -> Vec<String> {
        document
            .get_all(field)
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect()
    }

    // === Value encoding ===

    #[test]
    fn canonical_numbers() {
        assert_eq!(canonical_number(42.0), "42");
        assert_eq!(canonical_number(-3.0), "-3");
        assert_eq!(canonical_number(2.5), "2.5");
        assert_eq!(canonical_number(f64::INFINITY), "inf");
    }

    #[test]
    fn blank_text_is_absent() {
        let encoded =
            encode_value("T", "name", ValueKind::String, &FieldValue::text("  ")).unwrap();
        assert_eq!(encoded, None);
    }

    #[test]
    fn kind_mismatch_is_a_configuration_error() {
        let err = encode_value("T", "ordinal", ValueKind::Number, &FieldValue::text("x"))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    // === Documents ===

    #[test]
    fn encode_writes_physical_fields() {
        let binder = binder::<Dictionary>();
        let native = binder.schema().native();
        let mut dictionary = Dictionary::new("g-1", "countries");
        dictionary.description = Some("World countries".into());

        let document = binder.encode(&dictionary).unwrap();

        assert_eq!(
            texts(&document, native.field("name").unwrap()),
            vec!["countries"]
        );
        assert_eq!(
            texts(&document, native.field("groupId").unwrap()),
            vec!["g-1"]
        );
        assert_eq!(
            texts(&document, native.field("changeType").unwrap()),
            vec!["CREATE"]
        );
        assert_eq!(binder.key_of(&document).as_deref(), Some(dictionary.id.as_str()));
        assert_eq!(
            texts(&document, native.default_search()),
            vec!["countries World"]
        );
        assert_eq!(
            native.schema().get_field_name(native.default_search()),
            DEFAULT_SEARCH_FIELD
        );
    }

    #[test]
    fn absent_date_uses_sentinel() {
        let binder = binder::<Dictionary>();
        let native = binder.schema().native();
        let document = binder.encode(&Dictionary::new("g-1", "x")).unwrap();

        let version = native.field("version").unwrap();
        assert!(document.get_first(version).is_none());

        let change_date = native.field("changeDate").unwrap();
        assert!(document
            .get_first(change_date)
            .and_then(|value| value.as_i64())
            .is_some_and(|millis| millis != NULL_DATE));
    }

    #[test]
    fn aliases_share_one_physical_field() {
        let binder = binder::<rcd_model::RecodeRule>();
        let native = binder.schema().native();
        let rule = rcd_model::RecodeRule::new("set-1", "from-1", "to-1");

        let document = binder.encode(&rule).unwrap();
        let mut values = texts(&document, native.field("fieldId").unwrap());
        values.sort();
        assert_eq!(values, vec!["from-1", "to-1"]);
    }

    #[test]
    fn round_trip_keeps_scalars() {
        let binder = binder::<MetaField>();
        let mut meta = MetaField::new("d-1", "code");
        meta.description = Some("ISO code".into());
        meta.field_type = MetaFieldType::Number;
        meta.flags = MetaField::FLAG_UNIQUE;
        meta.ordinal = 3;
        meta.history = History::new(
            "h-1",
            ChangeType::Update,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        );
        meta.descendants.push(Field::new(&meta.id, "RU"));

        let decoded = binder.decode(&binder.encode(&meta).unwrap()).unwrap();

        assert!(decoded.descendants.is_empty());
        let mut expected = meta.clone();
        expected.descendants.clear();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn record_collections_are_stripped() {
        let binder = binder::<Record>();
        let mut record = Record::new("d-1");
        record
            .fields
            .insert("code".into(), Field::new("m-1", "RU"));

        let decoded = binder.decode(&binder.encode(&record).unwrap()).unwrap();
        assert_eq!(decoded.id, record.id);
        assert_eq!(decoded.dictionary_id, "d-1");
        assert!(decoded.fields.is_empty());
    }

    #[test]
    fn decode_without_payload_fails() {
        let binder = binder::<Field>();
        let err = binder.decode(&TantivyDocument::default()).unwrap_err();
        assert!(matches!(err, IndexError::Payload(_)));
    }
}
