//! Physical field layout of the search engine.
//!
//! | Logical kind | Physical field |
//! |--------------|----------------|
//! | string, number, enum, boolean | raw-tokenized text |
//! | date | `i64` epoch milliseconds |
//! | payload | stored bytes |
//! | free text | tokenized text, not stored |
//!
//! Filterable fields are indexed. Sortable fields are stored and kept in
//! columnar storage, so sorting never reads stored documents. A field
//! that is neither only feeds the free-text field.

use super::{Capabilities, IndexedFieldDescriptor};
use crate::error::{IndexError, IndexResult};
use rcd_model::{ValueKind, DEFAULT_SEARCH_FIELD, PAYLOAD_FIELD};
use std::collections::HashMap;
use tantivy::schema::{
    BytesOptions, Field, IndexRecordOption, NumericOptions, Schema, TextFieldIndexing,
    TextOptions, TEXT,
};

/// Physical schema and field handles of one entity type.
#[derive(Debug, Clone)]
pub struct NativeSchema {
    schema: Schema,
    fields: HashMap<String, (Field, ValueKind)>,
    primary_key: Field,
    payload: Field,
    default_search: Field,
}

impl NativeSchema {
    pub(crate) fn build<E>(
        entity_type: &str,
        primary_key: &IndexedFieldDescriptor<E>,
        descriptors: &[IndexedFieldDescriptor<E>],
    ) -> IndexResult<Self> {
        // Merge descriptors sharing a physical name (aliases).
        let mut layout: Vec<(&str, ValueKind, Capabilities)> = Vec::new();
        for descriptor in std::iter::once(primary_key).chain(descriptors) {
            match layout
                .iter_mut()
                .find(|(name, _, _)| *name == descriptor.name)
            {
                Some((_, kind, caps)) => {
                    if *kind != descriptor.kind {
                        return Err(IndexError::configuration(
                            entity_type,
                            format!(
                                "field '{}' is declared as both {:?} and {:?}",
                                descriptor.name, kind, descriptor.kind
                            ),
                        ));
                    }
                    *caps = caps.union(descriptor.capabilities);
                }
                None => layout.push((&descriptor.name, descriptor.kind, descriptor.capabilities)),
            }
        }

        let mut builder = Schema::builder();
        let mut fields = HashMap::new();
        for (name, kind, caps) in layout {
            if !caps.filterable && !caps.sortable {
                continue;
            }
            let field = match kind {
                ValueKind::Date => builder.add_i64_field(name, numeric_options(caps)),
                _ => builder.add_text_field(name, text_options(caps)),
            };
            fields.insert(name.to_string(), (field, kind));
        }
        let payload = builder.add_bytes_field(PAYLOAD_FIELD, BytesOptions::default().set_stored());
        let default_search = builder.add_text_field(DEFAULT_SEARCH_FIELD, TEXT);

        let primary_key = fields
            .get(&primary_key.name)
            .map(|(field, _)| *field)
            .ok_or_else(|| IndexError::configuration(entity_type, "primary key is not indexed"))?;

        Ok(Self {
            schema: builder.build(),
            fields,
            primary_key,
            payload,
            default_search,
        })
    }

    /// Returns the engine schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the physical field of a logical name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Field> {
        self.fields.get(name).map(|(field, _)| *field)
    }

    /// Returns the physical field and value kind of a logical name.
    #[must_use]
    pub fn field_with_kind(&self, name: &str) -> Option<(Field, ValueKind)> {
        self.fields.get(name).copied()
    }

    /// Returns the primary key field.
    #[must_use]
    pub fn primary_key(&self) -> Field {
        self.primary_key
    }

    /// Returns the payload field.
    #[must_use]
    pub fn payload(&self) -> Field {
        self.payload
    }

    /// Returns the free-text field.
    #[must_use]
    pub fn default_search(&self) -> Field {
        self.default_search
    }
}

fn text_options(caps: Capabilities) -> TextOptions {
    let mut options = TextOptions::default();
    if caps.filterable {
        options = options.set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer("raw")
                .set_index_option(IndexRecordOption::Basic),
        );
    }
    if caps.sortable {
        options = options.set_stored().set_fast(None);
    }
    options
}

fn numeric_options(caps: Capabilities) -> NumericOptions {
    let mut options = NumericOptions::default();
    if caps.filterable {
        options = options.set_indexed();
    }
    if caps.sortable {
        options = options.set_stored().set_fast();
    }
    options
}
