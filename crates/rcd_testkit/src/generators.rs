//! Property-based test generators using proptest.
//!
//! Provides strategies for generating domain documents whose indexed
//! values round-trip through the index.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use rcd_model::{ChangeType, Dictionary, Field, History, MetaField, MetaFieldType};

/// Strategy for generating change types.
pub fn change_type_strategy() -> impl Strategy<Value = ChangeType> {
    prop::sample::select(ChangeType::ALL.to_vec())
}

/// Strategy for generating change dates between 2000 and 2040, at
/// millisecond precision.
pub fn change_date_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800_000i64..2_208_988_800_000i64).prop_map(|millis| {
        Utc.timestamp_millis_opt(millis)
            .single()
            .expect("Timestamp in range")
    })
}

/// Strategy for generating history records.
pub fn history_strategy() -> impl Strategy<Value = History> {
    (
        "[a-f0-9]{8}",
        change_type_strategy(),
        change_date_strategy(),
    )
        .prop_map(|(history_id, change_type, change_date)| {
            History::new(history_id, change_type, change_date)
        })
}

/// Strategy for generating names made of one to three words.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][a-z0-9]{0,11}( [a-z0-9]{1,8}){0,2}").expect("Invalid regex")
}

/// Strategy for generating optional free text.
pub fn optional_text_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(
        prop::string::string_regex("[A-Za-z0-9 ,.]{1,40}").expect("Invalid regex"),
    )
}

/// Strategy for generating meta-field types.
pub fn meta_field_type_strategy() -> impl Strategy<Value = MetaFieldType> {
    prop::sample::select(vec![
        MetaFieldType::String,
        MetaFieldType::Number,
        MetaFieldType::Date,
        MetaFieldType::Url,
        MetaFieldType::Email,
    ])
}

/// Strategy for generating meta-fields of `dictionary_id`.
pub fn meta_field_strategy(dictionary_id: String) -> impl Strategy<Value = MetaField> {
    (
        history_strategy(),
        name_strategy(),
        optional_text_strategy(),
        meta_field_type_strategy(),
        0i32..8,
        0i32..100,
    )
        .prop_map(move |(history, name, description, field_type, flags, ordinal)| {
            let mut meta_field = MetaField::new(dictionary_id.clone(), name);
            meta_field.history = history;
            meta_field.description = description;
            meta_field.field_type = field_type;
            meta_field.flags = flags;
            meta_field.ordinal = ordinal;
            meta_field
        })
}

/// Strategy for generating dictionaries, meta-fields attached.
pub fn dictionary_strategy() -> impl Strategy<Value = Dictionary> {
    (
        "group-[0-9]{1,3}",
        history_strategy(),
        name_strategy(),
        optional_text_strategy(),
        prop::option::of("[0-9]{1,2}\\.[0-9]{1,2}"),
    )
        .prop_flat_map(|(group_id, history, name, description, version)| {
            let mut dictionary = Dictionary::new(group_id, name);
            dictionary.history = history;
            dictionary.description = description;
            dictionary.version = version;
            let children = prop::collection::vec(meta_field_strategy(dictionary.id.clone()), 0..4);
            (Just(dictionary), children)
        })
        .prop_map(|(mut dictionary, children)| {
            dictionary.descendants = children;
            dictionary
        })
}

/// Strategy for generating field values of `meta_field_id`.
pub fn field_strategy(meta_field_id: String) -> impl Strategy<Value = Field> {
    (history_strategy(), "[a-z]{1,6}").prop_map(move |(history, value)| {
        let mut field = Field::new(meta_field_id.clone(), value);
        field.history = history;
        field
    })
}
