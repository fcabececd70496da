//! Stored entity snapshot.
//!
//! The payload is the CBOR encoding of the entity with its collection
//! fields removed. Collections hold transitively loaded relations; keeping
//! them would store whole sub-trees in every parent document.

use crate::error::{IndexError, IndexResult};
use ciborium::value::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes `entity` without the fields named in `collections`.
///
/// The entity itself is left untouched.
///
/// # Errors
///
/// Returns `Payload` if the entity cannot be serialized.
pub fn encode<E: Serialize>(entity: &E, collections: &[&str]) -> IndexResult<Vec<u8>> {
    let value = Value::serialized(entity).map_err(|e| IndexError::payload(e.to_string()))?;
    let value = strip(value, collections);

    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&value, &mut bytes)
        .map_err(|e| IndexError::payload(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a payload.
///
/// # Errors
///
/// Returns `Payload` if the bytes are not a valid encoding of `E`.
pub fn decode<E: DeserializeOwned>(bytes: &[u8]) -> IndexResult<E> {
    ciborium::de::from_reader(bytes).map_err(|e| IndexError::payload(e.to_string()))
}

fn strip(value: Value, collections: &[&str]) -> Value {
    if collections.is_empty() {
        return value;
    }
    match value {
        Value::Map(entries) => Value::Map(
            entries
                .into_iter()
                .filter(|(key, _)| {
                    !matches!(key, Value::Text(name) if collections.contains(&name.as_str()))
                })
                .collect(),
        ),
        other => other,
    }
}
