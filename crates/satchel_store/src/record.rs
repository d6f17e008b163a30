//! Records: the unit of storage in a collection.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An application entity stored in a named collection.
///
/// The id is the value of the collection's primary-key field inside the
/// payload; it is duplicated here so records remain addressable after
/// export without consulting the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Primary key.
    pub id: String,
    /// The full payload, including the key field.
    pub payload: Value,
}

impl Record {
    /// Creates a record from known parts.
    #[must_use]
    pub fn new(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    /// Builds a record by extracting the primary key from a payload.
    ///
    /// The payload must be a JSON object whose `key_field` is a
    /// non-empty string.
    pub fn from_payload(collection: &str, key_field: &str, payload: Value) -> StoreResult<Self> {
        let id = payload
            .get(key_field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .ok_or_else(|| StoreError::MissingKeyField {
                collection: collection.to_string(),
                key_field: key_field.to_string(),
            })?;

        Ok(Self { id, payload })
    }

    /// Reads a top-level payload field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_payload_extracts_key() {
        let record =
            Record::from_payload("tasks", "id", json!({"id": "t1", "title": "walk"})).unwrap();
        assert_eq!(record.id, "t1");
        assert_eq!(record.field("title"), Some(&json!("walk")));
    }

    #[test]
    fn missing_key_rejected() {
        let err = Record::from_payload("tasks", "id", json!({"title": "walk"})).unwrap_err();
        assert!(matches!(err, StoreError::MissingKeyField { .. }));
    }

    #[test]
    fn non_string_key_rejected() {
        let err = Record::from_payload("tasks", "id", json!({"id": 42})).unwrap_err();
        assert!(matches!(err, StoreError::MissingKeyField { .. }));
    }

    #[test]
    fn empty_key_rejected() {
        let err = Record::from_payload("tasks", "id", json!({"id": ""})).unwrap_err();
        assert!(matches!(err, StoreError::MissingKeyField { .. }));
    }

    #[test]
    fn serde_roundtrip() {
        let record = Record::new("t1", json!({"id": "t1", "n": 3}));
        let bytes = serde_json::to_vec(&record).unwrap();
        let decoded: Record = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, record);
    }
}
