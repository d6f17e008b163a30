//! Schema catalog: collections, indexes, and the schema version.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Region the catalog is persisted in.
pub(crate) const CATALOG_REGION: &str = "catalog";

/// A secondary index over a top-level payload field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name, unique within its collection.
    pub name: String,
    /// The payload field the index covers.
    pub field: String,
}

impl IndexSpec {
    /// Creates an index spec.
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
        }
    }
}

/// Declaration of one named collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Collection name.
    pub name: String,
    /// Payload field holding the primary key.
    pub key_field: String,
    /// Secondary indexes.
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSpec {
    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexSpec> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// The versioned schema catalog.
///
/// The catalog carries a monotonically increasing schema version and the
/// set of declared collections. All changes go through the `ensure_*`
/// methods, which are **additive and idempotent**: re-declaring an
/// existing collection or index with the same shape is a no-op, while a
/// conflicting re-declaration fails rather than silently altering
/// existing data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    /// Current schema version.
    pub version: u64,
    /// Declared collections, by name.
    pub collections: BTreeMap<String, CollectionSpec>,
}

impl SchemaCatalog {
    /// Creates an empty catalog at version 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a collection spec.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.get(name)
    }

    /// Returns all collection names in sorted order.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    /// Declares a collection if it does not already exist.
    ///
    /// Returns true if the collection was created. Re-declaring with the
    /// same key field is a no-op; a different key field is a conflict.
    pub fn ensure_collection(
        &mut self,
        name: impl Into<String>,
        key_field: impl Into<String>,
    ) -> StoreResult<bool> {
        let name = name.into();
        let key_field = key_field.into();

        if !valid_schema_name(&name) {
            return Err(StoreError::invalid_name(name));
        }

        if let Some(existing) = self.collections.get(&name) {
            if existing.key_field != key_field {
                return Err(StoreError::migration_failed(format!(
                    "collection {name} already exists with key field {}, cannot redeclare with {key_field}",
                    existing.key_field
                )));
            }
            return Ok(false);
        }

        self.collections.insert(
            name.clone(),
            CollectionSpec {
                name,
                key_field,
                indexes: Vec::new(),
            },
        );
        Ok(true)
    }

    /// Declares an index on an existing collection if it does not exist.
    ///
    /// Returns true if the index was created. Re-declaring with the same
    /// field is a no-op; a different field is a conflict.
    pub fn ensure_index(&mut self, collection: &str, index: IndexSpec) -> StoreResult<bool> {
        if !valid_schema_name(&index.name) {
            return Err(StoreError::invalid_name(index.name));
        }

        let spec = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound {
                name: collection.to_string(),
            })?;

        if let Some(existing) = spec.indexes.iter().find(|i| i.name == index.name) {
            if existing.field != index.field {
                return Err(StoreError::migration_failed(format!(
                    "index {} on {collection} already covers field {}, cannot redeclare over {}",
                    index.name, existing.field, index.field
                )));
            }
            return Ok(false);
        }

        spec.indexes.push(index);
        Ok(true)
    }

    /// Encodes the catalog for persistence.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a persisted catalog.
    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| StoreError::corrupted(format!("catalog region unreadable: {e}")))
    }
}

/// Collection and index names become part of region names, so keep them
/// to ASCII alphanumerics, `_`, and `-` (no dots).
fn valid_schema_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
