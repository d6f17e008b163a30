//! Schema migrations.
//!
//! Migrations are additive deltas over the [`SchemaCatalog`]: new
//! collections and new indexes. Each migration targets one schema
//! version; the runner applies pending versions in order when the store
//! opens.
//!
//! Every migration must be safe to re-run. The catalog's `ensure_*`
//! guards make the built-in migrations naturally idempotent; custom
//! migrations must preserve that property.

use crate::error::{StoreError, StoreResult};
use crate::schema::{IndexSpec, SchemaCatalog};
use std::collections::BTreeMap;
use tracing::info;

/// A single schema migration step.
pub trait Migration: Send + Sync {
    /// The schema version this migration produces.
    ///
    /// Versions must be unique and sequential starting from 1.
    fn version(&self) -> u64;

    /// Human-readable migration name.
    fn name(&self) -> &str;

    /// Applies the delta to the catalog.
    fn apply(&self, catalog: &mut SchemaCatalog) -> StoreResult<()>;
}

/// Registers and runs migrations in version order.
pub struct MigrationRunner {
    migrations: BTreeMap<u64, Box<dyn Migration>>,
}

impl MigrationRunner {
    /// Creates an empty runner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            migrations: BTreeMap::new(),
        }
    }

    /// Registers a migration.
    ///
    /// Fails if a migration with the same version is already registered.
    pub fn register(&mut self, migration: Box<dyn Migration>) -> StoreResult<()> {
        let version = migration.version();
        if self.migrations.contains_key(&version) {
            return Err(StoreError::migration_failed(format!(
                "migration version {version} already registered"
            )));
        }
        self.migrations.insert(version, migration);
        Ok(())
    }

    /// Validates that registered versions are sequential with no gaps.
    pub fn validate(&self) -> StoreResult<()> {
        for (i, version) in self.migrations.keys().enumerate() {
            let expected = (i + 1) as u64;
            if *version != expected {
                return Err(StoreError::migration_failed(format!(
                    "migration version gap: expected {expected}, got {version}"
                )));
            }
        }
        Ok(())
    }

    /// Returns the (version, name) pairs newer than `current_version`.
    #[must_use]
    pub fn pending(&self, current_version: u64) -> Vec<(u64, &str)> {
        self.migrations
            .range(current_version + 1..)
            .map(|(v, m)| (*v, m.name()))
            .collect()
    }

    /// The highest registered version, or 0 with no migrations.
    #[must_use]
    pub fn latest_version(&self) -> u64 {
        self.migrations.keys().next_back().copied().unwrap_or(0)
    }

    /// Applies all migrations newer than the catalog's version, in order.
    ///
    /// Returns the number of migrations applied. Stops at the first
    /// failure, leaving the catalog at the last successfully applied
    /// version.
    pub fn run_pending(&self, catalog: &mut SchemaCatalog) -> StoreResult<usize> {
        let mut applied = 0usize;

        for (version, migration) in self.migrations.range(catalog.version + 1..) {
            migration.apply(catalog).map_err(|e| {
                StoreError::migration_failed(format!(
                    "migration {version} ({}) failed: {e}",
                    migration.name()
                ))
            })?;
            catalog.version = *version;
            applied += 1;
            info!(version, name = migration.name(), "applied schema migration");
        }

        Ok(applied)
    }
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Ready-made migrations for the common additive deltas.
pub mod migrations {
    use super::*;

    struct CreateCollection {
        version: u64,
        name: String,
        collection: String,
        key_field: String,
    }

    impl Migration for CreateCollection {
        fn version(&self) -> u64 {
            self.version
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn apply(&self, catalog: &mut SchemaCatalog) -> StoreResult<()> {
            catalog.ensure_collection(self.collection.clone(), self.key_field.clone())?;
            Ok(())
        }
    }

    struct AddIndex {
        version: u64,
        name: String,
        collection: String,
        index: IndexSpec,
    }

    impl Migration for AddIndex {
        fn version(&self) -> u64 {
            self.version
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn apply(&self, catalog: &mut SchemaCatalog) -> StoreResult<()> {
            catalog.ensure_index(&self.collection, self.index.clone())?;
            Ok(())
        }
    }

    /// A migration that declares a collection.
    pub fn create_collection(
        version: u64,
        collection: impl Into<String>,
        key_field: impl Into<String>,
    ) -> Box<dyn Migration> {
        let collection = collection.into();
        Box::new(CreateCollection {
            version,
            name: format!("create_collection_{collection}"),
            collection,
            key_field: key_field.into(),
        })
    }

    /// A migration that adds a secondary index to a collection.
    pub fn add_index(
        version: u64,
        collection: impl Into<String>,
        index_name: impl Into<String>,
        field: impl Into<String>,
    ) -> Box<dyn Migration> {
        let collection = collection.into();
        let index = IndexSpec::new(index_name, field);
        Box::new(AddIndex {
            version,
            name: format!("add_index_{collection}_{}", index.name),
            collection,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner_with(migs: Vec<Box<dyn Migration>>) -> MigrationRunner {
        let mut runner = MigrationRunner::new();
        for m in migs {
            runner.register(m).unwrap();
        }
        runner
    }

    #[test]
    fn run_pending_applies_in_order() {
        let runner = runner_with(vec![
            migrations::create_collection(1, "tasks", "id"),
            migrations::add_index(2, "tasks", "by_date", "date"),
            migrations::create_collection(3, "notes", "id"),
        ]);
        runner.validate().unwrap();

        let mut catalog = SchemaCatalog::new();
        let applied = runner.run_pending(&mut catalog).unwrap();

        assert_eq!(applied, 3);
        assert_eq!(catalog.version, 3);
        assert!(catalog.collection("tasks").unwrap().index("by_date").is_some());
        assert!(catalog.collection("notes").is_some());
    }

    #[test]
    fn running_twice_equals_running_once() {
        let runner = runner_with(vec![
            migrations::create_collection(1, "tasks", "id"),
            migrations::add_index(2, "tasks", "by_date", "date"),
        ]);

        let mut once = SchemaCatalog::new();
        runner.run_pending(&mut once).unwrap();

        let mut twice = SchemaCatalog::new();
        runner.run_pending(&mut twice).unwrap();
        let applied_again = runner.run_pending(&mut twice).unwrap();

        assert_eq!(applied_again, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn reapplying_over_existing_schema_is_noop() {
        // Version marker lost but schema intact: re-running must not fail
        // or duplicate anything.
        let runner = runner_with(vec![
            migrations::create_collection(1, "tasks", "id"),
            migrations::add_index(2, "tasks", "by_date", "date"),
        ]);

        let mut catalog = SchemaCatalog::new();
        runner.run_pending(&mut catalog).unwrap();

        catalog.version = 0;
        runner.run_pending(&mut catalog).unwrap();

        assert_eq!(catalog.version, 2);
        assert_eq!(catalog.collection("tasks").unwrap().indexes.len(), 1);
    }

    #[test]
    fn pending_skips_applied() {
        let runner = runner_with(vec![
            migrations::create_collection(1, "tasks", "id"),
            migrations::create_collection(2, "notes", "id"),
        ]);

        let pending = runner.pending(1);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, 2);
    }

    #[test]
    fn duplicate_version_rejected() {
        let mut runner = MigrationRunner::new();
        runner
            .register(migrations::create_collection(1, "tasks", "id"))
            .unwrap();

        let err = runner
            .register(migrations::create_collection(1, "notes", "id"))
            .unwrap_err();
        assert!(matches!(err, StoreError::MigrationFailed { .. }));
    }

    #[test]
    fn validate_detects_gaps() {
        let runner = runner_with(vec![
            migrations::create_collection(1, "tasks", "id"),
            migrations::create_collection(3, "notes", "id"),
        ]);
        assert!(runner.validate().is_err());
    }

    #[test]
    fn empty_runner() {
        let runner = MigrationRunner::new();
        runner.validate().unwrap();
        assert_eq!(runner.latest_version(), 0);

        let mut catalog = SchemaCatalog::new();
        assert_eq!(runner.run_pending(&mut catalog).unwrap(), 0);
    }

    #[test]
    fn index_before_collection_fails() {
        let runner = runner_with(vec![migrations::add_index(1, "ghosts", "by_x", "x")]);

        let mut catalog = SchemaCatalog::new();
        let err = runner.run_pending(&mut catalog).unwrap_err();
        assert!(matches!(err, StoreError::MigrationFailed { .. }));
        assert_eq!(catalog.version, 0);
    }
}
