//! Explicit migration registration and discovery
//!
//! Migrations are grouped into [`MigrationModule`]s, usually one per Rust module that declares
//! migrations (the [`migration_module!`](crate::migration_module) macro records the module path).
//! A [`MigrationRegistry`] collects modules; [`discover`](MigrationRegistry::discover) validates
//! every marker and produces the [`MigrationSet`] a runner consumes. Discovery never touches the
//! database.

use super::identifier::{VersionIdentifier, VersionKind};
use super::migration::Migration;
use super::unit::MigrationUnit;
use crate::migration::MigrationError;
use std::collections::HashMap;

/// The migrations declared by one code module
pub struct MigrationModule {
    name: &'static str,
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationModule {
    /// Start an empty module; `name` binds embedded scripts and appears in error messages
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            migrations: Vec::new(),
        }
    }

    /// Add a migration
    pub fn with<M: Migration + 'static>(mut self, migration: M) -> Self {
        self.migrations.push(Box::new(migration));
        self
    }

    /// Add an already boxed migration
    pub fn with_boxed(mut self, migration: Box<dyn Migration>) -> Self {
        self.migrations.push(migration);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

/// Build a [`MigrationModule`] named after the calling module
///
/// ```rust,ignore
/// pub fn migrations() -> MigrationModule {
///     tidemark::migration_module![CreateUsers, AddEmailIndex]
/// }
/// ```
#[macro_export]
macro_rules! migration_module {
    ($($migration:expr),* $(,)?) => {
        $crate::migration::MigrationModule::new(module_path!())
            $(.with($migration))*
    };
}

/// The set of modules to discover migrations from
#[derive(Default)]
pub struct MigrationRegistry {
    modules: Vec<MigrationModule>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module; discovery order follows registration order
    pub fn module(mut self, module: MigrationModule) -> Self {
        self.modules.push(module);
        self
    }

    /// Number of migrations across all registered modules
    pub fn migration_count(&self) -> usize {
        self.modules.iter().map(MigrationModule::len).sum()
    }

    /// Validate every registered migration and build the migration set
    ///
    /// An empty registry yields an empty set.
    ///
    /// # Errors
    ///
    /// - `MigrationError::Validation` if a marker has invalid components
    /// - `MigrationError::InconsistentVersioning` if timestamps and versions are mixed
    /// - `MigrationError::DuplicateMigration` if two migrations share an ordering key
    pub fn discover(self) -> Result<MigrationSet, MigrationError> {
        let mut units = Vec::with_capacity(self.migration_count());
        let mut kind: Option<VersionKind> = None;
        let mut seen: HashMap<i64, String> = HashMap::new();

        for module in self.modules {
            let module_name = module.name;
            for migration in module.migrations {
                let marker = migration.marker();
                let identifier = marker.to_identifier().map_err(|e| match e {
                    MigrationError::Validation(msg) => MigrationError::Validation(format!(
                        "{} in {module_name}: {msg}",
                        migration.description()
                    )),
                    other => other,
                })?;

                match kind {
                    None => kind = Some(identifier.kind()),
                    Some(expected) if expected != identifier.kind() => {
                        return Err(MigrationError::InconsistentVersioning(format!(
                            "{} uses a {} identifier but earlier migrations use {}",
                            migration.description(),
                            identifier.kind(),
                            expected
                        )));
                    }
                    Some(_) => {}
                }

                let unit = MigrationUnit::new(identifier, module_name, migration);
                if let Some(first) = seen.insert(unit.ordering_key(), unit.description().to_string()) {
                    return Err(MigrationError::DuplicateMigration {
                        identifier: unit.identifier().display_text(),
                        first,
                        second: unit.description().to_string(),
                    });
                }

                log::debug!(
                    "Discovered migration {} ({}) in {}",
                    unit.identifier(),
                    unit.description(),
                    module_name
                );
                units.push(unit);
            }
        }

        Ok(MigrationSet { units, kind })
    }

    /// Like [`discover`](Self::discover), but an empty result is an error
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::NoMigrationsFound` when no module declares a migration, in
    /// addition to the errors `discover` returns.
    pub fn discover_required(self) -> Result<MigrationSet, MigrationError> {
        let set = self.discover()?;
        if set.is_empty() {
            return Err(MigrationError::NoMigrationsFound);
        }
        Ok(set)
    }
}

/// Validated migrations in discovery order, all sharing one identifier kind
#[derive(Debug)]
pub struct MigrationSet {
    units: Vec<MigrationUnit>,
    kind: Option<VersionKind>,
}

impl MigrationSet {
    /// A set with no migrations
    pub fn empty() -> Self {
        Self {
            units: Vec::new(),
            kind: None,
        }
    }

    pub fn units(&self) -> &[MigrationUnit] {
        &self.units
    }

    /// The identifier kind shared by every unit; `None` for an empty set
    pub fn kind(&self) -> Option<VersionKind> {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Find a unit by ordering key
    pub fn get(&self, key: i64) -> Option<&MigrationUnit> {
        self.units.iter().find(|unit| unit.ordering_key() == key)
    }

    /// Check that `bound` can be compared against this set
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InconsistentVersioning` if the bound's kind differs from the set's.
    pub fn check_bound(&self, bound: &VersionIdentifier) -> Result<(), MigrationError> {
        match self.kind {
            Some(kind) if kind != bound.kind() => Err(MigrationError::InconsistentVersioning(
                format!(
                    "Bound {bound} is a {} identifier but the migrations use {kind}",
                    bound.kind()
                ),
            )),
            _ => Ok(()),
        }
    }
}
