//! A discovered migration with its validated identifier

use super::identifier::VersionIdentifier;
use super::migration::Migration;
use super::schema_manager::SchemaManager;
use crate::executor::{DbError, Executor};
use std::fmt;

/// Whether a migration is being applied or reverted
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One migration as discovery produced it
///
/// The identifier is validated once at discovery; the unit never holds an execution context.
/// [`run`](Self::run) builds a [`SchemaManager`] for the duration of one call.
pub struct MigrationUnit {
    identifier: VersionIdentifier,
    description: String,
    module: &'static str,
    migration: Box<dyn Migration>,
}

impl MigrationUnit {
    pub(crate) fn new(
        identifier: VersionIdentifier,
        module: &'static str,
        migration: Box<dyn Migration>,
    ) -> Self {
        let description = migration.description();
        Self {
            identifier,
            description,
            module,
            migration,
        }
    }

    pub fn identifier(&self) -> &VersionIdentifier {
        &self.identifier
    }

    pub fn ordering_key(&self) -> i64 {
        self.identifier.ordering_key()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Module the migration was registered from; embedded scripts resolve against it
    pub fn module(&self) -> &'static str {
        self.module
    }

    /// Run the unit's `up()` or `down()` against `executor`
    pub fn run(&self, executor: &dyn Executor, direction: Direction) -> Result<(), DbError> {
        let manager = SchemaManager::new(executor, self.module, self.migration.scripts());
        match direction {
            Direction::Up => self.migration.up(&manager),
            Direction::Down => self.migration.down(&manager),
        }
    }
}

impl fmt::Debug for MigrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationUnit")
            .field("identifier", &self.identifier.display_text())
            .field("description", &self.description)
            .field("module", &self.module)
            .finish()
    }
}
