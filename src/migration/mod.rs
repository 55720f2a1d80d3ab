//! Versioned schema migrations
//!
//! This module provides:
//! - the [`Migration`] trait and the [`VersionMarker`] every migration declares
//! - [`VersionIdentifier`] ordering and display rules
//! - explicit registration and discovery ([`MigrationRegistry`])
//! - the [`SchemaManager`] execution context handed to `up()`/`down()`
//! - the [`VersionLedger`] that records applied migrations
//! - the [`MigrationRunner`] that applies and reverts them
//!
//! # Example
//!
//! ```rust,no_run
//! use tidemark::executor::DbError;
//! use tidemark::migration::{Migration, MigrationRegistry, SchemaManager, VersionMarker};
//! use sea_query::{ColumnDef, Table};
//!
//! pub struct CreateUsersTable;
//!
//! impl Migration for CreateUsersTable {
//!     fn marker(&self) -> VersionMarker {
//!         VersionMarker::version(1, 0)
//!     }
//!
//!     fn up(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
//!         let table = Table::create()
//!             .table("users")
//!             .col(ColumnDef::new("id").big_integer().not_null().primary_key())
//!             .col(ColumnDef::new("email").string().not_null())
//!             .to_owned();
//!         manager.create_table(table)
//!     }
//!
//!     fn down(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
//!         manager.sql("DROP TABLE users", &[]).map(|_| ())
//!     }
//! }
//!
//! let registry = MigrationRegistry::new()
//!     .module(tidemark::migration_module![CreateUsersTable]);
//! ```

pub mod error;
pub mod hooks;
pub mod identifier;
pub mod ledger;
pub mod migration;
pub mod migrator;
pub mod plan;
pub mod record;
pub mod registry;
pub mod schema_manager;
pub mod scripts;
pub mod startup;
pub mod status;
pub mod unit;

pub use error::MigrationError;
pub use hooks::MigrationHooks;
pub use identifier::{SemanticVersion, VersionIdentifier, VersionKind, VersionMarker, MAX_VERSION_FIELD};
pub use ledger::{PgLedger, VersionLedger, DEFAULT_LEDGER_TABLE};
pub use migration::Migration;
pub use migrator::{MigrationReport, MigrationRunner};
pub use plan::{AppliedSet, MigrationPlan, Operation, PlannedMigration};
pub use record::LedgerEntry;
pub use registry::{MigrationModule, MigrationRegistry, MigrationSet};
pub use schema_manager::SchemaManager;
pub use scripts::EmbeddedScript;
pub use startup::startup_migrations;
pub use status::MigrationStatus;
pub use unit::{Direction, MigrationUnit};
