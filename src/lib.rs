//! # Tidemark
//!
//! Versioned schema migrations for PostgreSQL over `may_postgres`.
//!
//! Migrations are Rust types implementing [`migration::Migration`], each identified by a
//! timestamp or a semantic version. A [`migration::MigrationRunner`] applies or reverts them one
//! transaction at a time and records what is applied in a version ledger table.
//!
//! ```rust,no_run
//! use tidemark::config::MigratorConfig;
//! use tidemark::migration::{MigrationRegistry, MigrationRunner};
//!
//! # fn main() -> Result<(), tidemark::migration::MigrationError> {
//! let set = MigrationRegistry::new().discover()?;
//! let runner = MigrationRunner::connect(&MigratorConfig::load()?, set)?;
//! runner.up()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod executor;
pub mod memory;
pub mod migration;
pub mod telemetry;
pub mod transaction;

pub use connection::{connect, ConnectionError};
pub use executor::{DbError, Executor, PgExecutor};
pub use migration::{Migration, MigrationError, MigrationRunner, SchemaManager, VersionMarker};
pub use transaction::{IsolationLevel, Transaction, TransactionError};
