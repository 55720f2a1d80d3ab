//! Migration trait definition

use super::identifier::VersionMarker;
use super::schema_manager::SchemaManager;
use super::scripts::EmbeddedScript;
use crate::executor::DbError;

/// Trait that all migrations must implement
///
/// A migration declares exactly one [`VersionMarker`] and provides `up()` and `down()` actions.
/// Both actions receive a [`SchemaManager`] bound to the transaction the runner opened for this
/// migration; everything they execute commits or rolls back together with the ledger row.
///
/// ```rust
/// use sea_query::{ColumnDef, Table};
/// use tidemark::executor::DbError;
/// use tidemark::migration::{Migration, SchemaManager, VersionMarker};
///
/// pub struct CreateUsersTable;
///
/// impl Migration for CreateUsersTable {
///     fn marker(&self) -> VersionMarker {
///         VersionMarker::timestamp(2024, 1, 20, 12, 0, 0)
///     }
///
///     fn up(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
///         let table = Table::create()
///             .table("users")
///             .col(ColumnDef::new("id").big_integer().not_null().primary_key())
///             .col(ColumnDef::new("email").string().not_null())
///             .to_owned();
///         manager.create_table(table)
///     }
///
///     fn down(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
///         manager.drop_table(Table::drop().table("users").to_owned())
///     }
/// }
/// ```
pub trait Migration: Send + Sync {
    /// The migration's identifying marker
    fn marker(&self) -> VersionMarker;

    /// Human-readable description recorded in the ledger
    ///
    /// Defaults to the implementing type's fully-qualified name.
    fn description(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// Apply the migration
    ///
    /// Synchronous: the executor blocks on each statement.
    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), DbError>;

    /// Revert the migration
    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), DbError>;

    /// Scripts this migration can run with [`SchemaManager::embedded_sql`]
    fn scripts(&self) -> &'static [EmbeddedScript] {
        &[]
    }
}
