//! Migration-specific error types

use crate::connection::ConnectionError;
use crate::executor::DbError;
use crate::transaction::TransactionError;
use thiserror::Error;

/// Migration-specific errors
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Bad identifier components, unparsable identifier text, or an unrecognized ledger row
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A migration set (or a bound) mixes timestamp and version identifiers
    #[error("Inconsistent versioning: {0}")]
    InconsistentVersioning(String),

    /// Raised only by `MigrationRegistry::discover_required`
    #[error("No migrations found in the registered modules")]
    NoMigrationsFound,

    /// Two migrations in one set share an ordering key
    #[error(
        "Migrations '{first}' and '{second}' share version {identifier}; \
         each migration needs a distinct identifier"
    )]
    DuplicateMigration {
        identifier: String,
        first: String,
        second: String,
    },

    /// The ledger already holds a row for this key
    #[error("Version {0} is already recorded in the version ledger")]
    DuplicateKey(i64),

    /// The ledger holds no row for this key
    #[error("Version {0} is not recorded in the version ledger")]
    NotFound(i64),

    /// A migration's up or down action failed; its transaction was rolled back
    #[error("Migration '{description}' ({identifier}) failed: {source}")]
    ExecutionFailed {
        identifier: String,
        description: String,
        #[source]
        source: DbError,
    },

    /// Bootstrap, ledger or transaction-control failure
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// The cancellation flag was raised between migrations
    #[error("Migration batch cancelled after {completed} migration(s)")]
    Cancelled { completed: usize },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
