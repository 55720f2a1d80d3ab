//! Transaction Module
//!
//! Provides the transaction guard the runner wraps around every migration.
//!
//! A [`Transaction`] borrows any [`Executor`], issues `BEGIN ISOLATION LEVEL …` on creation and
//! `COMMIT` or `ROLLBACK` when closed. It implements `Executor` itself, so a migration's actions
//! and the ledger write both run inside it. Dropping a guard that was never closed rolls back.

use crate::executor::{DbError, Executor};
use may_postgres::types::ToSql;
use may_postgres::Row;
use thiserror::Error;

#[cfg(feature = "tracing")]
use crate::telemetry::tracing_helpers;

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Read uncommitted (PostgreSQL treats it as ReadCommitted)
    ReadUncommitted,
    /// Read committed (default, and the level migrations run at)
    #[default]
    ReadCommitted,
    /// Repeatable read
    RepeatableRead,
    /// Serializable
    Serializable,
}

impl IsolationLevel {
    /// Convert to PostgreSQL SQL syntax
    pub fn to_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Transaction error type
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The transaction-control statement itself failed
    #[error("Transaction control failed: {0}")]
    Database(#[from] DbError),
    /// Transaction already committed or rolled back
    #[error("Transaction has already been committed or rolled back")]
    TransactionClosed,
}

/// A database transaction
///
/// # Examples
///
/// ```no_run
/// use tidemark::executor::Executor;
/// use tidemark::memory::MemoryDatabase;
/// use tidemark::transaction::{IsolationLevel, Transaction};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let db = MemoryDatabase::new();
/// let transaction = Transaction::begin(&db, IsolationLevel::ReadCommitted)?;
/// transaction.execute("CREATE TABLE users (id BIGINT)", &[])?;
/// transaction.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction<'a> {
    executor: &'a dyn Executor,
    isolation_level: IsolationLevel,
    closed: bool,
}

impl<'a> Transaction<'a> {
    /// Begin a transaction on `executor` at the given isolation level
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::Database` if `BEGIN` fails.
    pub fn begin(
        executor: &'a dyn Executor,
        isolation_level: IsolationLevel,
    ) -> Result<Self, TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        let begin_sql = format!("BEGIN ISOLATION LEVEL {}", isolation_level.to_sql());
        executor.execute(&begin_sql, &[])?;

        Ok(Self {
            executor,
            isolation_level,
            closed: false,
        })
    }

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction has already been closed or `COMMIT` fails.
    pub fn commit(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::commit_transaction_span().entered();

        // Closed before the statement runs: a failed COMMIT leaves PostgreSQL's transaction
        // aborted, and Drop must not issue a second statement against it.
        self.closed = true;
        self.executor.execute("COMMIT", &[])?;
        Ok(())
    }

    /// Roll back the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction has already been closed or `ROLLBACK` fails.
    pub fn rollback(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::rollback_transaction_span().entered();

        self.closed = true;
        self.executor.execute("ROLLBACK", &[])?;
        Ok(())
    }

    /// The isolation level this transaction was opened with
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!("Transaction dropped while open; rolling back");
            if let Err(e) = self.executor.execute("ROLLBACK", &[]) {
                log::error!("Rollback on drop failed: {e}");
            }
        }
    }
}

impl Executor for Transaction<'_> {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, DbError> {
        if self.closed {
            return Err(DbError::Other("Transaction is closed".to_string()));
        }
        self.executor.execute(query, params)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, DbError> {
        if self.closed {
            return Err(DbError::Other("Transaction is closed".to_string()));
        }
        self.executor.query_all(query, params)
    }
}
