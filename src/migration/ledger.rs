//! The version ledger: which migrations are applied
//!
//! Every operation takes the executor to run against, so the runner can bootstrap the table on
//! its own connection and then record or remove rows inside each migration's transaction.

use super::record::LedgerEntry;
use crate::executor::Executor;
use crate::migration::MigrationError;
use sea_query::{ColumnDef, PostgresQueryBuilder, Table, TableCreateStatement};

/// Default ledger table name
pub const DEFAULT_LEDGER_TABLE: &str = "VersionInfo";

/// Storage for applied-migration rows
pub trait VersionLedger {
    /// Create the ledger table if it does not exist; idempotent
    fn ensure_table(&self, executor: &dyn Executor) -> Result<(), MigrationError>;

    /// Every row, ordered by `version_id` ascending
    fn applied(&self, executor: &dyn Executor) -> Result<Vec<LedgerEntry>, MigrationError>;

    /// Highest applied `version_id`, or 0 when the ledger is empty
    fn max_applied_key(&self, executor: &dyn Executor) -> Result<i64, MigrationError> {
        Ok(self
            .applied(executor)?
            .iter()
            .map(|entry| entry.version_id)
            .max()
            .unwrap_or(0))
    }

    /// Insert a row
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::DuplicateKey` if a row with the same `version_id` exists.
    fn record(&self, executor: &dyn Executor, entry: &LedgerEntry) -> Result<(), MigrationError>;

    /// Delete the row for `version_id`
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::NotFound` if no row matched.
    fn remove(&self, executor: &dyn Executor, version_id: i64) -> Result<(), MigrationError>;
}

/// PostgreSQL ledger table
#[derive(Debug, Clone)]
pub struct PgLedger {
    table: String,
}

impl Default for PgLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_TABLE)
    }
}

impl PgLedger {
    /// Ledger stored in `table`, optionally schema-qualified (`ops.VersionInfo`)
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Table reference quoted for raw SQL
    fn quoted_table(&self) -> String {
        self.table
            .split('.')
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// The `CREATE TABLE IF NOT EXISTS` statement for this ledger
    pub fn create_table_statement(&self) -> TableCreateStatement {
        let mut create = Table::create();
        match self.table.split_once('.') {
            Some((schema, table)) => create.table((schema.to_string(), table.to_string())),
            None => create.table(self.table.clone()),
        };

        create
            .if_not_exists()
            .col(
                ColumnDef::new("Id")
                    .big_integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new("VersionId").big_integer().not_null().unique_key())
            .col(
                ColumnDef::new("AppliedOn")
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(ColumnDef::new("AttributeKind").string_len(9).null())
            .col(ColumnDef::new("Text").string_len(127).not_null())
            .col(ColumnDef::new("AttributeTypeFullName").string_len(255).not_null())
            .col(ColumnDef::new("Description").text().null())
            .to_owned()
    }

    fn select_sql(&self) -> String {
        format!(
            r#"SELECT "Id", "VersionId", "AppliedOn", "AttributeKind", "Text", "AttributeTypeFullName", "Description" FROM {} ORDER BY "VersionId""#,
            self.quoted_table()
        )
    }

    fn max_sql(&self) -> String {
        format!(
            r#"SELECT COALESCE(MAX("VersionId"), 0) FROM {}"#,
            self.quoted_table()
        )
    }

    fn insert_sql(&self) -> String {
        format!(
            r#"INSERT INTO {} ("VersionId", "AppliedOn", "AttributeKind", "Text", "AttributeTypeFullName", "Description") VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT ("VersionId") DO NOTHING"#,
            self.quoted_table()
        )
    }

    fn delete_sql(&self) -> String {
        format!(
            r#"DELETE FROM {} WHERE "VersionId" = $1"#,
            self.quoted_table()
        )
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

impl VersionLedger for PgLedger {
    fn ensure_table(&self, executor: &dyn Executor) -> Result<(), MigrationError> {
        let sql = self.create_table_statement().build(PostgresQueryBuilder);
        executor.execute(&sql, &[])?;
        log::debug!("Version ledger table {} is ready", self.table);
        Ok(())
    }

    fn applied(&self, executor: &dyn Executor) -> Result<Vec<LedgerEntry>, MigrationError> {
        executor
            .query_all(&self.select_sql(), &[])?
            .iter()
            .map(LedgerEntry::from_row)
            .collect()
    }

    fn max_applied_key(&self, executor: &dyn Executor) -> Result<i64, MigrationError> {
        let rows = executor.query_all(&self.max_sql(), &[])?;
        match rows.first() {
            Some(row) => Ok(row
                .try_get::<_, i64>(0)
                .map_err(crate::executor::DbError::Postgres)?),
            None => Ok(0),
        }
    }

    fn record(&self, executor: &dyn Executor, entry: &LedgerEntry) -> Result<(), MigrationError> {
        entry.validate()?;

        let kind = entry.kind.map(|k| k.as_str());
        let marker = entry.marker.marker_type_name();
        let inserted = executor.execute(
            &self.insert_sql(),
            &[
                &entry.version_id,
                &entry.applied_on,
                &kind,
                &entry.text,
                &marker,
                &entry.description,
            ],
        )?;

        if inserted == 0 {
            return Err(MigrationError::DuplicateKey(entry.version_id));
        }
        Ok(())
    }

    fn remove(&self, executor: &dyn Executor, version_id: i64) -> Result<(), MigrationError> {
        let deleted = executor.execute(&self.delete_sql(), &[&version_id])?;
        if deleted == 0 {
            return Err(MigrationError::NotFound(version_id));
        }
        Ok(())
    }
}
