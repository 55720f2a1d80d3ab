//! SchemaManager - the execution context handed to a migration's `up()` and `down()`

use super::scripts::{self, EmbeddedScript};
use crate::executor::{DbError, Executor};
use may_postgres::types::ToSql;
use sea_query::{
    ColumnDef, IndexCreateStatement, IndexDropStatement, PostgresQueryBuilder, Table,
    TableAlterStatement, TableCreateStatement, TableDropStatement,
};
use std::fmt::Display;

/// SchemaManager provides methods for performing schema operations in migrations
///
/// The runner builds one per `up()`/`down()` call, bound to that migration's transaction, and
/// drops it when the call returns. Raw SQL goes through [`sql`](Self::sql); structured DDL goes
/// through the `sea-query` helpers.
pub struct SchemaManager<'a> {
    executor: &'a dyn Executor,
    module: &'a str,
    scripts: &'static [EmbeddedScript],
}

impl<'a> SchemaManager<'a> {
    /// Create a SchemaManager for a migration declared in `module`
    pub fn new(
        executor: &'a dyn Executor,
        module: &'a str,
        scripts: &'static [EmbeddedScript],
    ) -> Self {
        Self {
            executor,
            module,
            scripts,
        }
    }

    /// Run a SQL command
    ///
    /// Blank lines are dropped, and so is a final line consisting of `GO` (any case). Returns
    /// `Ok(None)` without touching the database when nothing is left, otherwise the affected-row
    /// count.
    ///
    /// # Example
    /// ```rust,no_run
    /// # use tidemark::migration::SchemaManager;
    /// # fn run(manager: &SchemaManager<'_>) -> Result<(), tidemark::executor::DbError> {
    /// manager.sql("UPDATE users SET active = $1\nGO", &[&true])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn sql(&self, text: &str, params: &[&dyn ToSql]) -> Result<Option<u64>, DbError> {
        match clean_command_text(text) {
            Some(command) => self.executor.execute(&command, params).map(Some),
            None => {
                log::debug!("Skipping empty SQL command in {}", self.module);
                Ok(None)
            }
        }
    }

    /// Run a script embedded by the migration's own module
    ///
    /// # Errors
    ///
    /// Returns `DbError::MissingScript` naming the module and path when the migration did not
    /// embed `relative_path`.
    pub fn embedded_sql(
        &self,
        relative_path: &str,
        params: &[&dyn ToSql],
    ) -> Result<Option<u64>, DbError> {
        let script = scripts::find(self.scripts, relative_path).ok_or_else(|| {
            DbError::MissingScript {
                namespace: self.module.to_string(),
                path: relative_path.to_string(),
            }
        })?;
        log::debug!("Running embedded script {} from {}", script.path, self.module);
        self.sql(script.sql, params)
    }

    /// Create a table
    ///
    /// # Example
    /// ```rust,no_run
    /// use sea_query::{Table, ColumnDef};
    /// # fn run(manager: &tidemark::migration::SchemaManager<'_>) -> Result<(), tidemark::executor::DbError> {
    ///
    /// let table = Table::create()
    ///     .table("users")
    ///     .col(ColumnDef::new("id").integer().not_null().auto_increment().primary_key())
    ///     .col(ColumnDef::new("email").string().not_null().unique_key())
    ///     .to_owned();
    ///
    /// manager.create_table(table)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_table(&self, table: TableCreateStatement) -> Result<(), DbError> {
        let sql = table.build(PostgresQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    /// Drop a table
    pub fn drop_table(&self, table: TableDropStatement) -> Result<(), DbError> {
        let sql = table.build(PostgresQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    /// Alter a table
    ///
    /// # Example
    /// ```rust,no_run
    /// use sea_query::{Table, ColumnDef};
    /// # fn run(manager: &tidemark::migration::SchemaManager<'_>) -> Result<(), tidemark::executor::DbError> {
    ///
    /// let alter = Table::alter()
    ///     .table("users")
    ///     .add_column(ColumnDef::new("avatar_url").string().null())
    ///     .to_owned();
    ///
    /// manager.alter_table(alter)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn alter_table(&self, alter: TableAlterStatement) -> Result<(), DbError> {
        let sql = alter.build(PostgresQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    /// Create an index
    pub fn create_index(&self, index: IndexCreateStatement) -> Result<(), DbError> {
        let sql = index.build(PostgresQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    /// Drop an index
    pub fn drop_index(&self, index: IndexDropStatement) -> Result<(), DbError> {
        let sql = index.build(PostgresQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    /// Add a column to an existing table
    pub fn add_column<T: Display>(&self, table: T, column: ColumnDef) -> Result<(), DbError> {
        let alter = Table::alter()
            .table(table.to_string())
            .add_column(column)
            .to_owned();
        self.alter_table(alter)
    }

    /// Drop a column from an existing table
    pub fn drop_column<T: Display>(&self, table: T, column: &str) -> Result<(), DbError> {
        let alter = Table::alter()
            .table(table.to_string())
            .drop_column(column.to_string())
            .to_owned();
        self.alter_table(alter)
    }

    /// Rename a column in an existing table
    pub fn rename_column<T: Display>(
        &self,
        table: T,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), DbError> {
        let alter = Table::alter()
            .table(table.to_string())
            .rename_column(old_name.to_string(), new_name.to_string())
            .to_owned();
        self.alter_table(alter)
    }

    /// Module the migration was declared in
    pub fn module(&self) -> &str {
        self.module
    }

    /// The executor bound to the current migration's transaction
    pub fn executor(&self) -> &dyn Executor {
        self.executor
    }
}

/// Drop blank lines and a trailing `GO` batch separator; `None` when nothing remains
pub(crate) fn clean_command_text(text: &str) -> Option<String> {
    let mut lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();

    if lines
        .last()
        .is_some_and(|last| last.trim().eq_ignore_ascii_case("go"))
    {
        lines.pop();
    }

    let cleaned = lines.join("\n").trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
