//! In-process database for tests and rehearsals
//!
//! [`MemoryDatabase`] implements both [`Executor`] and [`VersionLedger`]. It does not interpret
//! SQL: statements are appended to a log, and `BEGIN`/`COMMIT`/`ROLLBACK` give that log and the
//! ledger rows real transaction semantics. Failures can be injected by statement pattern or for
//! every ledger write.
//!
//! ```rust
//! use tidemark::memory::MemoryDatabase;
//! use tidemark::migration::MigrationRegistry;
//!
//! # fn main() -> Result<(), tidemark::migration::MigrationError> {
//! let db = MemoryDatabase::new();
//! let runner = db.runner(MigrationRegistry::new().discover()?);
//! assert!(runner.up()?.is_empty());
//! # Ok(())
//! # }
//! ```

use crate::executor::{DbError, Executor};
use crate::migration::{LedgerEntry, MigrationError, MigrationRunner, MigrationSet, VersionLedger};
use may_postgres::types::ToSql;
use may_postgres::Row;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct Snapshot {
    statements: Vec<String>,
    ledger: BTreeMap<i64, LedgerEntry>,
    next_row_id: i64,
}

#[derive(Debug)]
struct State {
    statements: Vec<String>,
    journal: Vec<String>,
    ledger: BTreeMap<i64, LedgerEntry>,
    next_row_id: i64,
    snapshot: Option<Snapshot>,
    last_isolation: Option<String>,
    commits: usize,
    rollbacks: usize,
    ledger_writes: usize,
    bootstraps: usize,
    fail_patterns: Vec<String>,
    fail_ledger_writes: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            statements: Vec::new(),
            journal: Vec::new(),
            ledger: BTreeMap::new(),
            next_row_id: 1,
            snapshot: None,
            last_isolation: None,
            commits: 0,
            rollbacks: 0,
            ledger_writes: 0,
            bootstraps: 0,
            fail_patterns: Vec::new(),
            fail_ledger_writes: false,
        }
    }
}

impl State {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            statements: self.statements.clone(),
            ledger: self.ledger.clone(),
            next_row_id: self.next_row_id,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.statements = snapshot.statements;
        self.ledger = snapshot.ledger;
        self.next_row_id = snapshot.next_row_id;
    }

    fn injected_failure(&self, query: &str) -> Option<DbError> {
        self.fail_patterns
            .iter()
            .find(|pattern| query.contains(pattern.as_str()))
            .map(|pattern| DbError::Query(format!("injected failure for statement matching '{pattern}'")))
    }
}

/// Shared in-memory database; clones share state
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A runner over this database, using it as both executor and ledger
    pub fn runner(&self, set: MigrationSet) -> MigrationRunner {
        MigrationRunner::new(Box::new(self.clone()), set).with_ledger(Box::new(self.clone()))
    }

    /// Fail every statement containing `pattern`
    pub fn fail_on(&self, pattern: impl Into<String>) {
        self.lock().fail_patterns.push(pattern.into());
    }

    /// Stop injecting statement failures
    pub fn clear_failures(&self) {
        self.lock().fail_patterns.clear();
    }

    /// Fail every ledger `record`/`remove` while `fail` is set
    pub fn fail_ledger_writes(&self, fail: bool) {
        self.lock().fail_ledger_writes = fail;
    }

    /// Insert a ledger row directly, outside any transaction and without counting a write
    pub fn seed_ledger(&self, mut entry: LedgerEntry) {
        let mut state = self.lock();
        entry.row_id = Some(state.next_row_id);
        state.next_row_id += 1;
        state.ledger.insert(entry.version_id, entry);
    }

    /// Committed (or in-flight) statements, transaction control excluded
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// Every statement ever received, including transaction control and failed statements
    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }

    /// Ledger rows, ascending by key
    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.lock().ledger.values().cloned().collect()
    }

    /// Number of successful ledger `record`/`remove` calls, rolled back or not
    pub fn ledger_writes(&self) -> usize {
        self.lock().ledger_writes
    }

    /// Number of `ensure_table` calls
    pub fn bootstraps(&self) -> usize {
        self.lock().bootstraps
    }

    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.lock().rollbacks
    }

    /// Isolation level named by the most recent `BEGIN`
    pub fn last_isolation(&self) -> Option<String> {
        self.lock().last_isolation.clone()
    }

    pub fn in_transaction(&self) -> bool {
        self.lock().snapshot.is_some()
    }
}

impl Executor for MemoryDatabase {
    fn execute(&self, query: &str, _params: &[&dyn ToSql]) -> Result<u64, DbError> {
        let mut state = self.lock();
        let statement = query.trim().to_string();
        state.journal.push(statement.clone());

        let upper = statement.to_ascii_uppercase();
        if upper.starts_with("BEGIN") {
            if state.snapshot.is_some() {
                return Err(DbError::Query("a transaction is already in progress".to_string()));
            }
            let snapshot = state.snapshot();
            state.snapshot = Some(snapshot);
            state.last_isolation = upper
                .split_once("ISOLATION LEVEL")
                .map(|(_, level)| level.trim().to_string());
            return Ok(0);
        }

        if upper == "COMMIT" {
            if state.snapshot.take().is_none() {
                return Err(DbError::Query("no transaction in progress".to_string()));
            }
            state.commits += 1;
            return Ok(0);
        }

        if upper == "ROLLBACK" {
            let Some(snapshot) = state.snapshot.take() else {
                return Err(DbError::Query("no transaction in progress".to_string()));
            };
            state.restore(snapshot);
            state.rollbacks += 1;
            return Ok(0);
        }

        if let Some(err) = state.injected_failure(&statement) {
            return Err(err);
        }

        state.statements.push(statement);
        Ok(0)
    }

    fn query_all(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Vec<Row>, DbError> {
        let mut state = self.lock();
        let statement = query.trim().to_string();
        state.journal.push(statement.clone());

        match state.injected_failure(&statement) {
            Some(err) => Err(err),
            None => Ok(Vec::new()),
        }
    }
}

impl VersionLedger for MemoryDatabase {
    fn ensure_table(&self, _executor: &dyn Executor) -> Result<(), MigrationError> {
        self.lock().bootstraps += 1;
        Ok(())
    }

    fn applied(&self, _executor: &dyn Executor) -> Result<Vec<LedgerEntry>, MigrationError> {
        Ok(self.ledger_entries())
    }

    fn record(&self, _executor: &dyn Executor, entry: &LedgerEntry) -> Result<(), MigrationError> {
        entry.validate()?;

        let mut state = self.lock();
        if state.fail_ledger_writes {
            return Err(DbError::Query("injected ledger write failure".to_string()).into());
        }
        if state.ledger.contains_key(&entry.version_id) {
            return Err(MigrationError::DuplicateKey(entry.version_id));
        }

        let mut entry = entry.clone();
        entry.row_id = Some(state.next_row_id);
        state.next_row_id += 1;
        state.ledger.insert(entry.version_id, entry);
        state.ledger_writes += 1;
        Ok(())
    }

    fn remove(&self, _executor: &dyn Executor, version_id: i64) -> Result<(), MigrationError> {
        let mut state = self.lock();
        if state.fail_ledger_writes {
            return Err(DbError::Query("injected ledger write failure".to_string()).into());
        }
        if state.ledger.remove(&version_id).is_none() {
            return Err(MigrationError::NotFound(version_id));
        }
        state.ledger_writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{VersionIdentifier, VersionKind};
    use chrono::Utc;

    fn entry(key_major: i32) -> LedgerEntry {
        let id = VersionIdentifier::from_semantic_version(key_major, 0, 0, 0).unwrap();
        LedgerEntry {
            row_id: None,
            version_id: id.ordering_key(),
            applied_on: Utc::now(),
            kind: Some(VersionKind::SemanticVersion),
            text: id.display_text(),
            marker: VersionKind::SemanticVersion,
            description: None,
        }
    }

    #[test]
    fn test_rollback_restores_statements_and_ledger() {
        let db = MemoryDatabase::new();
        db.execute("CREATE TABLE kept (id BIGINT)", &[]).unwrap();

        db.execute("BEGIN ISOLATION LEVEL READ COMMITTED", &[]).unwrap();
        db.execute("CREATE TABLE dropped (id BIGINT)", &[]).unwrap();
        db.record(&db, &entry(1)).unwrap();
        db.execute("ROLLBACK", &[]).unwrap();

        assert_eq!(db.statements(), vec!["CREATE TABLE kept (id BIGINT)".to_string()]);
        assert!(db.ledger_entries().is_empty());
        assert_eq!(db.rollbacks(), 1);
        assert!(!db.in_transaction());
    }

    #[test]
    fn test_commit_keeps_ledger_rows() {
        let db = MemoryDatabase::new();
        db.execute("BEGIN ISOLATION LEVEL SERIALIZABLE", &[]).unwrap();
        db.record(&db, &entry(1)).unwrap();
        db.execute("COMMIT", &[]).unwrap();

        let rows = db.ledger_entries();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_id, Some(1));
        assert_eq!(db.last_isolation().as_deref(), Some("SERIALIZABLE"));
        assert_eq!(db.commits(), 1);
    }

    #[test]
    fn test_nested_begin_is_rejected() {
        let db = MemoryDatabase::new();
        db.execute("BEGIN", &[]).unwrap();
        assert!(db.execute("BEGIN", &[]).is_err());
        assert!(db.execute("COMMIT", &[]).is_ok());
        assert!(db.execute("COMMIT", &[]).is_err());
    }

    #[test]
    fn test_ledger_consistency_errors() {
        let db = MemoryDatabase::new();
        db.record(&db, &entry(1)).unwrap();

        assert!(matches!(
            db.record(&db, &entry(1)),
            Err(MigrationError::DuplicateKey(_))
        ));
        assert!(matches!(
            db.remove(&db, entry(2).version_id),
            Err(MigrationError::NotFound(_))
        ));
        assert_eq!(db.ledger_writes(), 1);
    }

    #[test]
    fn test_max_applied_key_defaults_to_zero() {
        let db = MemoryDatabase::new();
        assert_eq!(db.max_applied_key(&db).unwrap(), 0);

        db.seed_ledger(entry(3));
        db.seed_ledger(entry(1));
        assert_eq!(db.max_applied_key(&db).unwrap(), entry(3).version_id);
        assert_eq!(db.ledger_writes(), 0);
    }

    #[test]
    fn test_injected_failures() {
        let db = MemoryDatabase::new();
        db.fail_on("DROP TABLE");

        assert!(db.execute("DROP TABLE users", &[]).is_err());
        assert!(db.execute("CREATE TABLE users (id BIGINT)", &[]).is_ok());
        assert_eq!(db.journal().len(), 2);
        assert_eq!(db.statements().len(), 1);

        db.clear_failures();
        db.fail_ledger_writes(true);
        assert!(matches!(
            db.record(&db, &entry(1)),
            Err(MigrationError::Database(_))
        ));
    }
}
