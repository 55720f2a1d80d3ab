//! MigrationRunner - applies and reverts a discovered migration set against the version ledger
//!
//! Every batch operation works the same way: make sure the ledger table exists, select the units
//! the operation covers (see [`plan`](super::plan)), then run each one in its own READ COMMITTED
//! transaction together with its ledger write. The first failure rolls back that unit and stops
//! the batch; units committed before it stay applied.

use super::hooks::MigrationHooks;
use super::identifier::VersionIdentifier;
use super::ledger::{PgLedger, VersionLedger};
use super::plan::{self, AppliedSet, MigrationPlan, Operation, PlannedMigration};
use super::record::LedgerEntry;
use super::registry::MigrationSet;
use super::status::MigrationStatus;
use super::unit::{Direction, MigrationUnit};
use crate::config::MigratorConfig;
use crate::connection::connect;
use crate::executor::{Executor, PgExecutor};
use crate::migration::MigrationError;
use crate::transaction::{IsolationLevel, Transaction};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use crate::telemetry::tracing_helpers;

/// What a batch operation executed, in execution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub direction: Direction,
    pub migrations: Vec<PlannedMigration>,
}

impl MigrationReport {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            migrations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Identifiers in execution order
    pub fn identifiers(&self) -> Vec<VersionIdentifier> {
        self.migrations.iter().map(|m| m.identifier).collect()
    }
}

/// Runs a [`MigrationSet`] against one database connection
///
/// The runner owns its executor and its migration set. Runners are not coordinated with each
/// other; callers must not point two at the same ledger at once.
///
/// # Example
///
/// ```rust,no_run
/// use tidemark::config::MigratorConfig;
/// use tidemark::migration::{MigrationRegistry, MigrationRunner};
///
/// # fn main() -> Result<(), tidemark::migration::MigrationError> {
/// let config = MigratorConfig::load()?;
/// let set = MigrationRegistry::new().discover()?;
///
/// let runner = MigrationRunner::connect(&config, set)?;
/// let report = runner.up()?;
/// println!("applied {} migration(s)", report.len());
/// runner.close();
/// # Ok(())
/// # }
/// ```
pub struct MigrationRunner {
    executor: Box<dyn Executor>,
    ledger: Box<dyn VersionLedger>,
    set: MigrationSet,
    hooks: MigrationHooks,
    cancel: Option<Arc<AtomicBool>>,
}

impl MigrationRunner {
    /// Create a runner over `executor`, recording into the default `VersionInfo` table
    pub fn new(executor: Box<dyn Executor>, set: MigrationSet) -> Self {
        Self {
            executor,
            ledger: Box::new(PgLedger::default()),
            set,
            hooks: MigrationHooks::default(),
            cancel: None,
        }
    }

    /// Connect to the configured database and record into the configured ledger table
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Connection` if the connection string is invalid or the
    /// connection fails.
    pub fn connect(config: &MigratorConfig, set: MigrationSet) -> Result<Self, MigrationError> {
        let client = connect(&config.url)?;
        Ok(Self::new(Box::new(PgExecutor::new(client)), set)
            .with_ledger(Box::new(PgLedger::new(config.ledger_table.clone()))))
    }

    /// Use a different ledger implementation or table
    pub fn with_ledger(mut self, ledger: Box<dyn VersionLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_hooks(mut self, hooks: MigrationHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Stop a batch between migrations once `flag` is set
    ///
    /// A migration already in flight always runs to commit or rollback.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// The migrations this runner was built with
    pub fn migration_set(&self) -> &MigrationSet {
        &self.set
    }

    /// Apply every migration above the highest applied key, ascending
    ///
    /// Migrations whose key falls below the highest applied key are not applied; use
    /// [`up_to`](Self::up_to) to fill such gaps.
    pub fn up(&self) -> Result<MigrationReport, MigrationError> {
        self.run(Operation::UpAll)
    }

    /// Revert every applied migration, descending
    pub fn down(&self) -> Result<MigrationReport, MigrationError> {
        self.run(Operation::DownAll)
    }

    /// Apply every unapplied migration strictly below `bound`, ascending
    pub fn up_to(&self, bound: &VersionIdentifier) -> Result<MigrationReport, MigrationError> {
        self.run(Operation::UpTo(*bound))
    }

    /// Revert every applied migration strictly above `bound`, descending
    pub fn down_to(&self, bound: &VersionIdentifier) -> Result<MigrationReport, MigrationError> {
        self.run(Operation::DownTo(*bound))
    }

    /// Select what `operation` would run without running it
    ///
    /// Creates the ledger table if it does not exist, and otherwise only reads.
    pub fn plan(&self, operation: Operation) -> Result<MigrationPlan, MigrationError> {
        self.check_operation(&operation)?;
        self.ledger.ensure_table(self.executor.as_ref())?;

        let selected = self.select(&operation)?;
        Ok(MigrationPlan {
            direction: operation.direction(),
            migrations: selected.into_iter().map(PlannedMigration::from).collect(),
        })
    }

    /// Compare the ledger against the discovered set
    pub fn status(&self) -> Result<MigrationStatus, MigrationError> {
        self.ledger.ensure_table(self.executor.as_ref())?;

        let entries = self.ledger.applied(self.executor.as_ref())?;
        let applied_keys = AppliedSet::from_entries(&entries);

        let (applied, unknown): (Vec<LedgerEntry>, Vec<LedgerEntry>) = entries
            .into_iter()
            .partition(|entry| self.set.get(entry.version_id).is_some());

        let mut pending: Vec<&MigrationUnit> = self
            .set
            .units()
            .iter()
            .filter(|unit| !applied_keys.contains(unit.ordering_key()))
            .collect();
        pending.sort_by_key(|unit| unit.ordering_key());

        if !unknown.is_empty() {
            log::warn!(
                "{} ledger row(s) have no matching migration: {}",
                unknown.len(),
                unknown
                    .iter()
                    .map(|entry| entry.text.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Ok(MigrationStatus::new(
            applied,
            pending.into_iter().map(PlannedMigration::from).collect(),
            unknown,
        ))
    }

    /// Release the connection and the migration set
    pub fn close(self) {
        log::debug!("Closing migration runner ({} migration(s))", self.set.len());
    }

    fn check_operation(&self, operation: &Operation) -> Result<(), MigrationError> {
        match operation.bound() {
            Some(bound) => self.set.check_bound(bound),
            None => Ok(()),
        }
    }

    fn select(&self, operation: &Operation) -> Result<Vec<&MigrationUnit>, MigrationError> {
        let executor = self.executor.as_ref();

        let (applied, max_applied_key) = match operation {
            Operation::UpAll => (AppliedSet::default(), self.ledger.max_applied_key(executor)?),
            _ => {
                let applied = AppliedSet::from_entries(&self.ledger.applied(executor)?);
                let max = applied.max_key();
                (applied, max)
            }
        };

        let selected = plan::select(&self.set, &applied, max_applied_key, operation);
        log::debug!(
            "{operation}: {} of {} migration(s) selected (highest applied {max_applied_key})",
            selected.len(),
            self.set.len()
        );
        Ok(selected)
    }

    fn run(&self, operation: Operation) -> Result<MigrationReport, MigrationError> {
        self.check_operation(&operation)?;

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::batch_span(operation.name()).entered();

        self.ledger.ensure_table(self.executor.as_ref())?;

        let direction = operation.direction();
        let selected = self.select(&operation)?;
        if selected.is_empty() {
            log::info!("{operation}: nothing to do");
            return Ok(MigrationReport::new(direction));
        }

        log::info!("{operation}: running {} migration(s)", selected.len());

        let mut report = MigrationReport::new(direction);
        for unit in selected {
            if self.is_cancelled() {
                log::warn!("{operation}: cancelled after {} migration(s)", report.len());
                return Err(MigrationError::Cancelled {
                    completed: report.len(),
                });
            }

            self.migrate(unit, direction)?;
            report.migrations.push(PlannedMigration::from(unit));
        }

        log::info!("{operation}: {} migration(s) complete", report.len());
        Ok(report)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Run one unit and its ledger write in a single transaction
    fn migrate(&self, unit: &MigrationUnit, direction: Direction) -> Result<(), MigrationError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::migration_span(
            &unit.identifier().display_text(),
            direction.as_str(),
        )
        .entered();

        self.hooks.fire_before(unit, direction);
        log::info!(
            "Migrating {direction}: {} ({})",
            unit.identifier(),
            unit.description()
        );

        let result = self.migrate_in_transaction(unit, direction);
        match &result {
            Ok(()) => self.hooks.fire_after(unit, direction),
            Err(e) => {
                log::error!(
                    "Migration {} ({}) failed {direction}: {e}",
                    unit.identifier(),
                    unit.description()
                );
                self.hooks.fire_error(unit, direction, e);
            }
        }
        result
    }

    fn migrate_in_transaction(
        &self,
        unit: &MigrationUnit,
        direction: Direction,
    ) -> Result<(), MigrationError> {
        let tx = Transaction::begin(self.executor.as_ref(), IsolationLevel::ReadCommitted)?;

        match self.apply(&tx, unit, direction) {
            Ok(()) => {
                tx.commit()?;
                Ok(())
            }
            Err(e) => {
                log::warn!("Rolling back {}", unit.identifier());
                if let Err(rollback_error) = tx.rollback() {
                    log::error!("Rollback of {} failed: {rollback_error}", unit.identifier());
                }
                Err(e)
            }
        }
    }

    fn apply(
        &self,
        tx: &Transaction<'_>,
        unit: &MigrationUnit,
        direction: Direction,
    ) -> Result<(), MigrationError> {
        unit.run(tx, direction)
            .map_err(|source| MigrationError::ExecutionFailed {
                identifier: unit.identifier().display_text(),
                description: unit.description().to_string(),
                source,
            })?;

        match direction {
            Direction::Up => self
                .ledger
                .record(tx, &LedgerEntry::from_unit(unit, Utc::now())),
            Direction::Down => self.ledger.remove(tx, unit.ordering_key()),
        }
    }
}

impl std::fmt::Debug for MigrationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRunner")
            .field("migrations", &self.set.len())
            .field("kind", &self.set.kind())
            .field("hooks", &self.hooks)
            .finish()
    }
}
