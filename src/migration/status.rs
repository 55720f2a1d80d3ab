//! Migration status: what is applied, what is pending, and what the code no longer knows about

use super::plan::PlannedMigration;
use super::record::LedgerEntry;
use serde::Serialize;

/// Migration status information
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    /// Ledger rows with a matching discovered migration, ascending
    pub applied: Vec<LedgerEntry>,

    /// Discovered migrations with no ledger row, ascending
    ///
    /// Includes gaps below the highest applied key, which only `up_to` applies.
    pub pending: Vec<PlannedMigration>,

    /// Ledger rows no discovered migration matches
    pub unknown: Vec<LedgerEntry>,
}

impl MigrationStatus {
    #[must_use]
    pub fn new(
        applied: Vec<LedgerEntry>,
        pending: Vec<PlannedMigration>,
        unknown: Vec<LedgerEntry>,
    ) -> Self {
        Self {
            applied,
            pending,
            unknown,
        }
    }

    /// Check if every discovered migration is applied
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    /// Highest applied key across all ledger rows
    #[must_use]
    pub fn latest_applied_key(&self) -> Option<i64> {
        self.applied
            .iter()
            .chain(self.unknown.iter())
            .map(|entry| entry.version_id)
            .max()
    }

    /// Next migration `up()` would run, if any sits above the high-water mark
    #[must_use]
    pub fn next_pending(&self) -> Option<&PlannedMigration> {
        let high_water = self.latest_applied_key().unwrap_or(0);
        self.pending
            .iter()
            .find(|m| m.identifier.ordering_key() > high_water)
    }

    /// Pending migrations below the high-water mark that `up()` will skip
    #[must_use]
    pub fn gaps(&self) -> Vec<&PlannedMigration> {
        let high_water = self.latest_applied_key().unwrap_or(0);
        self.pending
            .iter()
            .filter(|m| m.identifier.ordering_key() < high_water)
            .collect()
    }
}
