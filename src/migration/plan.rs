//! Selecting which migrations an operation runs, and in what order
//!
//! | Operation | Candidates | Order |
//! |---|---|---|
//! | `UpAll` | key > highest applied key | ascending |
//! | `DownAll` | key applied | descending |
//! | `UpTo(bound)` | key < bound and not applied | ascending |
//! | `DownTo(bound)` | key > bound and applied | descending |
//!
//! `UpAll` compares against the high-water mark only, so a unit whose key sits below the highest
//! applied key is never picked up by it; `UpTo` uses full membership and fills such gaps.

use super::identifier::VersionIdentifier;
use super::record::LedgerEntry;
use super::registry::MigrationSet;
use super::unit::{Direction, MigrationUnit};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// A batch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    UpAll,
    DownAll,
    /// Apply pending migrations strictly below the bound
    UpTo(VersionIdentifier),
    /// Revert applied migrations strictly above the bound
    DownTo(VersionIdentifier),
}

impl Operation {
    pub fn direction(&self) -> Direction {
        match self {
            Operation::UpAll | Operation::UpTo(_) => Direction::Up,
            Operation::DownAll | Operation::DownTo(_) => Direction::Down,
        }
    }

    pub fn bound(&self) -> Option<&VersionIdentifier> {
        match self {
            Operation::UpTo(bound) | Operation::DownTo(bound) => Some(bound),
            Operation::UpAll | Operation::DownAll => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::UpAll => "up",
            Operation::DownAll => "down",
            Operation::UpTo(_) => "up_to",
            Operation::DownTo(_) => "down_to",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound() {
            Some(bound) => write!(f, "{} {}", self.name(), bound),
            None => f.write_str(self.name()),
        }
    }
}

/// Applied ordering keys as read from the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedSet {
    keys: BTreeSet<i64>,
}

impl AppliedSet {
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        entries.iter().map(|entry| entry.version_id).collect()
    }

    pub fn contains(&self, key: i64) -> bool {
        self.keys.contains(&key)
    }

    /// Highest applied key, 0 when nothing is applied
    pub fn max_key(&self) -> i64 {
        self.keys.iter().next_back().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<i64> for AppliedSet {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

/// Select the units `operation` runs, in execution order
///
/// `max_applied_key` is the ledger's high-water mark, used by `UpAll` only.
pub fn select<'s>(
    set: &'s MigrationSet,
    applied: &AppliedSet,
    max_applied_key: i64,
    operation: &Operation,
) -> Vec<&'s MigrationUnit> {
    let mut selected: Vec<&MigrationUnit> = set
        .units()
        .iter()
        .filter(|unit| {
            let key = unit.ordering_key();
            match operation {
                Operation::UpAll => key > max_applied_key,
                Operation::DownAll => applied.contains(key),
                Operation::UpTo(bound) => key < bound.ordering_key() && !applied.contains(key),
                Operation::DownTo(bound) => key > bound.ordering_key() && applied.contains(key),
            }
        })
        .collect();

    match operation.direction() {
        Direction::Up => selected.sort_by_key(|unit| unit.ordering_key()),
        Direction::Down => selected.sort_by_key(|unit| std::cmp::Reverse(unit.ordering_key())),
    }
    selected
}

/// One selected migration, as shown by a dry run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMigration {
    pub identifier: VersionIdentifier,
    pub description: String,
}

impl From<&MigrationUnit> for PlannedMigration {
    fn from(unit: &MigrationUnit) -> Self {
        Self {
            identifier: *unit.identifier(),
            description: unit.description().to_string(),
        }
    }
}

/// What an operation would run, without running it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    pub direction: Direction,
    pub migrations: Vec<PlannedMigration>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::DbError;
    use crate::migration::{Migration, MigrationModule, MigrationRegistry, SchemaManager, VersionMarker};

    struct V(i32, i32);

    impl Migration for V {
        fn marker(&self) -> VersionMarker {
            VersionMarker::version(self.0, self.1)
        }

        fn up(&self, _manager: &SchemaManager<'_>) -> Result<(), DbError> {
            Ok(())
        }

        fn down(&self, _manager: &SchemaManager<'_>) -> Result<(), DbError> {
            Ok(())
        }
    }

    fn set(versions: &[(i32, i32)]) -> MigrationSet {
        let module = versions
            .iter()
            .fold(MigrationModule::new("plan::tests"), |m, (a, b)| m.with(V(*a, *b)));
        MigrationRegistry::new().module(module).discover().unwrap()
    }

    fn key(major: i32, minor: i32) -> i64 {
        VersionIdentifier::from_semantic_version(major, minor, 0, 0)
            .unwrap()
            .ordering_key()
    }

    fn bound(major: i32, minor: i32) -> VersionIdentifier {
        VersionIdentifier::from_semantic_version(major, minor, 0, 0).unwrap()
    }

    fn texts(units: &[&MigrationUnit]) -> Vec<String> {
        units.iter().map(|u| u.identifier().display_text()).collect()
    }

    #[test]
    fn test_up_all_on_empty_ledger_is_ascending() {
        let set = set(&[(2, 0), (1, 0), (1, 1)]);
        let applied = AppliedSet::default();

        let selected = select(&set, &applied, applied.max_key(), &Operation::UpAll);
        assert_eq!(texts(&selected), vec!["1.0.0.0", "1.1.0.0", "2.0.0.0"]);
    }

    #[test]
    fn test_up_all_skips_gaps_below_high_water_mark() {
        let set = set(&[(1, 0), (1, 1), (2, 0), (3, 0)]);
        let applied: AppliedSet = [key(1, 0), key(2, 0)].into_iter().collect();

        let selected = select(&set, &applied, applied.max_key(), &Operation::UpAll);
        assert_eq!(texts(&selected), vec!["3.0.0.0"]);
    }

    #[test]
    fn test_up_to_fills_gaps_and_excludes_bound() {
        let set = set(&[(1, 0), (1, 1), (2, 0), (3, 0)]);
        let applied: AppliedSet = [key(1, 0), key(2, 0)].into_iter().collect();

        let selected = select(&set, &applied, applied.max_key(), &Operation::UpTo(bound(3, 0)));
        assert_eq!(texts(&selected), vec!["1.1.0.0"]);
    }

    #[test]
    fn test_down_all_is_descending_over_applied() {
        let set = set(&[(1, 0), (1, 1), (2, 0)]);
        let applied: AppliedSet = [key(1, 0), key(2, 0)].into_iter().collect();

        let selected = select(&set, &applied, applied.max_key(), &Operation::DownAll);
        assert_eq!(texts(&selected), vec!["2.0.0.0", "1.0.0.0"]);
    }

    #[test]
    fn test_down_to_excludes_bound() {
        let set = set(&[(1, 0), (1, 1), (2, 0)]);
        let applied: AppliedSet = [key(1, 0), key(1, 1), key(2, 0)].into_iter().collect();

        let selected = select(&set, &applied, applied.max_key(), &Operation::DownTo(bound(1, 0)));
        assert_eq!(texts(&selected), vec!["2.0.0.0", "1.1.0.0"]);
    }

    #[test]
    fn test_bound_need_not_be_a_known_migration() {
        let set = set(&[(1, 0), (1, 1), (2, 0)]);
        let applied = AppliedSet::default();

        let selected = select(&set, &applied, 0, &Operation::UpTo(bound(1, 5)));
        assert_eq!(texts(&selected), vec!["1.0.0.0", "1.1.0.0"]);
    }

    #[test]
    fn test_empty_selection() {
        let set = set(&[(1, 0)]);
        let applied: AppliedSet = [key(1, 0)].into_iter().collect();

        assert!(select(&set, &applied, applied.max_key(), &Operation::UpAll).is_empty());
        assert!(select(&MigrationSet::empty(), &applied, 0, &Operation::DownAll).is_empty());
    }

    #[test]
    fn test_applied_set_max_key() {
        assert_eq!(AppliedSet::default().max_key(), 0);
        let applied: AppliedSet = [5, 50, 7].into_iter().collect();
        assert_eq!(applied.max_key(), 50);
        assert_eq!(applied.len(), 3);
    }

    #[test]
    fn test_operation_direction_and_display() {
        assert_eq!(Operation::UpAll.direction(), Direction::Up);
        assert_eq!(Operation::DownTo(bound(1, 0)).direction(), Direction::Down);
        assert_eq!(Operation::UpTo(bound(2, 0)).to_string(), "up_to 2.0.0.0");
        assert_eq!(Operation::DownAll.to_string(), "down");
    }
}
