//! Callbacks around each migration the runner executes

use super::unit::{Direction, MigrationUnit};
use crate::migration::MigrationError;

type UnitHook = Box<dyn Fn(&MigrationUnit, Direction) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&MigrationUnit, Direction, &MigrationError) + Send + Sync>;

/// Optional callbacks invoked per migration
///
/// `before_migration` runs before the unit's transaction begins, `after_migration` after it
/// commits, and `on_error` after it has been rolled back.
#[derive(Default)]
pub struct MigrationHooks {
    pub before_migration: Option<UnitHook>,
    pub after_migration: Option<UnitHook>,
    pub on_error: Option<ErrorHook>,
}

impl MigrationHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(mut self, hook: impl Fn(&MigrationUnit, Direction) + Send + Sync + 'static) -> Self {
        self.before_migration = Some(Box::new(hook));
        self
    }

    pub fn after(mut self, hook: impl Fn(&MigrationUnit, Direction) + Send + Sync + 'static) -> Self {
        self.after_migration = Some(Box::new(hook));
        self
    }

    pub fn on_error(
        mut self,
        hook: impl Fn(&MigrationUnit, Direction, &MigrationError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    pub(crate) fn fire_before(&self, unit: &MigrationUnit, direction: Direction) {
        if let Some(hook) = &self.before_migration {
            hook(unit, direction);
        }
    }

    pub(crate) fn fire_after(&self, unit: &MigrationUnit, direction: Direction) {
        if let Some(hook) = &self.after_migration {
            hook(unit, direction);
        }
    }

    pub(crate) fn fire_error(&self, unit: &MigrationUnit, direction: Direction, error: &MigrationError) {
        if let Some(hook) = &self.on_error {
            hook(unit, direction, error);
        }
    }
}

impl std::fmt::Debug for MigrationHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationHooks")
            .field("before_migration", &self.before_migration.is_some())
            .field("after_migration", &self.after_migration.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
