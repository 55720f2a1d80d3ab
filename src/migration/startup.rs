//! In-process migration execution helpers

use crate::config::MigratorConfig;
use crate::connection::redact_connection_string;
use crate::migration::{MigrationError, MigrationRegistry, MigrationReport, MigrationRunner};

/// Run migrations on application startup
///
/// Discovers the registry, connects with `config`, applies every pending migration above the
/// highest applied key and closes the connection. Fail-fast: if anything fails the application
/// should not start.
///
/// Runners are not coordinated across processes. Deployments that start several instances at once
/// must make sure only one of them calls this.
///
/// # Example
///
/// ```rust,no_run
/// use tidemark::config::MigratorConfig;
/// use tidemark::migration::{startup_migrations, MigrationRegistry};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = MigratorConfig::load()?;
///     startup_migrations(&config, MigrationRegistry::new())?;
///
///     // Continue with application startup...
///     Ok(())
/// }
/// ```
pub fn startup_migrations(
    config: &MigratorConfig,
    registry: MigrationRegistry,
) -> Result<MigrationReport, MigrationError> {
    let set = registry.discover()?;
    log::info!(
        "Running startup migrations against {} ({} known)",
        redact_connection_string(&config.url),
        set.len()
    );

    let runner = MigrationRunner::connect(config, set)?;
    let report = runner.up()?;
    runner.close();

    if report.is_empty() {
        log::info!("Database is up to date");
    } else {
        log::info!("Applied {} migration(s) on startup", report.len());
    }
    Ok(report)
}
