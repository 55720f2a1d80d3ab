//! tidemark Migration CLI Tool
//!
//! Runs with an empty registry. Projects with migrations call `tidemark_migrate::run_cli` from
//! their own binary instead.

use std::process::ExitCode;
use tidemark::migration::MigrationRegistry;

fn main() -> ExitCode {
    tidemark_migrate::run_cli(MigrationRegistry::new())
}
