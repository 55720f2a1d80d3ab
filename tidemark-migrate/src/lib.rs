//! tidemark Migration CLI
//!
//! Migrations are Rust types, so the CLI is a library: a project builds its
//! [`MigrationRegistry`] and hands it to [`run_cli`] from its own `main`:
//!
//! ```rust,no_run
//! use std::process::ExitCode;
//! use tidemark::migration::MigrationRegistry;
//!
//! fn main() -> ExitCode {
//!     let registry = MigrationRegistry::new(); // .module(app::migrations::module())
//!     tidemark_migrate::run_cli(registry)
//! }
//! ```
//!
//! The bundled `tidemark-migrate` binary runs with an empty registry; it is useful for
//! `generate` and for inspecting a ledger with `status`.

pub mod cli;
pub mod commands;
pub mod generate;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use std::io::{self, Write};
use std::process::ExitCode;
use tidemark::connection::redact_connection_string;
use tidemark::migration::{MigrationRegistry, MigrationRunner};

pub use cli::{Cli, Commands};

/// Parse the process arguments, run the command and report the outcome
pub fn run_cli(registry: MigrationRegistry) -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    cli.init_logging();
    let quiet = cli.quiet;

    let result = {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        run(cli, registry, &mut out)
    };

    if report(&result, quiet) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Print the success banner or the error chain; `true` on success
pub fn report(result: &anyhow::Result<()>, quiet: bool) -> bool {
    match result {
        Ok(()) => {
            if !quiet {
                println!("{}", "✅ Success".green());
            }
            true
        }
        Err(e) => {
            eprintln!("{} {e:#}", "❌ Error:".red());
            false
        }
    }
}

/// Run parsed arguments against a registry
pub fn run(cli: Cli, registry: MigrationRegistry, out: &mut dyn Write) -> anyhow::Result<()> {
    if let Commands::Generate { name, dir, version } = &cli.command {
        let now = Utc::now();
        let marker = generate::GeneratedMarker::from_args(version.as_deref(), now)?;
        let path = generate::generate_migration(dir, name, &marker, now)?;
        writeln!(out, "✅ Generated migration: {}", path.display())?;
        writeln!(out, "   Implement up() and down(), then add it to a MigrationModule")?;
        return Ok(());
    }

    let set = registry
        .discover()
        .context("Migration discovery failed")?;
    let config = cli.resolve_config()?;
    log::info!("Using database {}", redact_connection_string(&config.url));

    let runner = MigrationRunner::connect(&config, set)?;
    let result = commands::execute(&runner, &cli.command, out);
    runner.close();
    result
}
