//! Command-line arguments

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tidemark::config::MigratorConfig;

/// Environment variables checked for the database URL, in order
pub const DATABASE_URL_VARS: [&str; 2] = ["TIDEMARK_DATABASE_URL", "DATABASE_URL"];

#[derive(Debug, Parser)]
#[command(name = "tidemark-migrate")]
#[command(about = "Migration management tool for tidemark")]
#[command(version)]
pub struct Cli {
    /// Database connection URL
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Configuration file (defaults to config/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Version ledger table
    #[arg(long, global = true)]
    pub ledger_table: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Show migration status (applied, pending, unknown)
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply pending migrations
    Up {
        /// Apply only migrations strictly below this version
        #[arg(long)]
        to: Option<String>,

        /// Dry run - show what would be executed without running
        #[arg(long)]
        dry_run: bool,
    },

    /// Revert applied migrations
    Down {
        /// Revert only migrations strictly above this version (default: all)
        #[arg(long)]
        to: Option<String>,

        /// Dry run - show what would be reverted
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate a new migration file
    Generate {
        /// Migration name (e.g., "create_users_table")
        name: String,

        /// Directory to write the migration to
        #[arg(long, default_value = "src/migrations")]
        dir: PathBuf,

        /// Use a semantic version marker (e.g. "1.2") instead of the current timestamp
        #[arg(long)]
        version: Option<String>,
    },
}

impl Cli {
    /// Initialize `env_logger`; `RUST_LOG` still wins over the flags
    pub fn init_logging(&self) {
        let level = if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        };
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
            .try_init();
    }

    /// Resolve the runner configuration
    ///
    /// The URL comes from `--database-url`, then `TIDEMARK_DATABASE_URL`, then `DATABASE_URL`,
    /// then the configuration file.
    pub fn resolve_config(&self) -> anyhow::Result<MigratorConfig> {
        self.resolve_config_with(|name| std::env::var(name).ok())
    }

    pub(crate) fn resolve_config_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<MigratorConfig> {
        let mut config = match &self.config {
            Some(path) => MigratorConfig::load_from(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => MigratorConfig::load().context("Failed to load configuration")?,
        };

        if let Some(url) = self
            .database_url
            .clone()
            .or_else(|| DATABASE_URL_VARS.iter().find_map(|name| env(name)))
        {
            config.url = url;
        }
        if let Some(table) = &self.ledger_table {
            config.ledger_table = table.clone();
        }
        Ok(config)
    }
}
