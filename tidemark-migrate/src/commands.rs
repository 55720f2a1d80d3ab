//! Command handlers
//!
//! Handlers write to the supplied writer instead of stdout so they can run against any runner,
//! including one over `tidemark::memory::MemoryDatabase`.

use crate::cli::Commands;
use anyhow::{bail, Context};
use colored::Colorize;
use std::io::Write;
use tidemark::migration::{
    Direction, MigrationPlan, MigrationReport, MigrationRunner, Operation, VersionIdentifier,
};

/// Run a status/up/down command against `runner`
pub fn execute(
    runner: &MigrationRunner,
    command: &Commands,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match command {
        Commands::Status { json } => handle_status(runner, *json, out),
        Commands::Up { to, dry_run } => {
            let operation = match parse_bound(to.as_deref())? {
                Some(bound) => Operation::UpTo(bound),
                None => Operation::UpAll,
            };
            handle_batch(runner, operation, *dry_run, out)
        }
        Commands::Down { to, dry_run } => {
            let operation = match parse_bound(to.as_deref())? {
                Some(bound) => Operation::DownTo(bound),
                None => Operation::DownAll,
            };
            handle_batch(runner, operation, *dry_run, out)
        }
        Commands::Generate { .. } => bail!("generate does not need a database connection"),
    }
}

fn parse_bound(text: Option<&str>) -> anyhow::Result<Option<VersionIdentifier>> {
    text.map(|t| {
        t.parse::<VersionIdentifier>()
            .with_context(|| format!("Invalid --to version '{t}'"))
    })
    .transpose()
}

fn handle_status(runner: &MigrationRunner, json: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    let status = runner.status()?;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&status)?)?;
        return Ok(());
    }

    writeln!(out, "\n📊 Migration Status\n")?;

    if status.applied.is_empty() {
        writeln!(out, "✅ Applied Migrations: None")?;
    } else {
        writeln!(out, "✅ Applied Migrations ({}):", status.applied.len())?;
        for entry in &status.applied {
            writeln!(
                out,
                "  ✓ {} {} ({})",
                entry.text.green(),
                entry.description.as_deref().unwrap_or("-"),
                entry.applied_on.format("%Y-%m-%d %H:%M:%S")
            )?;
        }
    }

    writeln!(out)?;

    if status.pending.is_empty() {
        writeln!(out, "⏳ Pending Migrations: None")?;
    } else {
        writeln!(out, "⏳ Pending Migrations ({}):", status.pending.len())?;
        let gaps = status.gaps();
        for pending in &status.pending {
            let note = if gaps.contains(&pending) {
                " (below the highest applied version; only `up --to` applies it)"
            } else {
                ""
            };
            writeln!(
                out,
                "  ⏳ {} {}{}",
                pending.identifier.to_string().yellow(),
                pending.description,
                note
            )?;
        }
    }

    if !status.unknown.is_empty() {
        writeln!(out)?;
        writeln!(
            out,
            "⚠️  Ledger rows without a matching migration ({}):",
            status.unknown.len()
        )?;
        for entry in &status.unknown {
            writeln!(
                out,
                "  ? {} {}",
                entry.text.red(),
                entry.description.as_deref().unwrap_or("-")
            )?;
        }
    }

    writeln!(
        out,
        "\n📈 Summary: {} applied, {} pending",
        status.applied.len(),
        status.pending.len()
    )?;
    Ok(())
}

fn handle_batch(
    runner: &MigrationRunner,
    operation: Operation,
    dry_run: bool,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    if dry_run {
        let plan = runner.plan(operation)?;
        return print_plan(&plan, out);
    }

    match operation.direction() {
        Direction::Up => writeln!(out, "Applying migrations...")?,
        Direction::Down => writeln!(out, "Rolling back migrations...")?,
    }

    let report = match operation {
        Operation::UpAll => runner.up()?,
        Operation::DownAll => runner.down()?,
        Operation::UpTo(bound) => runner.up_to(&bound)?,
        Operation::DownTo(bound) => runner.down_to(&bound)?,
    };
    print_report(&report, out)
}

fn print_plan(plan: &MigrationPlan, out: &mut dyn Write) -> anyhow::Result<()> {
    let verb = match plan.direction {
        Direction::Up => "apply",
        Direction::Down => "roll back",
    };

    if plan.is_empty() {
        writeln!(out, "No migrations to {verb}")?;
        return Ok(());
    }

    writeln!(out, "Would {verb} {} migration(s):", plan.len())?;
    for (i, migration) in plan.migrations.iter().enumerate() {
        writeln!(out, "  {}. {} {}", i + 1, migration.identifier, migration.description)?;
    }
    Ok(())
}

fn print_report(report: &MigrationReport, out: &mut dyn Write) -> anyhow::Result<()> {
    let (verb, past) = match report.direction {
        Direction::Up => ("apply", "applied"),
        Direction::Down => ("roll back", "rolled back"),
    };

    if report.is_empty() {
        writeln!(out, "✅ No migrations to {verb}")?;
        return Ok(());
    }

    writeln!(out, "✅ Successfully {past} {} migration(s)", report.len())?;
    for migration in &report.migrations {
        writeln!(out, "  {} {}", migration.identifier.to_string().green(), migration.description)?;
    }
    Ok(())
}
