//! # Caisse Auditor
//!
//! Entry point for the `caisse-audit` binary. Parses CLI arguments,
//! initializes logging, loads a snapshot file, runs the check battery,
//! and prints the report.
//!
//! The binary supports two subcommands:
//!
//! - `check`   — audit a snapshot JSON file
//! - `version` — print build version information
//!
//! Exit codes: 0 when the audit is clean, 1 when findings remain (with
//! `--strict`, warnings count), 2 on operational failure such as an
//! unreadable or malformed snapshot file.

mod cli;
mod logging;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use caisse_core::audit::{Auditor, CheckStatus, Report, Snapshot};

use cli::{CaisseAuditCli, CheckArgs, Commands};

fn main() -> ExitCode {
    let cli = CaisseAuditCli::parse();

    match cli.command {
        Commands::Check(args) => match run_check(&args) {
            Ok(exit) => exit,
            Err(err) => {
                eprintln!("caisse-audit: {:#}", err);
                ExitCode::from(2)
            }
        },
        Commands::Version => {
            print_version();
            ExitCode::SUCCESS
        }
    }
}

/// Loads the snapshot, runs the battery, renders the report, and maps
/// the outcome to an exit code.
fn run_check(args: &CheckArgs) -> Result<ExitCode> {
    logging::init_logging(&args.log_level, args.log_format);

    let snapshot = load_snapshot(&args.snapshot)?;
    tracing::info!(
        entries = snapshot.entries.len(),
        sessions = snapshot.sessions.len(),
        movements = snapshot.movements.len(),
        counts = snapshot.counts.len(),
        "snapshot loaded"
    );

    let as_of = args.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let report = Auditor::with_reference_date(as_of).run_all(&snapshot);

    match args.format.to_lowercase().as_str() {
        "json" => {
            let rendered =
                serde_json::to_string_pretty(&report).context("failed to serialize report")?;
            println!("{}", rendered);
        }
        _ => print_pretty(&report),
    }

    let failed = report.summary.failed > 0 || (args.strict && report.summary.warnings > 0);
    if failed {
        tracing::warn!(
            failed = report.summary.failed,
            warnings = report.summary.warnings,
            "audit finished with findings"
        );
        Ok(ExitCode::FAILURE)
    } else {
        tracing::info!(passed = report.summary.passed, "audit clean");
        Ok(ExitCode::SUCCESS)
    }
}

/// Reads and deserializes a snapshot JSON file.
fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse snapshot file: {}", path.display()))
}

/// Renders the report for humans: one line per check, then the roll-up.
fn print_pretty(report: &Report) {
    for check in &report.checks {
        let tag = match check.status {
            CheckStatus::Success => "PASS",
            CheckStatus::Warning => "WARN",
            CheckStatus::Error => "FAIL",
        };
        println!("  [{}] {:<22} {}", tag, check.name, check.message);
        if check.status != CheckStatus::Success {
            if let Some(detail) = &check.detail {
                println!("         {}", detail);
            }
        }
    }
    println!(
        "\n{} checks: {} passed, {} failed, {} warnings",
        report.summary.total,
        report.summary.passed,
        report.summary.failed,
        report.summary.warnings
    );
}

/// Prints version information.
fn print_version() {
    println!("caisse-audit {}", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use caisse_core::audit::Snapshot as CoreSnapshot;
    use std::io::Write;

    fn empty_snapshot_json() -> String {
        let snap = CoreSnapshot {
            taken_at: Utc::now(),
            entries: vec![],
            sessions: vec![],
            movements: vec![],
            counts: vec![],
        };
        serde_json::to_string(&snap).unwrap()
    }

    #[test]
    fn snapshot_round_trips_through_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(empty_snapshot_json().as_bytes()).unwrap();

        let snap = load_snapshot(file.path()).unwrap();
        assert!(snap.entries.is_empty());
        assert!(snap.sessions.is_empty());

        let report = Auditor::new().run_all(&snap);
        assert!(report.is_clean());
    }

    #[test]
    fn malformed_snapshot_is_an_operational_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"taken_at\": \"not a timestamp\"").unwrap();

        let err = load_snapshot(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn missing_snapshot_is_an_operational_error() {
        let err = load_snapshot(Path::new("/nonexistent/snapshot.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
