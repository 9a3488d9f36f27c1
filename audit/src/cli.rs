//! # CLI Interface
//!
//! Defines the command-line argument structure for `caisse-audit` using
//! `clap` derive. Supports two subcommands: `check` and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::logging::LogFormat;

/// Caisse consistency auditor.
///
/// Runs the read-only check battery over an engine state snapshot
/// exported as JSON: ledger balance, session lifecycle, maker-checker
/// separation, denomination arithmetic, account formats.
#[derive(Parser, Debug)]
#[command(
    name = "caisse-audit",
    about = "Consistency auditor for the caisse reconciliation engine",
    version,
    propagate_version = true
)]
pub struct CaisseAuditCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the audit binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full check battery over a snapshot file.
    Check(CheckArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `check` subcommand.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Path to the snapshot JSON file to audit.
    #[arg(env = "CAISSE_SNAPSHOT")]
    pub snapshot: PathBuf,

    /// Reference date for the future-posting check (YYYY-MM-DD).
    ///
    /// Defaults to today. Pin it when re-running historical audits so
    /// results stay reproducible.
    #[arg(long, env = "CAISSE_AS_OF")]
    pub as_of: Option<NaiveDate>,

    /// Output format for the report: "pretty" or "json".
    #[arg(long, env = "CAISSE_REPORT_FORMAT", default_value = "pretty")]
    pub format: String,

    /// Treat warnings as failures for the exit code.
    ///
    /// By default only integrity errors fail the run; uncompensated
    /// variances and other warnings merely get reported.
    #[arg(long)]
    pub strict: bool,

    /// Log level when RUST_LOG is not set.
    #[arg(long, env = "CAISSE_LOG_LEVEL", default_value = "caisse_audit=info,caisse_core=info")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, env = "CAISSE_LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}
