//! # Logging Setup
//!
//! One [`tracing_subscriber::fmt`] subscriber, filtered through
//! `RUST_LOG` when set. Everything goes to stderr; stdout carries only
//! the audit report so it can be piped into other tooling.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Log output format. Parsed straight off the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable output for running audits by hand.
    Pretty,
    /// JSON lines for scheduled audit jobs.
    Json,
}

/// Installs the global subscriber. Call once, before any audit work;
/// a second call panics.
///
/// `default_level` applies when `RUST_LOG` is unset, using
/// `EnvFilter` directive syntax, e.g. `caisse_audit=debug,caisse_core=info`.
pub fn init_logging(default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_values_parse_case_insensitively() {
        assert_eq!(LogFormat::from_str("json", true), Ok(LogFormat::Json));
        assert_eq!(LogFormat::from_str("PRETTY", true), Ok(LogFormat::Pretty));
        assert!(LogFormat::from_str("syslog", true).is_err());
    }
}
