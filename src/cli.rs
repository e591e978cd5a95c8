//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Values left unset fall back to the config file.

use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::Currency;

/// finboard - financial dashboard for the training-institute back office
///
/// Pulls payments, expenses and enrollments from the back-office API and
/// prints per-currency totals, period-over-period trends and chart feeds.
///
/// Examples:
///   finboard --api-url https://office.example/api --token $TOKEN
///   finboard --fixture fixtures/dashboard.json --as-of 2026-10-18
///   finboard --format json --output dashboard.json
///   finboard --watch --interval 60
///   finboard --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Back-office API base URL
    #[arg(long, value_name = "URL", env = "FINBOARD_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token for the back-office API
    #[arg(long, value_name = "TOKEN", env = "FINBOARD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Serve every feed from a JSON fixture instead of the API
    ///
    /// Feeds missing from the fixture behave like failing endpoints.
    #[arg(long, value_name = "FILE")]
    pub fixture: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .finboard.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Output file path for the report (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Keep running and refresh the dashboard periodically
    #[arg(short, long)]
    pub watch: bool,

    /// Seconds between refreshes in watch mode
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Currency for records with a missing or unknown currency (IQD, USD)
    #[arg(long, value_name = "CODE")]
    pub base_currency: Option<Currency>,

    /// Months of history for the chart feeds
    #[arg(long, value_name = "N")]
    pub chart_months: Option<u32>,

    /// Maximum entries in the recent-activity feed
    #[arg(long, value_name = "N")]
    pub activity_limit: Option<usize>,

    /// Aggregate as if today were this date (YYYY-MM-DD)
    ///
    /// Useful with fixtures, whose data does not move with the calendar.
    #[arg(long, value_name = "DATE")]
    pub as_of: Option<NaiveDate>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .finboard.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.interval == Some(0) {
            return Err("Interval must be at least 1 second".to_string());
        }
        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }
        if self.chart_months == Some(0) {
            return Err("Chart months must be at least 1".to_string());
        }
        if self.activity_limit == Some(0) {
            return Err("Activity limit must be at least 1".to_string());
        }

        if let Some(ref fixture) = self.fixture {
            if !fixture.is_file() {
                return Err(format!("Fixture file does not exist: {}", fixture.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            api_url: Some("https://office.example/api".to_string()),
            token: None,
            fixture: None,
            config: None,
            format: None,
            output: None,
            watch: false,
            interval: None,
            timeout: None,
            base_currency: None,
            chart_months: None,
            activity_limit: None,
            as_of: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "finboard",
            "--base-currency",
            "usd",
            "--format",
            "json",
            "--as-of",
            "2026-10-18",
            "--watch",
            "--interval",
            "60",
        ])
        .unwrap();

        assert_eq!(args.base_currency, Some(Currency::Usd));
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(args.as_of, NaiveDate::from_ymd_opt(2026, 10, 18));
        assert!(args.watch);
        assert_eq!(args.interval, Some(60));
    }

    #[test]
    fn test_rejects_unknown_currency() {
        assert!(Args::try_parse_from(["finboard", "--base-currency", "EUR"]).is_err());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.api_url = Some("office.example".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_values() {
        let mut args = make_args();
        args.interval = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.activity_limit = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_fixture() {
        let mut args = make_args();
        args.fixture = Some(PathBuf::from("/nonexistent/dashboard.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args();
        args.api_url = Some("nope".to_string());
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
