//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.finboard.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cli::OutputFormat;
use crate::models::Currency;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".finboard.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Back-office API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Auto refresh settings for watch mode.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Back-office API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token. Prefer the FINBOARD_TOKEN env var over storing it here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Endpoint paths, relative to `base_url`.
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_seconds: default_timeout(),
            endpoints: EndpointConfig::default(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Endpoint paths for each feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_payments_path")]
    pub payments: String,
    #[serde(default = "default_expenses_path")]
    pub expenses: String,
    #[serde(default = "default_enrollments_path")]
    pub enrollments: String,
    #[serde(default = "default_revenue_chart_path")]
    pub revenue_chart: String,
    #[serde(default = "default_enrollment_chart_path")]
    pub enrollment_chart: String,
    #[serde(default = "default_course_distribution_path")]
    pub course_distribution: String,
    #[serde(default = "default_payment_methods_path")]
    pub payment_methods: String,
    #[serde(default = "default_financial_summary_path")]
    pub financial_summary: String,
    #[serde(default = "default_recent_activities_path")]
    pub recent_activities: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            payments: default_payments_path(),
            expenses: default_expenses_path(),
            enrollments: default_enrollments_path(),
            revenue_chart: default_revenue_chart_path(),
            enrollment_chart: default_enrollment_chart_path(),
            course_distribution: default_course_distribution_path(),
            payment_methods: default_payment_methods_path(),
            financial_summary: default_financial_summary_path(),
            recent_activities: default_recent_activities_path(),
        }
    }
}

fn default_payments_path() -> String {
    "/payments".to_string()
}

fn default_expenses_path() -> String {
    "/expenses".to_string()
}

fn default_enrollments_path() -> String {
    "/enrollments".to_string()
}

fn default_revenue_chart_path() -> String {
    "/dashboard/revenue-chart".to_string()
}

fn default_enrollment_chart_path() -> String {
    "/dashboard/enrollment-chart".to_string()
}

fn default_course_distribution_path() -> String {
    "/dashboard/course-distribution".to_string()
}

fn default_payment_methods_path() -> String {
    "/dashboard/payment-methods".to_string()
}

fn default_financial_summary_path() -> String {
    "/dashboard/financial-summary".to_string()
}

fn default_recent_activities_path() -> String {
    "/dashboard/recent-activities".to_string()
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Bucket for records with a missing or unknown currency.
    #[serde(default = "default_base_currency")]
    pub base_currency: Currency,

    /// Months of history requested for the chart feeds.
    #[serde(default = "default_chart_months")]
    pub chart_months: u32,

    /// Maximum entries in the activity feed.
    #[serde(default = "default_activity_limit")]
    pub activity_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
            chart_months: default_chart_months(),
            activity_limit: default_activity_limit(),
        }
    }
}

fn default_base_currency() -> Currency {
    Currency::Iqd
}

fn default_chart_months() -> u32 {
    6
}

fn default_activity_limit() -> usize {
    10
}

/// Auto refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Keep refreshing until interrupted.
    #[serde(default)]
    pub enabled: bool,

    /// Seconds between automatic refreshes.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: default_interval(),
        }
    }
}

fn default_interval() -> u64 {
    300
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Output file; stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Markdown,
            output: None,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_if_present(Path::new(DEFAULT_CONFIG_FILE))
    }

    fn load_if_present(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(ref token) = args.token {
            self.api.token = Some(token.clone());
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }

        if let Some(currency) = args.base_currency {
            self.dashboard.base_currency = currency;
        }
        if let Some(months) = args.chart_months {
            self.dashboard.chart_months = months;
        }
        if let Some(limit) = args.activity_limit {
            self.dashboard.activity_limit = limit;
        }

        // Flags only switch watch mode on
        if args.watch {
            self.refresh.enabled = true;
        }
        if let Some(interval) = args.interval {
            self.refresh.interval_seconds = interval;
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(ref output) = args.output {
            self.report.output = Some(output.display().to_string());
        }
    }

    /// Check values a config file could have broken.
    pub fn validate(&self) -> Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            anyhow::bail!("api.base_url must start with 'http://' or 'https://'");
        }
        if self.api.timeout_seconds == 0 {
            anyhow::bail!("api.timeout_seconds must be at least 1");
        }
        if self.dashboard.chart_months == 0 {
            anyhow::bail!("dashboard.chart_months must be at least 1");
        }
        if self.dashboard.activity_limit == 0 {
            anyhow::bail!("dashboard.activity_limit must be at least 1");
        }
        if self.refresh.interval_seconds == 0 {
            anyhow::bail!("refresh.interval_seconds must be at least 1");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
