//! Data models for the dashboard engine.
//!
//! This module contains the raw record wrapper consumed from the back-office
//! API, the per-currency buckets, and the immutable snapshot produced by one
//! aggregation run.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::aggregation::ReportingPeriod;

/// Currency codes the back office bills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Iraqi dinar
    Iqd,
    /// US dollar
    Usd,
}

impl Currency {
    /// Every known currency, in display order.
    pub const ALL: [Currency; 2] = [Currency::Iqd, Currency::Usd];

    /// Parse a currency code, ignoring case and surrounding whitespace.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "IQD" => Some(Currency::Iqd),
            "USD" => Some(Currency::Usd),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Iqd => "IQD",
            Currency::Usd => "USD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| format!("Unknown currency code: {}", s))
    }
}

/// A payment, expense or enrollment as returned by the upstream API.
///
/// The upstream schema is not uniform, so the record keeps the raw JSON and
/// exposes tolerant accessors. Non-object payloads decode fine and simply
/// have no fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Value);

impl RawRecord {
    #[allow(dead_code)] // Records normally arrive through serde
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Look up a field by name. Dotted names walk into nested objects
    /// (`student.id`). JSON `null` counts as absent.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut current = &self.0;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    /// Non-empty, trimmed string value of a field.
    pub fn text(&self, path: &str) -> Option<&str> {
        self.field(path)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Case-insensitive status comparison.
    pub fn has_status(&self, expected: &str) -> bool {
        self.text("status")
            .map(|status| status.eq_ignore_ascii_case(expected))
            .unwrap_or(false)
    }

    /// Currency of the record, falling back to `base` when the code is
    /// missing or not one of the known currencies.
    pub fn currency(&self, base: Currency) -> Currency {
        self.text("currency")
            .and_then(Currency::from_code)
            .unwrap_or(base)
    }

    /// Monetary amount, coerced to zero when missing, non-numeric or negative.
    pub fn amount(&self) -> Decimal {
        self.field("amount")
            .and_then(parse_amount)
            .filter(|amount| !amount.is_sign_negative())
            .unwrap_or(Decimal::ZERO)
    }
}

impl From<Value> for RawRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn parse_amount(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Running totals keyed by currency. Every known currency starts at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyBucket(BTreeMap<Currency, Decimal>);

impl CurrencyBucket {
    pub fn new() -> Self {
        Self(
            Currency::ALL
                .iter()
                .map(|currency| (*currency, Decimal::ZERO))
                .collect(),
        )
    }

    /// Add `amount` to a currency's total. Returns `false`, leaving the
    /// total untouched, when the sum would overflow.
    pub fn add(&mut self, currency: Currency, amount: Decimal) -> bool {
        let total = self.0.entry(currency).or_insert(Decimal::ZERO);
        match total.checked_add(amount) {
            Some(sum) => {
                *total = sum;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, currency: Currency) -> Decimal {
        self.0.get(&currency).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn currencies(&self) -> impl Iterator<Item = Currency> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Currency, Decimal)> + '_ {
        self.0.iter().map(|(currency, amount)| (*currency, *amount))
    }
}

impl Default for CurrencyBucket {
    fn default() -> Self {
        Self::new()
    }
}

/// Signed percentage change label, e.g. `+12.5%`, `-3.0%`, `+100%` or `0%`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrendIndicator(String);

impl TrendIndicator {
    pub(crate) fn from_label(label: String) -> Self {
        Self(label)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.starts_with('-')
    }
}

impl fmt::Display for TrendIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metric a trend indicator is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Income,
    Refunds,
    Expenses,
    Profit,
    ActiveStudents,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Income => write!(f, "Income"),
            Metric::Refunds => write!(f, "Refunds"),
            Metric::Expenses => write!(f, "Expenses"),
            Metric::Profit => write!(f, "Net Profit"),
            Metric::ActiveStudents => write!(f, "Active Students"),
        }
    }
}

/// One named trend: metric (and currency for monetary metrics) with the
/// values it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub metric: Metric,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    pub current: Decimal,
    pub previous: Decimal,
    pub indicator: TrendIndicator,
}

/// Upstream data feeds, named for logs and for the degraded list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    Payments,
    Expenses,
    Enrollments,
    PriorPayments,
    PriorExpenses,
    RevenueChart,
    EnrollmentChart,
    CourseDistribution,
    PaymentMethods,
    FinancialSummary,
    RecentActivities,
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feed::Payments => "payments",
            Feed::Expenses => "expenses",
            Feed::Enrollments => "enrollments",
            Feed::PriorPayments => "prior-period payments",
            Feed::PriorExpenses => "prior-period expenses",
            Feed::RevenueChart => "revenue chart",
            Feed::EnrollmentChart => "enrollment chart",
            Feed::CourseDistribution => "course distribution",
            Feed::PaymentMethods => "payment methods",
            Feed::FinancialSummary => "financial summary",
            Feed::RecentActivities => "recent activities",
        };
        f.write_str(name)
    }
}

/// Monthly revenue point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenuePoint {
    #[serde(alias = "month", alias = "period")]
    pub label: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, alias = "revenue", alias = "total", alias = "income")]
    pub amount: Decimal,
}

/// Monthly enrollment count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentPoint {
    #[serde(alias = "month", alias = "period")]
    pub label: String,
    #[serde(default, alias = "enrollments", alias = "total")]
    pub count: u64,
}

/// Students per course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseShare {
    #[serde(alias = "course", alias = "course_name")]
    pub name: String,
    #[serde(default, alias = "students", alias = "value")]
    pub count: u64,
}

/// Payments grouped by payment method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethodShare {
    #[serde(alias = "payment_method")]
    pub method: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default, alias = "total")]
    pub amount: Decimal,
}

/// Server-computed yearly summary. Zeroed when the feed is unavailable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, alias = "total_revenue")]
    pub total_income: Decimal,
    #[serde(default)]
    pub total_expenses: Decimal,
    #[serde(default)]
    pub total_refunds: Decimal,
    #[serde(default, alias = "profit")]
    pub net_profit: Decimal,
    #[serde(default)]
    pub pending_payments: u64,
}

/// Entry of the recent-activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: Option<String>,
    #[serde(default, alias = "message", alias = "title")]
    pub description: String,
    #[serde(default, alias = "user", alias = "user_name")]
    pub actor: Option<String>,
    #[serde(default, alias = "created_at", alias = "time")]
    pub timestamp: Option<String>,
}

/// Chart series shown next to the totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub revenue: Vec<RevenuePoint>,
    pub enrollments: Vec<EnrollmentPoint>,
    pub courses: Vec<CourseShare>,
    pub payment_methods: Vec<PaymentMethodShare>,
}

/// Serializable description of the reporting period. Ends are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodInfo {
    pub current_start: NaiveDate,
    pub current_end: NaiveDate,
    pub previous_start: NaiveDate,
    pub previous_end: NaiveDate,
    pub year: i32,
}

impl From<&ReportingPeriod> for PeriodInfo {
    fn from(period: &ReportingPeriod) -> Self {
        Self {
            current_start: period.current.start,
            current_end: period.current.last_day(),
            previous_start: period.previous.start,
            previous_end: period.previous.last_day(),
            year: period.year(),
        }
    }
}

/// The complete result of one aggregation run.
///
/// Built in one go by the aggregator and never mutated afterwards; the next
/// run replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    /// When the snapshot was assembled.
    pub generated_at: DateTime<Utc>,
    /// Windows the trends were computed over.
    pub period: PeriodInfo,
    /// Bucket receiving records with a missing or unknown currency.
    pub base_currency: Currency,
    /// Completed payments.
    pub income: CurrencyBucket,
    /// Refunded payments.
    pub refunds: CurrencyBucket,
    pub expenses: CurrencyBucket,
    /// Income minus expenses, per currency.
    pub profit: CurrencyBucket,
    /// Distinct students with an accepted enrollment this calendar year.
    pub active_students: usize,
    /// Month-over-month money figures plus a year-over-year active-student
    /// count. Money `current` values cover the current month only, so they
    /// differ from the all-time totals above.
    pub trends: Vec<Trend>,
    pub charts: ChartSeries,
    pub financial_summary: FinancialSummary,
    pub recent_activities: Vec<Activity>,
    /// Feeds that failed and were replaced by defaults.
    pub degraded: Vec<Feed>,
}

impl DashboardSnapshot {
    /// Find the trend for a metric, optionally for one currency.
    pub fn trend(&self, metric: Metric, currency: Option<Currency>) -> Option<&Trend> {
        self.trends
            .iter()
            .find(|t| t.metric == metric && t.currency == currency)
    }
}
