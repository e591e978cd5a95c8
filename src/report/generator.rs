//! Markdown and JSON dashboard reports.
//!
//! This module renders a [`DashboardSnapshot`] as a Markdown document or as
//! pretty-printed JSON.

use anyhow::{Context, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use std::path::Path;

use crate::cli::OutputFormat;
use crate::models::{
    Activity, ChartSeries, Currency, DashboardSnapshot, Feed, FinancialSummary, Metric, Trend,
};

/// Render a snapshot in the requested format.
pub fn render(snapshot: &DashboardSnapshot, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(generate_markdown_report(snapshot)),
        OutputFormat::Json => generate_json_report(snapshot),
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(snapshot: &DashboardSnapshot) -> String {
    let mut output = String::new();

    output.push_str("# Financial Dashboard\n\n");

    output.push_str(&generate_metadata_section(snapshot));
    output.push_str(&generate_totals_section(snapshot));
    output.push_str(&generate_trends_section(&snapshot.trends));
    output.push_str(&generate_summary_section(&snapshot.financial_summary));
    output.push_str(&generate_charts_section(&snapshot.charts));
    output.push_str(&generate_activity_section(&snapshot.recent_activities));
    output.push_str(&generate_degraded_section(&snapshot.degraded));

    output.push_str("---\n\n");
    output.push_str(&format!(
        "*Generated by finboard v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    output
}

/// Generate the metadata section.
fn generate_metadata_section(snapshot: &DashboardSnapshot) -> String {
    let period = &snapshot.period;
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        snapshot.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Current Period:** {} to {}\n",
        period.current_start, period.current_end
    ));
    section.push_str(&format!(
        "- **Previous Period:** {} to {}\n",
        period.previous_start, period.previous_end
    ));
    section.push_str(&format!(
        "- **Base Currency:** {}\n",
        snapshot.base_currency
    ));
    section.push_str(&format!(
        "- **Active Students ({}):** {}\n\n",
        period.year, snapshot.active_students
    ));

    section
}

/// Generate the per-currency totals table.
fn generate_totals_section(snapshot: &DashboardSnapshot) -> String {
    let mut section = String::new();

    section.push_str("## Totals\n\n");
    section.push_str("| Currency | Income | Refunds | Expenses | Net Profit |\n");
    section.push_str("|:---|---:|---:|---:|---:|\n");

    for currency in Currency::ALL {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            currency,
            format_amount(snapshot.income.get(currency)),
            format_amount(snapshot.refunds.get(currency)),
            format_amount(snapshot.expenses.get(currency)),
            format_amount(snapshot.profit.get(currency)),
        ));
    }
    section.push('\n');

    section
}

/// Generate the trends table.
fn generate_trends_section(trends: &[Trend]) -> String {
    if trends.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Trends\n\n");
    section.push_str("*Current month compared with the previous month; active students compared with last year. Monthly figures, not the all-time totals above.*\n\n");
    section.push_str("| Metric | Currency | Current | Previous | Change |\n");
    section.push_str("|:---|:---:|---:|---:|:---:|\n");

    for trend in trends {
        let (current, previous) = match trend.metric {
            Metric::ActiveStudents => (trend.current.to_string(), trend.previous.to_string()),
            _ => (format_amount(trend.current), format_amount(trend.previous)),
        };
        let arrow = if trend.indicator.is_negative() {
            "🔻"
        } else {
            "🔺"
        };
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} {} |\n",
            trend.metric,
            trend.currency.map(|c| c.code()).unwrap_or("-"),
            current,
            previous,
            arrow,
            trend.indicator
        ));
    }
    section.push('\n');

    section
}

/// Generate the server-side yearly summary, skipped when it is all zero.
fn generate_summary_section(summary: &FinancialSummary) -> String {
    if *summary == FinancialSummary::default() {
        return String::new();
    }

    let mut section = String::new();

    match summary.year {
        Some(year) => section.push_str(&format!("## Financial Summary ({})\n\n", year)),
        None => section.push_str("## Financial Summary\n\n"),
    }
    section.push_str(&format!(
        "- **Total Income:** {}\n",
        format_amount(summary.total_income)
    ));
    section.push_str(&format!(
        "- **Total Expenses:** {}\n",
        format_amount(summary.total_expenses)
    ));
    section.push_str(&format!(
        "- **Total Refunds:** {}\n",
        format_amount(summary.total_refunds)
    ));
    section.push_str(&format!(
        "- **Net Profit:** {}\n",
        format_amount(summary.net_profit)
    ));
    if summary.pending_payments > 0 {
        section.push_str(&format!(
            "- **Pending Payments:** {}\n",
            summary.pending_payments
        ));
    }
    section.push('\n');

    section
}

/// Generate the chart sections that have data.
fn generate_charts_section(charts: &ChartSeries) -> String {
    let mut section = String::new();

    if !charts.revenue.is_empty() {
        section.push_str("### Revenue by Month\n\n");
        section.push_str("| Month | Currency | Revenue |\n");
        section.push_str("|:---|:---:|---:|\n");
        for point in &charts.revenue {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                point.label,
                point.currency.as_deref().unwrap_or("-"),
                format_amount(point.amount)
            ));
        }
        section.push('\n');
    }

    if !charts.enrollments.is_empty() {
        section.push_str("### Enrollments by Month\n\n");
        section.push_str("| Month | Enrollments |\n");
        section.push_str("|:---|:---:|\n");
        for point in &charts.enrollments {
            section.push_str(&format!("| {} | {} |\n", point.label, point.count));
        }
        section.push('\n');
    }

    if !charts.courses.is_empty() {
        let mut courses: Vec<_> = charts.courses.iter().collect();
        courses.sort_by_key(|c| std::cmp::Reverse(c.count));

        section.push_str("### Students by Course\n\n");
        section.push_str("| Course | Students |\n");
        section.push_str("|:---|:---:|\n");
        for course in courses {
            section.push_str(&format!("| {} | {} |\n", course.name, course.count));
        }
        section.push('\n');
    }

    if !charts.payment_methods.is_empty() {
        section.push_str("### Payment Methods\n\n");
        section.push_str("| Method | Payments | Amount |\n");
        section.push_str("|:---|:---:|---:|\n");
        for method in &charts.payment_methods {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                method.method,
                method.count,
                format_amount(method.amount)
            ));
        }
        section.push('\n');
    }

    if section.is_empty() {
        return section;
    }
    format!("## Charts\n\n{}", section)
}

/// Generate the recent activity list.
fn generate_activity_section(activities: &[Activity]) -> String {
    if activities.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Recent Activity\n\n");
    for activity in activities {
        let mut line = String::from("- ");
        if let Some(ref timestamp) = activity.timestamp {
            line.push_str(&format!("`{}` ", timestamp));
        }
        if let Some(ref kind) = activity.kind {
            line.push_str(&format!("**{}** ", kind));
        }
        line.push_str(&activity.description);
        if let Some(ref actor) = activity.actor {
            line.push_str(&format!(" ({})", actor));
        }
        section.push_str(line.trim_end());
        section.push('\n');
    }
    section.push('\n');

    section
}

/// Note every feed that fell back to a default.
fn generate_degraded_section(degraded: &[Feed]) -> String {
    if degraded.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Unavailable Data\n\n");
    for feed in degraded {
        let note = match feed {
            Feed::PriorPayments | Feed::PriorExpenses => "trends use a zero baseline",
            _ => "section left empty",
        };
        section.push_str(&format!("> ⚠️ The {} feed could not be loaded; {}.\n", feed, note));
    }
    section.push('\n');

    section
}

/// Two decimals with thousands separators, e.g. `1,250,000.00`.
fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}{}.{}", sign, grouped, fraction)
}

/// Generate a JSON report.
pub fn generate_json_report(snapshot: &DashboardSnapshot) -> Result<String> {
    serde_json::to_string_pretty(snapshot).map_err(Into::into)
}

/// Write a rendered report to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
