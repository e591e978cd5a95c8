//! Snapshot assembly.
//!
//! One run fans out to every feed. Mandatory feeds (current payments,
//! expenses, enrollments) are joined all-or-fail; prior-period and
//! presentation feeds are joined best-effort, each falling back to its own
//! default.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::aggregation::{
    active_students, active_students_in_year, build_trends, PeriodFilter, PeriodTotals,
    ReportingPeriod, Windowing,
};
use crate::error::{AggregationError, SourceResult};
use crate::models::{
    Activity, ChartSeries, Currency, DashboardSnapshot, Feed, FinancialSummary, PeriodInfo,
};
use crate::source::DataSource;

/// Knobs for one aggregator.
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// Bucket for records with a missing or unknown currency.
    pub base_currency: Currency,
    /// Months of history requested for the chart feeds.
    pub chart_months: u32,
    /// Maximum entries in the activity feed.
    pub activity_limit: usize,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            base_currency: Currency::Iqd,
            chart_months: 6,
            activity_limit: 10,
        }
    }
}

/// Turns raw feeds into a [`DashboardSnapshot`].
pub struct Aggregator {
    source: Arc<dyn DataSource>,
    options: AggregatorOptions,
}

/// Totals derived from the mandatory feeds plus the prior-period baseline.
struct CoreFigures {
    headline: PeriodTotals,
    active_students: usize,
    trends: Vec<crate::models::Trend>,
    degraded: Vec<Feed>,
}

/// Presentation feeds, each already defaulted on failure.
struct Extras {
    charts: ChartSeries,
    financial_summary: FinancialSummary,
    recent_activities: Vec<Activity>,
    degraded: Vec<Feed>,
}

impl Aggregator {
    pub fn new(source: Arc<dyn DataSource>, options: AggregatorOptions) -> Self {
        Self { source, options }
    }

    /// Run one aggregation for `period`.
    ///
    /// Fails only when a mandatory feed fails; no partial snapshot is ever
    /// returned.
    pub async fn compute(
        &self,
        period: &ReportingPeriod,
    ) -> Result<DashboardSnapshot, AggregationError> {
        debug!(
            "Aggregating {} .. {} (prior {} .. {})",
            period.current.start, period.current.end, period.previous.start, period.previous.end
        );

        let (core, extras) = futures::join!(self.core_figures(period), self.extras(period));
        let core = core?;

        let mut degraded = core.degraded;
        degraded.extend(extras.degraded);

        let snapshot = DashboardSnapshot {
            generated_at: Utc::now(),
            period: PeriodInfo::from(period),
            base_currency: self.options.base_currency,
            income: core.headline.income,
            refunds: core.headline.refunds,
            expenses: core.headline.expenses,
            profit: core.headline.profit,
            active_students: core.active_students,
            trends: core.trends,
            charts: extras.charts,
            financial_summary: extras.financial_summary,
            recent_activities: extras.recent_activities,
            degraded,
        };

        info!(
            "Snapshot ready: {} active students, {} trends, {} degraded feeds",
            snapshot.active_students,
            snapshot.trends.len(),
            snapshot.degraded.len()
        );
        Ok(snapshot)
    }

    async fn core_figures(&self, period: &ReportingPeriod) -> Result<CoreFigures, AggregationError> {
        let base = self.options.base_currency;
        let source = self.source.as_ref();

        let (payments, expenses, enrollments) = futures::try_join!(
            required(Feed::Payments, source.fetch_payments(None)),
            required(Feed::Expenses, source.fetch_expenses(None)),
            required(Feed::Enrollments, source.fetch_enrollments()),
        )?;
        debug!(
            "Fetched {} payments, {} expenses, {} enrollments",
            payments.len(),
            expenses.len(),
            enrollments.len()
        );

        let headline = PeriodTotals::compute(&payments, &expenses, Windowing::All, base);
        let active = active_students(&enrollments, period.reference);

        let prior_filter = PeriodFilter::from(&period.previous);
        let (prior_payments, prior_expenses) = futures::join!(
            best_effort(Feed::PriorPayments, source.fetch_payments(Some(prior_filter))),
            best_effort(Feed::PriorExpenses, source.fetch_expenses(Some(prior_filter))),
        );

        let mut degraded = Vec::new();
        let prior_payments = settle(Feed::PriorPayments, prior_payments, &mut degraded);
        let prior_expenses = settle(Feed::PriorExpenses, prior_expenses, &mut degraded);

        let current = PeriodTotals::compute(
            &payments,
            &expenses,
            Windowing::Strict(&period.current),
            base,
        );
        let previous = PeriodTotals::compute(
            &prior_payments,
            &prior_expenses,
            Windowing::Lenient(&period.previous),
            base,
        );
        let active_before = active_students_in_year(&enrollments, period.year() - 1);
        let trends = build_trends(&current, &previous, (active, active_before));

        Ok(CoreFigures {
            headline,
            active_students: active,
            trends,
            degraded,
        })
    }

    async fn extras(&self, period: &ReportingPeriod) -> Extras {
        let source = self.source.as_ref();
        let months = self.options.chart_months;

        let (revenue, enrollments, courses, methods, summary, activities) = futures::join!(
            best_effort(Feed::RevenueChart, source.fetch_revenue_chart(months)),
            best_effort(Feed::EnrollmentChart, source.fetch_enrollment_chart(months)),
            best_effort(Feed::CourseDistribution, source.fetch_course_distribution()),
            best_effort(Feed::PaymentMethods, source.fetch_payment_methods(months)),
            best_effort(
                Feed::FinancialSummary,
                source.fetch_financial_summary(Some(period.year()))
            ),
            best_effort(
                Feed::RecentActivities,
                source.fetch_recent_activities(self.options.activity_limit)
            ),
        );

        let mut degraded = Vec::new();
        let charts = ChartSeries {
            revenue: settle(Feed::RevenueChart, revenue, &mut degraded),
            enrollments: settle(Feed::EnrollmentChart, enrollments, &mut degraded),
            courses: settle(Feed::CourseDistribution, courses, &mut degraded),
            payment_methods: settle(Feed::PaymentMethods, methods, &mut degraded),
        };

        Extras {
            charts,
            financial_summary: settle(Feed::FinancialSummary, summary, &mut degraded),
            recent_activities: settle(Feed::RecentActivities, activities, &mut degraded),
            degraded,
        }
    }
}

/// All-or-fail: tag a mandatory fetch's error with its feed.
async fn required<T, F>(feed: Feed, fetch: F) -> Result<T, AggregationError>
where
    F: Future<Output = SourceResult<T>>,
{
    fetch.await.map_err(|error| {
        warn!("Mandatory {} feed failed: {}", feed, error);
        AggregationError::Mandatory { feed, error }
    })
}

/// Best-effort: log a failure and report it as `None`.
async fn best_effort<T, F>(feed: Feed, fetch: F) -> Option<T>
where
    F: Future<Output = SourceResult<T>>,
{
    match fetch.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Optional {} feed failed, using default: {}", feed, e);
            None
        }
    }
}

/// Default a best-effort result and remember the feed if it failed.
fn settle<T: Default>(feed: Feed, value: Option<T>, degraded: &mut Vec<Feed>) -> T {
    value.unwrap_or_else(|| {
        degraded.push(feed);
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metric, RawRecord, RevenuePoint};
    use crate::source::stub::StubSource;
    use chrono::{DateTime, TimeZone};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    fn records(values: Vec<serde_json::Value>) -> Vec<RawRecord> {
        values.into_iter().map(RawRecord::new).collect()
    }

    fn scenario_source() -> StubSource {
        StubSource {
            payments: Some(records(vec![
                json!({"amount": 100, "currency": "IQD", "status": "completed"}),
                json!({"amount": 40, "currency": "IQD", "status": "refunded"}),
                json!({"amount": 30, "currency": "USD", "status": "completed"}),
            ])),
            expenses: Some(records(vec![json!({"amount": 20, "currency": "IQD"})])),
            enrollments: Some(records(vec![
                json!({"student_id": 1, "status": "accepted", "enrolled_at": "2026-02-01"}),
                json!({"student_id": 1, "status": "accepted", "enrolled_at": "2026-08-01"}),
            ])),
            ..StubSource::healthy()
        }
    }

    async fn run(source: StubSource) -> Result<DashboardSnapshot, AggregationError> {
        let aggregator = Aggregator::new(Arc::new(source), AggregatorOptions::default());
        aggregator.compute(&ReportingPeriod::containing(now())).await
    }

    #[tokio::test]
    async fn test_end_to_end_totals() {
        let snapshot = run(scenario_source()).await.unwrap();

        assert_eq!(snapshot.income.get(Currency::Iqd), dec!(100));
        assert_eq!(snapshot.income.get(Currency::Usd), dec!(30));
        assert_eq!(snapshot.refunds.get(Currency::Iqd), dec!(40));
        assert_eq!(snapshot.refunds.get(Currency::Usd), Decimal::ZERO);
        assert_eq!(snapshot.expenses.get(Currency::Iqd), dec!(20));
        assert_eq!(snapshot.profit.get(Currency::Iqd), dec!(80));
        assert_eq!(snapshot.profit.get(Currency::Usd), dec!(30));
        assert_eq!(snapshot.active_students, 1);
        assert!(snapshot.degraded.is_empty());
    }

    #[tokio::test]
    async fn test_mandatory_failure_fails_the_run() {
        let source = StubSource {
            payments: None,
            ..scenario_source()
        };

        let err = run(source).await.unwrap_err();
        assert_eq!(err.feed(), Feed::Payments);
        assert!(err.to_string().contains("payments"));
    }

    #[tokio::test]
    async fn test_enrollment_failure_fails_the_run() {
        let source = StubSource {
            enrollments: None,
            ..scenario_source()
        };

        assert_eq!(run(source).await.unwrap_err().feed(), Feed::Enrollments);
    }

    #[tokio::test]
    async fn test_optional_chart_failure_degrades_only_its_field() {
        let source = StubSource {
            revenue_chart: None,
            course_distribution: Some(vec![crate::models::CourseShare {
                name: "Web Development".to_string(),
                count: 12,
            }]),
            ..scenario_source()
        };

        let snapshot = run(source).await.unwrap();

        assert!(snapshot.charts.revenue.is_empty());
        assert_eq!(snapshot.charts.courses.len(), 1);
        assert_eq!(snapshot.degraded, vec![Feed::RevenueChart]);
        assert_eq!(snapshot.income.get(Currency::Iqd), dec!(100));
        assert_eq!(snapshot.profit.get(Currency::Usd), dec!(30));
        assert!(!snapshot.trends.is_empty());
    }

    #[tokio::test]
    async fn test_every_optional_feed_failing_still_succeeds() {
        let source = StubSource {
            revenue_chart: None,
            enrollment_chart: None,
            course_distribution: None,
            payment_methods: None,
            financial_summary: None,
            recent_activities: None,
            ..scenario_source()
        };

        let snapshot = run(source).await.unwrap();

        assert_eq!(snapshot.financial_summary, FinancialSummary::default());
        assert!(snapshot.recent_activities.is_empty());
        assert_eq!(snapshot.degraded.len(), 6);
    }

    #[tokio::test]
    async fn test_prior_period_failure_degrades_trends_to_zero_baseline() {
        let source = StubSource {
            payments: Some(records(vec![json!({
                "amount": 500, "currency": "USD", "status": "completed", "payment_date": "2026-10-03"
            })])),
            prior_payments: None,
            prior_expenses: None,
            ..scenario_source()
        };

        let snapshot = run(source).await.unwrap();

        let usd_income = snapshot.trend(Metric::Income, Some(Currency::Usd)).unwrap();
        assert_eq!(usd_income.current, dec!(500));
        assert_eq!(usd_income.previous, Decimal::ZERO);
        assert_eq!(usd_income.indicator.as_str(), "+100%");
        assert!(snapshot.degraded.contains(&Feed::PriorPayments));
        assert!(snapshot.degraded.contains(&Feed::PriorExpenses));
    }

    #[tokio::test]
    async fn test_trends_compare_current_month_with_previous_month() {
        let source = StubSource {
            payments: Some(records(vec![
                json!({"amount": 150, "currency": "USD", "status": "completed", "payment_date": "2026-10-02"}),
                json!({"amount": 999, "currency": "USD", "status": "completed", "payment_date": "2026-07-02"}),
            ])),
            prior_payments: Some(records(vec![
                json!({"amount": 100, "currency": "USD", "status": "completed", "payment_date": "2026-09-12"}),
                json!({"amount": 400, "currency": "USD", "status": "completed", "payment_date": "2026-06-12"}),
            ])),
            ..scenario_source()
        };

        let snapshot = run(source).await.unwrap();

        let trend = snapshot.trend(Metric::Income, Some(Currency::Usd)).unwrap();
        assert_eq!(trend.current, dec!(150));
        assert_eq!(trend.previous, dec!(100));
        assert_eq!(trend.indicator.as_str(), "+50.0%");
        assert_eq!(snapshot.income.get(Currency::Usd), dec!(1149));
    }

    #[tokio::test]
    async fn test_active_student_trend_uses_prior_year() {
        let source = StubSource {
            enrollments: Some(records(vec![
                json!({"student_id": 1, "status": "accepted", "enrolled_at": "2026-02-01"}),
                json!({"student_id": 2, "status": "accepted", "enrolled_at": "2025-02-01"}),
                json!({"student_id": 3, "status": "accepted", "enrolled_at": "2025-03-01"}),
            ])),
            ..scenario_source()
        };

        let snapshot = run(source).await.unwrap();

        let trend = snapshot.trend(Metric::ActiveStudents, None).unwrap();
        assert_eq!(snapshot.active_students, 1);
        assert_eq!(trend.previous, dec!(2));
        assert_eq!(trend.indicator.as_str(), "-50.0%");
    }

    #[tokio::test]
    async fn test_extras_are_passed_through() {
        let source = StubSource {
            revenue_chart: Some(vec![RevenuePoint {
                label: "2026-10".to_string(),
                currency: Some("IQD".to_string()),
                amount: dec!(250000),
            }]),
            ..scenario_source()
        };

        let snapshot = run(source).await.unwrap();
        assert_eq!(snapshot.charts.revenue.len(), 1);
        assert_eq!(snapshot.period.year, 2026);
    }

    #[test]
    fn test_settle_records_degraded_feed() {
        let mut degraded = Vec::new();
        let value: Vec<u32> = settle(Feed::RecentActivities, None, &mut degraded);
        assert!(value.is_empty());
        assert_eq!(settle(Feed::RevenueChart, Some(3u8), &mut degraded), 3);
        assert_eq!(degraded, vec![Feed::RecentActivities]);
    }
}
