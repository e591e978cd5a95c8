//! JSON fixture source for offline runs and demos.
//!
//! The fixture is one document with a key per feed. A key that is absent
//! behaves like a failing upstream, which makes partial-failure handling
//! easy to try out.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

use super::{decode_list, decode_object, DataSource};
use crate::aggregation::PeriodFilter;
use crate::error::{SourceError, SourceResult};
use crate::models::{
    Activity, CourseShare, EnrollmentPoint, FinancialSummary, PaymentMethodShare, RawRecord,
    RevenuePoint,
};

/// Serves every feed from an in-memory JSON document.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    feeds: Map<String, Value>,
}

impl FixtureSource {
    /// Load a fixture file.
    pub fn load(path: &Path) -> SourceResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let source = Self::from_json(&content, &path.display().to_string())?;
        info!(
            "Loaded fixture {} with {} feeds",
            path.display(),
            source.feeds.len()
        );
        Ok(source)
    }

    /// Parse a fixture document.
    pub fn from_json(content: &str, origin: &str) -> SourceResult<Self> {
        let value: Value = serde_json::from_str(content).map_err(|source| SourceError::Decode {
            endpoint: origin.to_string(),
            source,
        })?;
        match value {
            Value::Object(feeds) => Ok(Self { feeds }),
            _ => Err(SourceError::Missing(format!(
                "{} (fixture root must be an object)",
                origin
            ))),
        }
    }

    fn feed(&self, key: &str) -> SourceResult<Value> {
        self.feeds
            .get(key)
            .cloned()
            .ok_or_else(|| SourceError::Missing(key.to_string()))
    }

    fn list<T: serde::de::DeserializeOwned>(&self, key: &str) -> SourceResult<Vec<T>> {
        decode_list(key, self.feed(key)?)
    }

    /// Prior-period feed, falling back to the unscoped feed when the fixture
    /// has no dedicated key. The aggregator re-checks dates client-side.
    fn scoped(
        &self,
        key: &str,
        prior_key: &str,
        period: Option<PeriodFilter>,
    ) -> SourceResult<Vec<RawRecord>> {
        match period {
            Some(_) if self.feeds.contains_key(prior_key) => self.list(prior_key),
            _ => self.list(key),
        }
    }
}

#[async_trait]
impl DataSource for FixtureSource {
    async fn fetch_payments(&self, period: Option<PeriodFilter>) -> SourceResult<Vec<RawRecord>> {
        self.scoped("payments", "prior_payments", period)
    }

    async fn fetch_expenses(&self, period: Option<PeriodFilter>) -> SourceResult<Vec<RawRecord>> {
        self.scoped("expenses", "prior_expenses", period)
    }

    async fn fetch_enrollments(&self) -> SourceResult<Vec<RawRecord>> {
        self.list("enrollments")
    }

    async fn fetch_revenue_chart(&self, months: u32) -> SourceResult<Vec<RevenuePoint>> {
        let points: Vec<RevenuePoint> = self.list("revenue_chart")?;
        Ok(last_n(points, months as usize))
    }

    async fn fetch_enrollment_chart(&self, months: u32) -> SourceResult<Vec<EnrollmentPoint>> {
        let points: Vec<EnrollmentPoint> = self.list("enrollment_chart")?;
        Ok(last_n(points, months as usize))
    }

    async fn fetch_course_distribution(&self) -> SourceResult<Vec<CourseShare>> {
        self.list("course_distribution")
    }

    async fn fetch_payment_methods(&self, _months: u32) -> SourceResult<Vec<PaymentMethodShare>> {
        self.list("payment_methods")
    }

    async fn fetch_financial_summary(&self, year: Option<i32>) -> SourceResult<FinancialSummary> {
        let mut summary: FinancialSummary =
            decode_object("financial_summary", self.feed("financial_summary")?)?;
        if summary.year.is_none() {
            summary.year = year;
        }
        Ok(summary)
    }

    async fn fetch_recent_activities(&self, limit: usize) -> SourceResult<Vec<Activity>> {
        let mut activities: Vec<Activity> = self.list("recent_activities")?;
        activities.truncate(limit);
        Ok(activities)
    }
}

/// Keep the trailing `n` points of a chronological series.
fn last_n<T>(mut points: Vec<T>, n: usize) -> Vec<T> {
    if points.len() > n {
        points.drain(..points.len() - n);
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FIXTURE: &str = include_str!("../../fixtures/dashboard.json");

    #[tokio::test]
    async fn test_bundled_fixture_serves_every_feed() {
        let source = FixtureSource::from_json(FIXTURE, "dashboard.json").unwrap();

        assert!(!source.fetch_payments(None).await.unwrap().is_empty());
        assert!(!source.fetch_expenses(None).await.unwrap().is_empty());
        assert!(!source.fetch_enrollments().await.unwrap().is_empty());
        assert!(!source.fetch_revenue_chart(12).await.unwrap().is_empty());
        assert!(!source.fetch_course_distribution().await.unwrap().is_empty());
        assert_eq!(source.fetch_recent_activities(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_feed_is_an_error() {
        let source = FixtureSource::from_json(r#"{"payments": []}"#, "inline").unwrap();

        assert!(source.fetch_payments(None).await.unwrap().is_empty());
        let err = source.fetch_enrollments().await.unwrap_err();
        assert!(matches!(err, SourceError::Missing(ref key) if key == "enrollments"));
    }

    #[tokio::test]
    async fn test_prior_period_key_preferred() {
        let source = FixtureSource::from_json(
            r#"{"payments": [{"amount": 1}], "prior_payments": [{"amount": 2}, {"amount": 3}]}"#,
            "inline",
        )
        .unwrap();
        let filter = PeriodFilter::from(&crate::aggregation::period::PeriodWindow::month_of(
            chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
        ));

        assert_eq!(source.fetch_payments(None).await.unwrap().len(), 1);
        assert_eq!(source.fetch_payments(Some(filter)).await.unwrap().len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"enrollments": [{{"student_id": 1}}]}}"#).unwrap();

        let source = FixtureSource::load(file.path()).unwrap();
        let enrollments = tokio_test::block_on(source.fetch_enrollments()).unwrap();
        assert_eq!(enrollments.len(), 1);
    }

    #[test]
    fn test_rejects_non_object_root() {
        assert!(FixtureSource::from_json("[1, 2, 3]", "inline").is_err());
        assert!(FixtureSource::from_json("{not json", "inline").is_err());
    }

    #[test]
    fn test_last_n() {
        assert_eq!(last_n(vec![1, 2, 3, 4], 2), vec![3, 4]);
        assert_eq!(last_n(vec![1], 6), vec![1]);
    }
}
