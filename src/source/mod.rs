//! Record-fetching collaborators.
//!
//! The aggregator only sees the [`DataSource`] trait. `http` talks to the
//! back-office REST API, `fixture` serves a JSON file for offline runs.

pub mod fixture;
pub mod http;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::aggregation::PeriodFilter;
use crate::error::{SourceError, SourceResult};
use crate::models::{
    Activity, CourseShare, EnrollmentPoint, FinancialSummary, PaymentMethodShare, RawRecord,
    RevenuePoint,
};

pub use fixture::FixtureSource;
pub use http::HttpSource;

/// Every feed the dashboard reads.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Payments, optionally scoped server-side to a period.
    async fn fetch_payments(&self, period: Option<PeriodFilter>) -> SourceResult<Vec<RawRecord>>;

    /// Expenses, optionally scoped server-side to a period.
    async fn fetch_expenses(&self, period: Option<PeriodFilter>) -> SourceResult<Vec<RawRecord>>;

    /// Every enrollment; the upstream cannot filter by year.
    async fn fetch_enrollments(&self) -> SourceResult<Vec<RawRecord>>;

    async fn fetch_revenue_chart(&self, months: u32) -> SourceResult<Vec<RevenuePoint>>;

    async fn fetch_enrollment_chart(&self, months: u32) -> SourceResult<Vec<EnrollmentPoint>>;

    async fn fetch_course_distribution(&self) -> SourceResult<Vec<CourseShare>>;

    async fn fetch_payment_methods(&self, months: u32) -> SourceResult<Vec<PaymentMethodShare>>;

    async fn fetch_financial_summary(&self, year: Option<i32>) -> SourceResult<FinancialSummary>;

    async fn fetch_recent_activities(&self, limit: usize) -> SourceResult<Vec<Activity>>;
}

/// Envelope keys the back office wraps payloads in.
const ENVELOPE_KEYS: [&str; 4] = ["data", "items", "results", "records"];

/// Strip response envelopes until a list is reached.
///
/// Accepts `[...]`, `{"data": [...]}`, `{"data": {"data": [...]}}` (paginated)
/// and the other keys in [`ENVELOPE_KEYS`]. Anything else is returned as is.
pub(crate) fn unwrap_list(value: Value) -> Value {
    let mut current = value;
    loop {
        let next = match &current {
            Value::Object(map) => ENVELOPE_KEYS
                .iter()
                .find_map(|key| map.get(*key).filter(|v| v.is_array() || v.is_object())),
            _ => None,
        };
        match next {
            Some(inner) => current = inner.clone(),
            None => return current,
        }
    }
}

/// Strip a `{"data": {...}}` envelope around a single object.
pub(crate) fn unwrap_object(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.get("data").map_or(false, Value::is_object) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Decode a list payload, tolerating envelopes.
pub(crate) fn decode_list<T: DeserializeOwned>(endpoint: &str, value: Value) -> SourceResult<Vec<T>> {
    match unwrap_list(value) {
        Value::Null => Ok(Vec::new()),
        list => serde_json::from_value(list).map_err(|source| SourceError::Decode {
            endpoint: endpoint.to_string(),
            source,
        }),
    }
}

/// Decode a single-object payload, tolerating a `data` envelope.
pub(crate) fn decode_object<T: DeserializeOwned>(endpoint: &str, value: Value) -> SourceResult<T> {
    serde_json::from_value(unwrap_object(value)).map_err(|source| SourceError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod stub {
    //! In-memory source with per-feed failure switches.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    pub struct StubSource {
        pub payments: Option<Vec<RawRecord>>,
        pub expenses: Option<Vec<RawRecord>>,
        pub enrollments: Option<Vec<RawRecord>>,
        pub prior_payments: Option<Vec<RawRecord>>,
        pub prior_expenses: Option<Vec<RawRecord>>,
        pub revenue_chart: Option<Vec<RevenuePoint>>,
        pub enrollment_chart: Option<Vec<EnrollmentPoint>>,
        pub course_distribution: Option<Vec<CourseShare>>,
        pub payment_methods: Option<Vec<PaymentMethodShare>>,
        pub financial_summary: Option<FinancialSummary>,
        pub recent_activities: Option<Vec<Activity>>,
        pub calls: AtomicUsize,
        /// While set, the unfiltered payments fetch fails.
        pub fail_payments: AtomicBool,
        /// Delays applied to successive unfiltered payments fetches.
        pub payment_delays: Mutex<VecDeque<Duration>>,
    }

    impl StubSource {
        /// Every feed answers, with empty data.
        pub fn healthy() -> Self {
            Self {
                payments: Some(Vec::new()),
                expenses: Some(Vec::new()),
                enrollments: Some(Vec::new()),
                prior_payments: Some(Vec::new()),
                prior_expenses: Some(Vec::new()),
                revenue_chart: Some(Vec::new()),
                enrollment_chart: Some(Vec::new()),
                course_distribution: Some(Vec::new()),
                payment_methods: Some(Vec::new()),
                financial_summary: Some(FinancialSummary::default()),
                recent_activities: Some(Vec::new()),
                ..Self::default()
            }
        }

        fn next_delay(&self) -> Option<Duration> {
            self.payment_delays
                .lock()
                .ok()
                .and_then(|mut delays| delays.pop_front())
        }

        fn serve<T: Clone>(&self, name: &str, feed: &Option<T>) -> SourceResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            feed.clone()
                .ok_or_else(|| SourceError::Missing(name.to_string()))
        }
    }

    #[async_trait]
    impl DataSource for StubSource {
        async fn fetch_payments(&self, period: Option<PeriodFilter>) -> SourceResult<Vec<RawRecord>> {
            match period {
                None => {
                    if let Some(delay) = self.next_delay() {
                        tokio::time::sleep(delay).await;
                    }
                    if self.fail_payments.load(Ordering::SeqCst) {
                        return Err(SourceError::Missing("payments".to_string()));
                    }
                    self.serve("payments", &self.payments)
                }
                Some(_) => self.serve("prior_payments", &self.prior_payments),
            }
        }

        async fn fetch_expenses(&self, period: Option<PeriodFilter>) -> SourceResult<Vec<RawRecord>> {
            match period {
                None => self.serve("expenses", &self.expenses),
                Some(_) => self.serve("prior_expenses", &self.prior_expenses),
            }
        }

        async fn fetch_enrollments(&self) -> SourceResult<Vec<RawRecord>> {
            self.serve("enrollments", &self.enrollments)
        }

        async fn fetch_revenue_chart(&self, _months: u32) -> SourceResult<Vec<RevenuePoint>> {
            self.serve("revenue_chart", &self.revenue_chart)
        }

        async fn fetch_enrollment_chart(&self, _months: u32) -> SourceResult<Vec<EnrollmentPoint>> {
            self.serve("enrollment_chart", &self.enrollment_chart)
        }

        async fn fetch_course_distribution(&self) -> SourceResult<Vec<CourseShare>> {
            self.serve("course_distribution", &self.course_distribution)
        }

        async fn fetch_payment_methods(&self, _months: u32) -> SourceResult<Vec<PaymentMethodShare>> {
            self.serve("payment_methods", &self.payment_methods)
        }

        async fn fetch_financial_summary(&self, _year: Option<i32>) -> SourceResult<FinancialSummary> {
            self.serve("financial_summary", &self.financial_summary)
        }

        async fn fetch_recent_activities(&self, limit: usize) -> SourceResult<Vec<Activity>> {
            let mut activities = self.serve("recent_activities", &self.recent_activities)?;
            activities.truncate(limit);
            Ok(activities)
        }
    }
}
