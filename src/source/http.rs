//! Back-office REST API source.
//!
//! Thin reqwest wrapper: one GET per feed, bearer token when configured,
//! tolerant decoding of the response envelopes the API uses.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{decode_list, decode_object, DataSource};
use crate::aggregation::PeriodFilter;
use crate::config::{ApiConfig, EndpointConfig};
use crate::error::{SourceError, SourceResult};
use crate::models::{
    Activity, CourseShare, EnrollmentPoint, FinancialSummary, PaymentMethodShare, RawRecord,
    RevenuePoint,
};

/// Source backed by the back-office HTTP API.
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    endpoints: EndpointConfig,
    timeout_seconds: u64,
}

impl HttpSource {
    pub fn new(config: &ApiConfig) -> SourceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(SourceError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.trim().is_empty()),
            endpoints: config.endpoints.clone(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET a path and parse the body as JSON.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> SourceResult<Value> {
        let url = self.url(path);
        debug!("GET {} {:?}", url, query);

        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout {
                    endpoint: path.to_string(),
                    seconds: self.timeout_seconds,
                }
            } else {
                SourceError::Transport {
                    endpoint: path.to_string(),
                    source: e,
                }
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| SourceError::Transport {
            endpoint: path.to_string(),
            source: e,
        })?;

        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        serde_json::from_str(&body).map_err(|source| SourceError::Decode {
            endpoint: path.to_string(),
            source,
        })
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> SourceResult<Vec<T>> {
        let value = self.get_json(path, query).await?;
        decode_list(path, value)
    }

    async fn get_records(
        &self,
        path: &str,
        period: Option<PeriodFilter>,
    ) -> SourceResult<Vec<RawRecord>> {
        let query = period.map(period_query).unwrap_or_default();
        let records: Vec<RawRecord> = self.get_list(path, &query).await?;
        debug!("{} returned {} records", path, records.len());
        Ok(records)
    }
}

/// Query parameters scoping a list endpoint to a period.
fn period_query(period: PeriodFilter) -> Vec<(&'static str, String)> {
    vec![
        ("start_date", period.start.format("%Y-%m-%d").to_string()),
        ("end_date", period.end.format("%Y-%m-%d").to_string()),
        ("year", period.year.to_string()),
        ("month", period.month.to_string()),
    ]
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

#[async_trait]
impl DataSource for HttpSource {
    async fn fetch_payments(&self, period: Option<PeriodFilter>) -> SourceResult<Vec<RawRecord>> {
        self.get_records(&self.endpoints.payments, period).await
    }

    async fn fetch_expenses(&self, period: Option<PeriodFilter>) -> SourceResult<Vec<RawRecord>> {
        self.get_records(&self.endpoints.expenses, period).await
    }

    async fn fetch_enrollments(&self) -> SourceResult<Vec<RawRecord>> {
        self.get_records(&self.endpoints.enrollments, None).await
    }

    async fn fetch_revenue_chart(&self, months: u32) -> SourceResult<Vec<RevenuePoint>> {
        self.get_list(&self.endpoints.revenue_chart, &[("months", months.to_string())])
            .await
    }

    async fn fetch_enrollment_chart(&self, months: u32) -> SourceResult<Vec<EnrollmentPoint>> {
        self.get_list(&self.endpoints.enrollment_chart, &[("months", months.to_string())])
            .await
    }

    async fn fetch_course_distribution(&self) -> SourceResult<Vec<CourseShare>> {
        self.get_list(&self.endpoints.course_distribution, &[]).await
    }

    async fn fetch_payment_methods(&self, months: u32) -> SourceResult<Vec<PaymentMethodShare>> {
        self.get_list(&self.endpoints.payment_methods, &[("months", months.to_string())])
            .await
    }

    async fn fetch_financial_summary(&self, year: Option<i32>) -> SourceResult<FinancialSummary> {
        let query: Vec<(&str, String)> = year
            .map(|y| vec![("year", y.to_string())])
            .unwrap_or_default();
        let path = &self.endpoints.financial_summary;
        let value = self.get_json(path, &query).await?;
        decode_object(path, value)
    }

    async fn fetch_recent_activities(&self, limit: usize) -> SourceResult<Vec<Activity>> {
        let mut activities: Vec<Activity> = self
            .get_list(&self.endpoints.recent_activities, &[("limit", limit.to_string())])
            .await?;
        activities.truncate(limit);
        Ok(activities)
    }
}
