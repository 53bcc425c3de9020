//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit and integration tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::ReportError;
use crate::http::{HttpRequest, HttpResponse, JSON_CONTENT_TYPE};
use crate::models::{BulkReport, DateRange, MetricSeries, ReportType, TimeSeriesPoint};
use crate::traits::{ReportSource, Sleeper, Transport};

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// Mock transport that replays queued responses and records every request.
#[derive(Clone, Default)]
pub struct MockTransport {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns an empty JSON object.
    responses: Arc<Mutex<Vec<Result<HttpResponse, ReportError>>>>,
    pub requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<Result<HttpResponse, ReportError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn recorded(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ReportError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(json_response(200, "{}"))
        } else {
            responses.remove(0)
        }
    }
}

/// Response with the JSON content type the API normally sends.
pub fn json_response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        reason: None,
        content_type: Some(JSON_CONTENT_TYPE.to_string()),
        body: body.to_string(),
    }
}

/// 429 response asking the client to wait `wait_seconds`.
pub fn rate_limited_response(wait_seconds: u64) -> HttpResponse {
    HttpResponse {
        status: 429,
        reason: Some("Too Many Requests".to_string()),
        content_type: Some(JSON_CONTENT_TYPE.to_string()),
        body: format!(
            r#"{{"errors":["You've performed this action too many times."],"error_type":"rate_limit","extras":{{"wait_seconds":{wait_seconds}}}}}"#
        ),
    }
}

// ---------------------------------------------------------------------------
// MockSleeper
// ---------------------------------------------------------------------------

/// Sleeper that returns immediately and records each requested wait.
#[derive(Clone, Default)]
pub struct MockSleeper {
    pub waits: Arc<Mutex<Vec<Duration>>>,
}

impl MockSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

impl Sleeper for MockSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

// ---------------------------------------------------------------------------
// MockReportSource
// ---------------------------------------------------------------------------

/// Report source with canned reports per type.
///
/// Reports without a canned answer come back with one empty series, or
/// three empty facets for consolidated page views.
#[derive(Clone, Default)]
pub struct MockReportSource {
    reports: Arc<Mutex<HashMap<ReportType, Result<BulkReport, ReportError>>>>,
    requested: Arc<Mutex<Vec<ReportType>>>,
}

impl MockReportSource {
    pub fn empty() -> Self {
        Self::default()
    }

    /// One point per report on `date`, with the given values.
    pub fn single_day(date: &str, values: &[(ReportType, i64)]) -> Self {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        values.iter().fold(Self::empty(), |source, (report, value)| {
            source.with_report(BulkReport::new(
                *report,
                vec![MetricSeries::new(
                    report.as_str(),
                    vec![TimeSeriesPoint::new(date, *value)],
                )],
            ))
        })
    }

    pub fn with_report(self, report: BulkReport) -> Self {
        self.reports.lock().unwrap().insert(report.report, Ok(report));
        self
    }

    pub fn with_page_views(
        self,
        logged_in: MetricSeries,
        anon: MetricSeries,
        crawlers: MetricSeries,
    ) -> Self {
        self.with_report(BulkReport::new(
            ReportType::ConsolidatedPageViews,
            vec![logged_in, anon, crawlers],
        ))
    }

    pub fn with_error(self, report: ReportType, error: ReportError) -> Self {
        self.reports.lock().unwrap().insert(report, Err(error));
        self
    }

    /// Reports requested so far, in order.
    pub fn requested(&self) -> Vec<ReportType> {
        self.requested.lock().unwrap().clone()
    }
}

impl ReportSource for MockReportSource {
    async fn fetch_report(
        &self,
        report: ReportType,
        _range: &DateRange,
    ) -> Result<BulkReport, ReportError> {
        self.requested.lock().unwrap().push(report);
        let mut reports = self.reports.lock().unwrap();
        match reports.remove(&report) {
            Some(result) => result,
            None => {
                let facets = match report {
                    ReportType::ConsolidatedPageViews => 3,
                    _ => 1,
                };
                Ok(BulkReport::new(
                    report,
                    (0..facets)
                        .map(|_| MetricSeries::new(report.as_str(), vec![]))
                        .collect(),
                ))
            }
        }
    }
}
