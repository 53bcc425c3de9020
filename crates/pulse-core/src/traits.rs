use std::future::Future;
use std::time::Duration;

use crate::error::ReportError;
use crate::http::{HttpRequest, HttpResponse};
use crate::models::{BulkReport, DateRange, ReportType};

/// Sends one prepared HTTP request and returns the raw response.
///
/// Implementations must not follow redirects and must not interpret the
/// status code; classification is the executor's job.
pub trait Transport: Send + Sync + Clone {
    fn send(
        &self,
        request: &HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, ReportError>> + Send;
}

/// Waits out a rate-limit backoff.
pub trait Sleeper: Send + Sync + Clone {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fetches one bulk report for a date range.
pub trait ReportSource: Send + Sync + Clone {
    fn fetch_report(
        &self,
        report: ReportType,
        range: &DateRange,
    ) -> impl Future<Output = Result<BulkReport, ReportError>> + Send;
}
