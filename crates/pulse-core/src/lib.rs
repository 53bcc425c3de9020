pub mod aggregate;
pub mod error;
pub mod http;
pub mod models;
pub mod retry;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use aggregate::MetricsAggregator;
pub use error::ReportError;
pub use http::{HttpRequest, HttpResponse, HttpVerb, JSON_CONTENT_TYPE, RequestBody, RequestContext};
pub use models::{
    AggregatedReport, AggregatedRow, BulkReport, DateRange, Metric, MetricSeries, ReportType,
    TimeSeriesPoint,
};
pub use retry::{AttemptOutcome, FailureKind, RetryPolicy, RetryState};
pub use traits::{ReportSource, Sleeper, TokioSleeper, Transport};
