use chrono::NaiveDate;
use pulse_core::error::ReportError;
use pulse_core::models::{BulkReport, DateRange, MetricSeries, ReportType, TimeSeriesPoint};
use pulse_core::traits::{ReportSource, Sleeper, Transport};
use serde::Deserialize;

use crate::executor::RequestExecutor;

const BULK_REPORTS_PATH: &str = "/admin/reports/bulk";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Client for the admin bulk-reports endpoint.
#[derive(Clone)]
pub struct BulkReportClient<T: Transport, S: Sleeper> {
    executor: RequestExecutor<T, S>,
}

impl<T: Transport, S: Sleeper> BulkReportClient<T, S> {
    pub fn new(executor: RequestExecutor<T, S>) -> Self {
        Self { executor }
    }
}

impl<T: Transport, S: Sleeper> ReportSource for BulkReportClient<T, S> {
    async fn fetch_report(
        &self,
        report: ReportType,
        range: &DateRange,
    ) -> Result<BulkReport, ReportError> {
        let query = bulk_query(report, range);
        let decoded = self
            .executor
            .get(BULK_REPORTS_PATH, &query)
            .await?
            .ok_or_else(|| malformed(report, "empty response"))?;
        parse_bulk_report(report, decoded)
    }
}

/// Query pairs selecting one report with its previous-period facet.
pub fn bulk_query(report: ReportType, range: &DateRange) -> Vec<(String, String)> {
    let name = report.as_str();
    vec![
        (
            format!("reports[{name}][facets][]"),
            "prev_period".to_string(),
        ),
        (
            format!("reports[{name}][start_date]"),
            range.start().format(DATE_FORMAT).to_string(),
        ),
        (
            format!("reports[{name}][end_date]"),
            range.end().format(DATE_FORMAT).to_string(),
        ),
    ]
}

// ---- Bulk report wire types ----

#[derive(Deserialize)]
struct BulkResponse {
    reports: Vec<RawReport>,
}

#[derive(Deserialize)]
struct RawReport {
    #[serde(rename = "type")]
    kind: Option<String>,
    data: RawData,
}

/// Plain reports carry points directly; faceted ones carry one labelled
/// series per facet.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawData {
    Points(Vec<RawPoint>),
    Facets(Vec<RawFacet>),
}

#[derive(Deserialize)]
struct RawPoint {
    x: String,
    y: serde_json::Number,
}

#[derive(Deserialize)]
struct RawFacet {
    req: Option<String>,
    label: Option<String>,
    data: Vec<RawPoint>,
}

fn malformed(report: ReportType, reason: impl Into<String>) -> ReportError {
    ReportError::MalformedReport {
        report: report.to_string(),
        reason: reason.into(),
    }
}

fn parse_points(report: ReportType, raw: Vec<RawPoint>) -> Result<Vec<TimeSeriesPoint>, ReportError> {
    raw.into_iter()
        .map(|p| {
            let date = NaiveDate::parse_from_str(&p.x, DATE_FORMAT)
                .map_err(|e| malformed(report, format!("bad date '{}': {e}", p.x)))?;
            // Averaged reports (time to first response) come back fractional.
            let value = p
                .y
                .as_i64()
                .or_else(|| p.y.as_f64().map(|f| f.round() as i64))
                .ok_or_else(|| malformed(report, format!("bad value '{}'", p.y)))?;
            Ok(TimeSeriesPoint::new(date, value))
        })
        .collect()
}

/// Validate a decoded bulk response and turn its first report into typed
/// series.
pub fn parse_bulk_report(
    report: ReportType,
    decoded: serde_json::Value,
) -> Result<BulkReport, ReportError> {
    let response: BulkResponse = serde_json::from_value(decoded)
        .map_err(|e| malformed(report, format!("unexpected shape: {e}")))?;

    let raw = response
        .reports
        .into_iter()
        .next()
        .ok_or_else(|| malformed(report, "no reports in response"))?;

    if let Some(kind) = raw.kind.as_deref()
        && kind != report.as_str()
    {
        return Err(malformed(report, format!("response is for '{kind}'")));
    }

    let series = match raw.data {
        RawData::Points(points) => {
            vec![MetricSeries::new(report.as_str(), parse_points(report, points)?)]
        }
        RawData::Facets(facets) => facets
            .into_iter()
            .map(|facet| {
                let label = facet
                    .req
                    .or(facet.label)
                    .unwrap_or_else(|| report.as_str().to_string());
                Ok(MetricSeries::new(label, parse_points(report, facet.data)?))
            })
            .collect::<Result<Vec<_>, ReportError>>()?,
    };

    Ok(BulkReport::new(report, series))
}
