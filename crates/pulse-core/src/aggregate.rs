use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::ReportError;
use crate::models::{
    AggregatedReport, BulkReport, DateRange, Metric, MetricSeries, ReportType, TimeSeriesPoint,
};
use crate::traits::ReportSource;

/// Facet positions inside the consolidated page views report.
const LOGGED_IN_FACET: usize = 0;
const ANON_FACET: usize = 1;
const CRAWLER_FACET: usize = 2;

/// Reports fetched for one aggregation, in request order.
const FETCH_ORDER: [ReportType; 8] = [
    ReportType::Topics,
    ReportType::Posts,
    ReportType::AcceptedSolutions,
    ReportType::Signups,
    ReportType::ConsolidatedPageViews,
    ReportType::DailyEngagedUsers,
    ReportType::TopicsWithNoResponse,
    ReportType::Likes,
];

/// Fetches every metric for a date range and merges them into one
/// date-indexed table.
///
/// Generic over the report source so the merge logic can be tested without
/// a live forum.
pub struct MetricsAggregator<R: ReportSource> {
    source: R,
    range: DateRange,
}

impl<R: ReportSource> MetricsAggregator<R> {
    pub fn new(source: R, range: DateRange) -> Self {
        Self { source, range }
    }

    /// Fetch all reports sequentially, derive the computed metrics, and fold
    /// every series into one row per date.
    ///
    /// Any fetch failure aborts the whole aggregation.
    pub async fn aggregate_by_date(&self) -> Result<AggregatedReport, ReportError> {
        let mut reports: HashMap<ReportType, BulkReport> = HashMap::new();
        for report in FETCH_ORDER {
            tracing::info!(%report, start = %self.range.start(), end = %self.range.end(), "Fetching report");
            let fetched = self.source.fetch_report(report, &self.range).await?;
            tracing::debug!(%report, series = fetched.series.len(), "Report fetched");
            reports.insert(report, fetched);
        }

        let page_views = fetched_report(&reports, ReportType::ConsolidatedPageViews)?;
        let user_views = page_views.facet(LOGGED_IN_FACET)?;
        let anon_views = page_views.facet(ANON_FACET)?;
        let crawlers = page_views.facet(CRAWLER_FACET)?;

        let forum_views = sum_by_index(anon_views, crawlers, user_views)?;
        let solutions = realign(primary(&reports, ReportType::AcceptedSolutions)?, anon_views);
        let no_response = realign(primary(&reports, ReportType::TopicsWithNoResponse)?, anon_views);

        let all_metrics: [(Metric, &MetricSeries); Metric::COUNT] = [
            (Metric::Topics, primary(&reports, ReportType::Topics)?),
            (Metric::Posts, primary(&reports, ReportType::Posts)?),
            (Metric::Solutions, &solutions),
            (Metric::Registrations, primary(&reports, ReportType::Signups)?),
            (Metric::UserViews, user_views),
            (Metric::AnonViews, anon_views),
            (Metric::Crawlers, crawlers),
            (Metric::ForumViews, &forum_views),
            (Metric::UsersEngaged, primary(&reports, ReportType::DailyEngagedUsers)?),
            (Metric::NoResponse, &no_response),
            (Metric::Likes, primary(&reports, ReportType::Likes)?),
        ];

        let aggregated = fold(&all_metrics, &self.range);
        tracing::info!(rows = aggregated.len(), "Aggregation complete");
        Ok(aggregated)
    }
}

fn fetched_report(
    reports: &HashMap<ReportType, BulkReport>,
    report: ReportType,
) -> Result<&BulkReport, ReportError> {
    reports
        .get(&report)
        .ok_or_else(|| ReportError::MalformedReport {
            report: report.to_string(),
            reason: "report was not fetched".into(),
        })
}

fn primary(
    reports: &HashMap<ReportType, BulkReport>,
    report: ReportType,
) -> Result<&MetricSeries, ReportError> {
    fetched_report(reports, report)?.primary()
}

/// Sum three series point by point.
///
/// The series must have the same length and the same date at every index.
pub fn sum_by_index(
    first: &MetricSeries,
    second: &MetricSeries,
    third: &MetricSeries,
) -> Result<MetricSeries, ReportError> {
    if first.len() != second.len() || first.len() != third.len() {
        return Err(ReportError::SeriesMismatch(format!(
            "cannot sum '{}', '{}' and '{}': lengths {}, {} and {}",
            first.label,
            second.label,
            third.label,
            first.len(),
            second.len(),
            third.len()
        )));
    }

    let points = first
        .points
        .iter()
        .zip(&second.points)
        .zip(&third.points)
        .map(|((a, b), c)| {
            if a.date != b.date || a.date != c.date {
                return Err(ReportError::SeriesMismatch(format!(
                    "dates differ at the same index: {}, {} and {}",
                    a.date, b.date, c.date
                )));
            }
            let total = a
                .value
                .checked_add(b.value)
                .and_then(|sum| sum.checked_add(c.value))
                .ok_or_else(|| {
                    ReportError::SeriesMismatch(format!("counts overflow on {}", a.date))
                })?;
            Ok(TimeSeriesPoint::new(a.date, total))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MetricSeries::new("forum_views", points))
}

/// Re-key `raw` onto the dates of `reference`.
///
/// Each reference date takes the raw value at that exact date, or 0 when the
/// raw series has no entry for it. Raw dates missing from the reference are
/// dropped. With duplicate raw dates the last one wins.
pub fn realign(raw: &MetricSeries, reference: &MetricSeries) -> MetricSeries {
    let lookup: HashMap<NaiveDate, i64> = raw.points.iter().map(|p| (p.date, p.value)).collect();

    let points = reference
        .dates()
        .map(|date| TimeSeriesPoint::new(date, lookup.get(&date).copied().unwrap_or(0)))
        .collect();

    MetricSeries::new(raw.label.clone(), points)
}

/// Fold every series into one row per date, adding values into their
/// metric slot. Points outside `range` are dropped.
pub fn fold(all_metrics: &[(Metric, &MetricSeries)], range: &DateRange) -> AggregatedReport {
    let mut aggregated = AggregatedReport::new();

    for (metric, series) in all_metrics {
        for point in &series.points {
            if !range.contains(point.date) {
                tracing::warn!(
                    %metric,
                    date = %point.date,
                    "Dropping point outside the requested range"
                );
                continue;
            }
            aggregated.add(point.date, *metric, point.value);
        }
    }

    aggregated
}
