use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ReportError;

/// Inclusive calendar date range a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        if start > end {
            return Err(ReportError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range covering one day.
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// One `{x: date, y: count}` pair from a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub value: i64,
}

impl TimeSeriesPoint {
    pub fn new(date: NaiveDate, value: i64) -> Self {
        Self { date, value }
    }
}

/// Ordered points for one series. Missing dates count as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricSeries {
    pub label: String,
    pub points: Vec<TimeSeriesPoint>,
}

impl MetricSeries {
    pub fn new(label: impl Into<String>, points: Vec<TimeSeriesPoint>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|p| p.date)
    }
}

/// Bulk reports understood by the admin reporting API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportType {
    Topics,
    Posts,
    AcceptedSolutions,
    Signups,
    ConsolidatedPageViews,
    DailyEngagedUsers,
    TopicsWithNoResponse,
    Likes,
    TimeToFirstResponse,
}

impl ReportType {
    pub const ALL: [ReportType; 9] = [
        ReportType::Topics,
        ReportType::Posts,
        ReportType::AcceptedSolutions,
        ReportType::Signups,
        ReportType::ConsolidatedPageViews,
        ReportType::DailyEngagedUsers,
        ReportType::TopicsWithNoResponse,
        ReportType::Likes,
        ReportType::TimeToFirstResponse,
    ];

    /// Report name as used in the `reports[<name>]` query keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Topics => "topics",
            ReportType::Posts => "posts",
            ReportType::AcceptedSolutions => "accepted_solutions",
            ReportType::Signups => "signups",
            ReportType::ConsolidatedPageViews => "consolidated_page_views",
            ReportType::DailyEngagedUsers => "daily_engaged_users",
            ReportType::TopicsWithNoResponse => "topics_with_no_response",
            ReportType::Likes => "likes",
            ReportType::TimeToFirstResponse => "time_to_first_response",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportType::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("Unknown report: {}", s))
    }
}

/// One decoded bulk-report entry.
///
/// Plain reports carry a single series; faceted reports carry one series
/// per facet in upstream order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    #[serde(serialize_with = "serialize_report_type")]
    pub report: ReportType,
    pub series: Vec<MetricSeries>,
}

fn serialize_report_type<S: serde::Serializer>(
    report: &ReportType,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(report.as_str())
}

impl BulkReport {
    pub fn new(report: ReportType, series: Vec<MetricSeries>) -> Self {
        Self { report, series }
    }

    /// The first (primary) series.
    pub fn primary(&self) -> Result<&MetricSeries, ReportError> {
        self.facet(0)
    }

    /// The series at `index`, failing if the report has fewer series.
    pub fn facet(&self, index: usize) -> Result<&MetricSeries, ReportError> {
        self.series
            .get(index)
            .ok_or_else(|| ReportError::MalformedReport {
                report: self.report.to_string(),
                reason: format!(
                    "expected at least {} series, got {}",
                    index + 1,
                    self.series.len()
                ),
            })
    }
}

/// The report columns, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Topics,
    Posts,
    Solutions,
    Registrations,
    UserViews,
    AnonViews,
    Crawlers,
    ForumViews,
    UsersEngaged,
    NoResponse,
    Likes,
}

impl Metric {
    pub const COUNT: usize = 11;

    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::Topics,
        Metric::Posts,
        Metric::Solutions,
        Metric::Registrations,
        Metric::UserViews,
        Metric::AnonViews,
        Metric::Crawlers,
        Metric::ForumViews,
        Metric::UsersEngaged,
        Metric::NoResponse,
        Metric::Likes,
    ];

    /// Column heading used in the CSV output.
    pub fn column_name(&self) -> &'static str {
        match self {
            Metric::Topics => "Topics",
            Metric::Posts => "Posts",
            Metric::Solutions => "Solutions",
            Metric::Registrations => "Registrations",
            Metric::UserViews => "User views",
            Metric::AnonViews => "Anon views",
            Metric::Crawlers => "Crawlers",
            Metric::ForumViews => "Forum Views",
            Metric::UsersEngaged => "Users engaged",
            Metric::NoResponse => "No response",
            Metric::Likes => "Likes",
        }
    }

    /// Position of this metric in [`Metric::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Full header row: `Date` followed by every metric column.
    pub fn header() -> Vec<&'static str> {
        std::iter::once("Date")
            .chain(Metric::ALL.iter().map(|m| m.column_name()))
            .collect()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column_name())
    }
}

/// All metric counts for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedRow {
    pub date: NaiveDate,
    counts: [i64; Metric::COUNT],
}

impl AggregatedRow {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            counts: [0; Metric::COUNT],
        }
    }

    pub fn get(&self, metric: Metric) -> i64 {
        self.counts[metric.index()]
    }

    /// Add to a count, saturating at the `i64` bounds.
    pub fn add(&mut self, metric: Metric, value: i64) {
        let count = &mut self.counts[metric.index()];
        *count = count.saturating_add(value);
    }

    /// Counts in column order.
    pub fn counts(&self) -> &[i64; Metric::COUNT] {
        &self.counts
    }
}

/// Date-indexed report, iterated in the order dates were first seen.
#[derive(Debug, Clone, Default)]
pub struct AggregatedReport {
    rows: Vec<AggregatedRow>,
    index: HashMap<NaiveDate, usize>,
}

impl AggregatedReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to `metric` on `date`, creating a zeroed row on first sight.
    pub fn add(&mut self, date: NaiveDate, metric: Metric, value: i64) {
        let idx = match self.index.get(&date) {
            Some(&idx) => idx,
            None => {
                self.rows.push(AggregatedRow::new(date));
                self.index.insert(date, self.rows.len() - 1);
                self.rows.len() - 1
            }
        };
        self.rows[idx].add(metric, value);
    }

    pub fn row(&self, date: NaiveDate) -> Option<&AggregatedRow> {
        self.index.get(&date).map(|&idx| &self.rows[idx])
    }

    pub fn rows(&self) -> &[AggregatedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_date_range_rejects_reversed_bounds() {
        let err = DateRange::new(day("2024-02-01"), day("2024-01-01")).unwrap_err();
        assert!(matches!(err, ReportError::InvalidDateRange { .. }));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let range = DateRange::new(day("2024-01-01"), day("2024-01-03")).unwrap();
        assert!(range.contains(day("2024-01-01")));
        assert!(range.contains(day("2024-01-03")));
        assert!(!range.contains(day("2023-12-31")));
        assert!(!range.contains(day("2024-01-04")));
    }

    #[test]
    fn test_report_type_roundtrips_through_name() {
        for report in ReportType::ALL {
            assert_eq!(report.as_str().parse::<ReportType>().unwrap(), report);
        }
        assert!("pageviews".parse::<ReportType>().is_err());
    }

    #[test]
    fn test_metric_header_order() {
        assert_eq!(
            Metric::header(),
            vec![
                "Date",
                "Topics",
                "Posts",
                "Solutions",
                "Registrations",
                "User views",
                "Anon views",
                "Crawlers",
                "Forum Views",
                "Users engaged",
                "No response",
                "Likes",
            ]
        );
        for (i, metric) in Metric::ALL.iter().enumerate() {
            assert_eq!(metric.index(), i);
        }
    }

    #[test]
    fn test_facet_out_of_range_is_malformed() {
        let report = BulkReport::new(ReportType::Topics, vec![]);
        let err = report.primary().unwrap_err();
        assert!(matches!(err, ReportError::MalformedReport { .. }));
    }

    #[test]
    fn test_aggregated_report_keeps_first_seen_order_and_sums() {
        let mut report = AggregatedReport::new();
        report.add(day("2024-01-02"), Metric::Topics, 1);
        report.add(day("2024-01-01"), Metric::Posts, 4);
        report.add(day("2024-01-02"), Metric::Topics, 2);

        let dates: Vec<_> = report.rows().iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day("2024-01-02"), day("2024-01-01")]);

        let row = report.row(day("2024-01-02")).unwrap();
        assert_eq!(row.get(Metric::Topics), 3);
        assert_eq!(row.get(Metric::Posts), 0);
        assert_eq!(report.row(day("2024-01-01")).unwrap().get(Metric::Posts), 4);
    }

    #[test]
    fn test_aggregated_counts_saturate() {
        let mut report = AggregatedReport::new();
        report.add(day("2024-01-01"), Metric::Likes, i64::MAX);
        report.add(day("2024-01-01"), Metric::Likes, 5);
        report.add(day("2024-01-01"), Metric::Posts, i64::MIN);
        report.add(day("2024-01-01"), Metric::Posts, -1);

        let row = report.row(day("2024-01-01")).unwrap();
        assert_eq!(row.get(Metric::Likes), i64::MAX);
        assert_eq!(row.get(Metric::Posts), i64::MIN);
    }
}
