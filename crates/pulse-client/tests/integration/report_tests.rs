use std::time::Duration;

use chrono::NaiveDate;
use pulse_core::models::{DateRange, Metric};
use pulse_core::testutil::{json_response, rate_limited_response};
use pulse_core::{MetricsAggregator, ReportError};

use crate::common::*;

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[tokio::test]
async fn single_day_report_end_to_end() {
    let d = "2024-01-01";
    let (client, transport, sleeper) = test_client(vec![
        plain_report("topics", &[(d, 0)]),
        plain_report("posts", &[(d, 0)]),
        plain_report("accepted_solutions", &[(d, 0)]),
        plain_report("signups", &[(d, 0)]),
        page_views_report(&[(d, 5)], &[(d, 3)], &[(d, 2)]),
        plain_report("daily_engaged_users", &[(d, 0)]),
        plain_report("topics_with_no_response", &[(d, 0)]),
        plain_report("likes", &[(d, 7)]),
    ]);

    let aggregator = MetricsAggregator::new(client, DateRange::single(day(d)));
    let report = aggregator.aggregate_by_date().await.unwrap();

    assert_eq!(report.len(), 1);
    let row = report.row(day(d)).unwrap();
    assert_eq!(row.get(Metric::ForumViews), 10);
    assert_eq!(row.get(Metric::Likes), 7);
    assert_eq!(row.get(Metric::AnonViews), 3);
    assert_eq!(row.get(Metric::Crawlers), 2);
    assert_eq!(row.get(Metric::UserViews), 5);
    for metric in [
        Metric::Topics,
        Metric::Posts,
        Metric::Solutions,
        Metric::Registrations,
        Metric::UsersEngaged,
        Metric::NoResponse,
    ] {
        assert_eq!(row.get(metric), 0, "{metric}");
    }

    let sent = transport.recorded();
    assert_eq!(sent.len(), 8);
    assert!(sent.iter().all(|r| r.url.path() == "/admin/reports/bulk"));
    assert!(sent.iter().all(|r| r.header("Api-Key") == Some("test-key")));
    let first_query: Vec<(String, String)> = sent[0]
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert_eq!(
        first_query,
        vec![
            ("reports[topics][facets][]".to_string(), "prev_period".to_string()),
            ("reports[topics][start_date]".to_string(), d.to_string()),
            ("reports[topics][end_date]".to_string(), d.to_string()),
        ]
    );
    assert!(sleeper.recorded().is_empty());
}

#[tokio::test]
async fn sparse_solutions_and_no_response_are_realigned() {
    let (client, _, _) = test_client(vec![
        plain_report("topics", &[]),
        plain_report("posts", &[]),
        plain_report("accepted_solutions", &[("2024-01-02", 4)]),
        plain_report("signups", &[]),
        page_views_report(
            &[("2024-01-01", 1), ("2024-01-02", 1), ("2024-01-03", 1)],
            &[("2024-01-01", 2), ("2024-01-02", 2), ("2024-01-03", 2)],
            &[("2024-01-01", 3), ("2024-01-02", 3), ("2024-01-03", 3)],
        ),
        plain_report("daily_engaged_users", &[]),
        plain_report("topics_with_no_response", &[("2024-01-03", 9)]),
        plain_report("likes", &[]),
    ]);

    let range = DateRange::new(day("2024-01-01"), day("2024-01-03")).unwrap();
    let report = MetricsAggregator::new(client, range)
        .aggregate_by_date()
        .await
        .unwrap();

    assert_eq!(report.len(), 3);
    let solutions: Vec<_> = report.rows().iter().map(|r| r.get(Metric::Solutions)).collect();
    let no_response: Vec<_> = report.rows().iter().map(|r| r.get(Metric::NoResponse)).collect();
    assert_eq!(solutions, vec![0, 4, 0]);
    assert_eq!(no_response, vec![0, 0, 9]);
    assert!(report.rows().iter().all(|r| r.get(Metric::ForumViews) == 6));
}

#[tokio::test]
async fn rate_limited_fetch_recovers_after_backoff() {
    let (client, transport, sleeper) = test_client(vec![
        rate_limited_response(5),
        plain_report("topics", &[("2024-01-01", 1)]),
        plain_report("posts", &[]),
        plain_report("accepted_solutions", &[]),
        plain_report("signups", &[]),
        page_views_report(&[], &[], &[]),
        plain_report("daily_engaged_users", &[]),
        plain_report("topics_with_no_response", &[]),
        plain_report("likes", &[]),
    ]);

    let report = MetricsAggregator::new(client, DateRange::single(day("2024-01-01")))
        .aggregate_by_date()
        .await
        .unwrap();

    assert_eq!(report.row(day("2024-01-01")).unwrap().get(Metric::Topics), 1);
    assert_eq!(sleeper.recorded(), vec![Duration::from_secs(6)]);
    assert_eq!(transport.request_count(), 9);
}

#[tokio::test]
async fn bad_credentials_abort_the_report() {
    let (client, transport, _) = test_client(vec![
        plain_report("topics", &[]),
        json_response(302, ""),
    ]);

    let err = MetricsAggregator::new(client, DateRange::single(day("2024-01-01")))
        .aggregate_by_date()
        .await
        .unwrap_err();

    assert!(matches!(err, ReportError::UnexpectedRedirect { status: 302, .. }));
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn exhausted_rate_limit_aborts_the_report() {
    let (client, transport, sleeper) = test_client(vec![
        rate_limited_response(5),
        rate_limited_response(5),
        rate_limited_response(5),
        rate_limited_response(5),
    ]);

    let err = MetricsAggregator::new(client, DateRange::single(day("2024-01-01")))
        .aggregate_by_date()
        .await
        .unwrap_err();

    assert!(matches!(err, ReportError::RateLimited { .. }));
    assert_eq!(transport.request_count(), 4);
    assert_eq!(sleeper.recorded().len(), 3);
}
