use pulse_client::{BulkReportClient, RequestExecutor};
use pulse_core::http::{HttpResponse, RequestContext};
use pulse_core::testutil::{MockSleeper, MockTransport, json_response};
use serde_json::json;

pub type TestClient = BulkReportClient<MockTransport, MockSleeper>;

/// Bulk report client over a mock transport, plus handles for assertions.
pub fn test_client(responses: Vec<HttpResponse>) -> (TestClient, MockTransport, MockSleeper) {
    let transport = MockTransport::with_responses(responses.into_iter().map(Ok).collect());
    let sleeper = MockSleeper::new();
    let context = RequestContext::new("https://forum.example.com/", "system", "test-key")
        .expect("valid host");
    let executor = RequestExecutor::with_transport(context, transport.clone(), sleeper.clone());
    (BulkReportClient::new(executor), transport, sleeper)
}

/// Plain single-series bulk report response.
pub fn plain_report(name: &str, points: &[(&str, i64)]) -> HttpResponse {
    let data: Vec<_> = points.iter().map(|(x, y)| json!({"x": x, "y": y})).collect();
    json_response(
        200,
        &json!({"reports": [{"type": name, "data": data, "prev_data": []}]}).to_string(),
    )
}

/// Consolidated page views response with logged-in, anon, crawler facets.
pub fn page_views_report(
    logged_in: &[(&str, i64)],
    anon: &[(&str, i64)],
    crawlers: &[(&str, i64)],
) -> HttpResponse {
    let facet = |req: &str, points: &[(&str, i64)]| {
        let data: Vec<_> = points.iter().map(|(x, y)| json!({"x": x, "y": y})).collect();
        json!({"req": req, "data": data})
    };
    json_response(
        200,
        &json!({
            "reports": [{
                "type": "consolidated_page_views",
                "data": [
                    facet("page_view_logged_in", logged_in),
                    facet("page_view_anon", anon),
                    facet("page_view_crawler", crawlers),
                ]
            }]
        })
        .to_string(),
    )
}
