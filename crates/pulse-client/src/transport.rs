use std::time::Duration;

use pulse_core::error::ReportError;
use pulse_core::http::{HttpRequest, HttpResponse, HttpVerb, RequestBody};
use pulse_core::traits::Transport;
use reqwest::redirect::Policy;
use reqwest::{Client, Method};

/// HTTP transport using reqwest.
///
/// Redirects are never followed: a 302 from the forum means a bad key or
/// host, and the executor has to see it.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ReportError> {
        let client = Client::builder()
            .user_agent("Pulse/0.3 (Forum Reports)")
            .redirect(Policy::none())
            .build()
            .map_err(|e| ReportError::Http(e.to_string()))?;

        Ok(Self { client })
    }
}

fn method(verb: HttpVerb) -> Method {
    match verb {
        HttpVerb::Get => Method::GET,
        HttpVerb::Post => Method::POST,
        HttpVerb::Put => Method::PUT,
        HttpVerb::Delete => Method::DELETE,
    }
}

fn timeout_secs(timeout: Option<Duration>) -> u64 {
    timeout.map(|t| t.as_secs()).unwrap_or_default()
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ReportError> {
        let mut builder = self
            .client
            .request(method(request.verb), request.url.clone());

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Form(fields)) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields)
                    .finish();
                builder
                    .header("Content-Type", "application/x-www-form-urlencoded")
                    .body(encoded)
            }
            None => builder,
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ReportError::Timeout(timeout_secs(request.timeout))
            } else if e.is_connect() {
                ReportError::Network(format!("Connection failed: {e}"))
            } else {
                ReportError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ReportError::Timeout(timeout_secs(request.timeout))
            } else {
                ReportError::Http(format!("Failed to read response body: {e}"))
            }
        })?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            content_type,
            body,
        })
    }
}
