//! Transport-level request and response types shared by the executor and
//! its [`Transport`](crate::traits::Transport) implementations.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::ReportError;

/// The only content type the reporting API is trusted to answer with.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Upper bound on a server-requested rate-limit wait.
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request payload: form-encoded fields or a JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
}

/// Connection settings shared read-only by every request of one client.
#[derive(Clone)]
pub struct RequestContext {
    host: String,
    api_username: String,
    api_key: String,
    timeout: Option<Duration>,
}

impl RequestContext {
    /// Validate the host (http/https only) and strip any trailing `/`.
    pub fn new(
        host: &str,
        api_username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ReportError> {
        let parsed =
            Url::parse(host).map_err(|e| ReportError::Config(format!("Invalid host '{host}': {e}")))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ReportError::Config(format!(
                    "Host scheme '{scheme}' is not allowed (only http/https)"
                )));
            }
        }

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            api_username: api_username.into(),
            api_key: api_key.into(),
            timeout: None,
        })
    }

    /// Per-request timeout. Applies to each HTTP call, not the whole run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn api_username(&self) -> &str {
        &self.api_username
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("host", &self.host)
            .field("api_username", &self.api_username)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A fully prepared request, ready for a transport to send as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub verb: HttpVerb,
    /// Absolute URL with the query string already encoded.
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response as seen on the wire, before any classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Reason phrase, if the transport knows one.
    pub reason: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    /// Only 400 and above count as failure; 3xx is "ok".
    pub fn is_ok(&self) -> bool {
        self.status < 400
    }

    fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// Human-readable failure message: the body's `errors` joined with `,`,
    /// else the reason phrase, else `"{status}: {body}"`.
    pub fn error_message(&self) -> String {
        if let Some(errors) = self.json().as_ref().and_then(joined_errors) {
            return errors;
        }
        match self.reason.as_deref() {
            Some(reason) if !reason.is_empty() => reason.to_string(),
            _ => format!("{}: {}", self.status, self.body),
        }
    }

    /// Server-requested wait from a 429 body (`extras.wait_seconds`).
    ///
    /// Missing or non-numeric values count as no extra wait; anything longer
    /// than [`MAX_RATE_LIMIT_WAIT`] is capped to it.
    pub fn rate_limit_wait(&self) -> Duration {
        self.json()
            .as_ref()
            .and_then(|v| v.pointer("/extras/wait_seconds"))
            .and_then(serde_json::Value::as_f64)
            .filter(|secs| *secs > 0.0)
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .map_or(MAX_RATE_LIMIT_WAIT, |wait| wait.min(MAX_RATE_LIMIT_WAIT))
            })
            .unwrap_or(Duration::ZERO)
    }
}

/// Join a decoded body's `errors` with `,`. A bare string is taken as is.
/// `None` when `errors` is absent, empty, or neither an array nor a string.
pub fn joined_errors(decoded: &serde_json::Value) -> Option<String> {
    match decoded.get("errors")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(errors) if !errors.is_empty() => Some(
            errors
                .iter()
                .map(|e| match e {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        _ => None,
    }
}
