use chrono::NaiveDate;
use thiserror::Error;

/// Error types for fetching and aggregating forum reports.
#[derive(Error, Debug)]
pub enum ReportError {
    /// 4xx other than 429: bad credentials or bad parameters. Never retried.
    #[error("Client error (HTTP {status}): {message}")]
    Client {
        status: u16,
        message: String,
        body: String,
    },

    /// 5xx from the forum. Not retried.
    #[error("Server error (HTTP {status}): {message}")]
    Server {
        status: u16,
        message: String,
        body: String,
    },

    /// Still rate limited after every allowed attempt.
    #[error("Rate limited (HTTP {status}): {message}")]
    RateLimited {
        status: u16,
        message: String,
        body: String,
    },

    /// The forum answered with a redirect, usually a bad API key or host.
    #[error("Unexpected redirect (HTTP {status}), invalid api key or host?")]
    UnexpectedRedirect { status: u16, body: String },

    /// Non-empty body with a content type other than JSON.
    #[error("Invalid response (HTTP {status}), expecting \"{expected}\" got \"{content_type}\"", expected = crate::JSON_CONTENT_TYPE)]
    InvalidResponse {
        status: u16,
        content_type: String,
        body: String,
    },

    /// Body claimed to be JSON but could not be decoded.
    #[error("Failed to decode response (HTTP {status}): {message}")]
    Decode {
        status: u16,
        message: String,
        body: String,
    },

    /// The API reported errors inside an otherwise successful response.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        body: String,
    },

    /// HTTP request could not be built or sent.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Decoded report does not have the expected shape.
    #[error("Malformed '{report}' report: {reason}")]
    MalformedReport { report: String, reason: String },

    /// Series that must line up by index do not.
    #[error("Series mismatch: {0}")]
    SeriesMismatch(String),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

impl ReportError {
    /// HTTP status of the offending response, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ReportError::Client { status, .. }
            | ReportError::Server { status, .. }
            | ReportError::RateLimited { status, .. }
            | ReportError::UnexpectedRedirect { status, .. }
            | ReportError::InvalidResponse { status, .. }
            | ReportError::Decode { status, .. }
            | ReportError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw body of the offending response, when there was one.
    pub fn body(&self) -> Option<&str> {
        match self {
            ReportError::Client { body, .. }
            | ReportError::Server { body, .. }
            | ReportError::RateLimited { body, .. }
            | ReportError::UnexpectedRedirect { body, .. }
            | ReportError::InvalidResponse { body, .. }
            | ReportError::Decode { body, .. }
            | ReportError::Api { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Returns true for responses that passed the status check but were
    /// still unusable (redirect, wrong content type, bad JSON, API errors).
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            ReportError::UnexpectedRedirect { .. }
                | ReportError::InvalidResponse { .. }
                | ReportError::Decode { .. }
                | ReportError::Api { .. }
        )
    }
}
