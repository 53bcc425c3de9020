use pulse_core::error::ReportError;
use pulse_core::http::{
    HttpRequest, HttpResponse, HttpVerb, JSON_CONTENT_TYPE, RequestBody, RequestContext,
    joined_errors,
};
use pulse_core::retry::{AttemptOutcome, FailureKind, RetryPolicy, RetryState};
use pulse_core::traits::{Sleeper, TokioSleeper, Transport};
use url::Url;

use crate::transport::ReqwestTransport;

/// Performs authenticated calls against the admin API and decodes the JSON
/// answer, retrying only when rate limited.
#[derive(Clone)]
pub struct RequestExecutor<T: Transport = ReqwestTransport, S: Sleeper = TokioSleeper> {
    context: RequestContext,
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
}

impl RequestExecutor {
    /// Executor over reqwest with tokio sleeps and the default retry policy.
    pub fn new(context: RequestContext) -> Result<Self, ReportError> {
        Ok(Self::with_transport(
            context,
            ReqwestTransport::new()?,
            TokioSleeper,
        ))
    }
}

impl<T: Transport, S: Sleeper> RequestExecutor<T, S> {
    pub fn with_transport(context: RequestContext, transport: T, sleeper: S) -> Self {
        Self {
            context,
            transport,
            sleeper,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn get(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Option<serde_json::Value>, ReportError> {
        self.execute(HttpVerb::Get, path, query, None).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: RequestBody,
    ) -> Result<Option<serde_json::Value>, ReportError> {
        self.execute(HttpVerb::Post, path, &[], Some(body)).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: RequestBody,
    ) -> Result<Option<serde_json::Value>, ReportError> {
        self.execute(HttpVerb::Put, path, &[], Some(body)).await
    }

    pub async fn delete(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Option<serde_json::Value>, ReportError> {
        self.execute(HttpVerb::Delete, path, query, None).await
    }

    /// Send one request, retrying on 429 according to the retry policy,
    /// and decode the JSON answer.
    ///
    /// Returns `Ok(None)` when the forum answers with an empty, non-JSON body.
    pub async fn execute(
        &self,
        verb: HttpVerb,
        path: &str,
        query: &[(String, String)],
        body: Option<RequestBody>,
    ) -> Result<Option<serde_json::Value>, ReportError> {
        let request = self.prepare(verb, path, query, body)?;
        let mut state = self.policy.start();

        loop {
            tracing::debug!(verb = %request.verb, url = %request.url, "Sending request");
            let response = self.transport.send(&request).await?;
            tracing::debug!(
                status = response.status,
                body = ?response.body,
                "Received response"
            );

            match self
                .policy
                .on_response(state, AttemptOutcome::classify(&response))
            {
                RetryState::Succeeded => return decode(response),
                RetryState::Failed(kind) => return Err(failure(kind, response)),
                backoff @ RetryState::Backoff { wait, remaining } => {
                    tracing::info!(
                        wait_secs = wait.as_secs_f64(),
                        remaining,
                        "Rate limited, waiting before retry"
                    );
                    self.sleeper.sleep(wait).await;
                    state = self.policy.on_backoff_elapsed(backoff);
                }
                attempting @ RetryState::Attempting { .. } => state = attempting,
            }
        }
    }

    fn prepare(
        &self,
        verb: HttpVerb,
        path: &str,
        query: &[(String, String)],
        body: Option<RequestBody>,
    ) -> Result<HttpRequest, ReportError> {
        let raw = format!("{}{}", self.context.host(), path);
        let mut url =
            Url::parse(&raw).map_err(|e| ReportError::Http(format!("Invalid URL '{raw}': {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(HttpRequest {
            verb,
            url,
            headers: vec![
                ("Accept".to_string(), JSON_CONTENT_TYPE.to_string()),
                ("Api-Key".to_string(), self.context.api_key().to_string()),
                (
                    "Api-Username".to_string(),
                    self.context.api_username().to_string(),
                ),
            ],
            body,
            timeout: self.context.timeout(),
        })
    }
}

/// Error for a response that ended the retry loop unsuccessfully.
fn failure(kind: FailureKind, response: HttpResponse) -> ReportError {
    let status = response.status;
    match kind {
        FailureKind::Client => ReportError::Client {
            status,
            message: response.error_message(),
            body: response.body,
        },
        FailureKind::Server => ReportError::Server {
            status,
            message: response.error_message(),
            body: response.body,
        },
        FailureKind::RateLimitExhausted => {
            tracing::warn!(status, "Rate limit retries exhausted");
            ReportError::RateLimited {
                status,
                message: "Number of rate limit retries exceeded. Increase retry backoff or attempts"
                    .to_string(),
                body: response.body,
            }
        }
    }
}

/// Validate and decode a response that passed the status check.
///
/// The 302 check must come first: the forum redirects on bad credentials
/// and that response otherwise looks "ok".
fn decode(response: HttpResponse) -> Result<Option<serde_json::Value>, ReportError> {
    let status = response.status;
    if status == 302 {
        return Err(ReportError::UnexpectedRedirect {
            status,
            body: response.body,
        });
    }

    if response.content_type.as_deref() != Some(JSON_CONTENT_TYPE) {
        if response.body.trim().is_empty() {
            return Ok(None);
        }
        return Err(ReportError::InvalidResponse {
            status,
            content_type: response.content_type.unwrap_or_default(),
            body: response.body,
        });
    }

    let decoded: serde_json::Value = match serde_json::from_str(&response.body) {
        Ok(value) => value,
        Err(e) => {
            return Err(ReportError::Decode {
                status,
                message: e.to_string(),
                body: response.body,
            });
        }
    };

    if let Some(errors) = joined_errors(&decoded) {
        let message = match decoded.get("message").and_then(|m| m.as_str()) {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => errors,
        };
        return Err(ReportError::Api {
            status,
            message,
            body: response.body,
        });
    }

    Ok(Some(decoded))
}
