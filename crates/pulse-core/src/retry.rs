//! Retry policy for rate-limited requests, as an explicit state machine.
//!
//! ```text
//! ATTEMPTING --[status < 400]--------------------> SUCCEEDED
//!     |      --[4xx != 429]----------------------> FAILED(client)
//!     |      --[5xx]-----------------------------> FAILED(server)
//!     |      --[429, last attempt]---------------> FAILED(rate limit exhausted)
//!     +------[429, attempts left]--> BACKOFF --[wait elapsed]--> ATTEMPTING
//! ```
//!
//! Only 429 is ever retried. The final rate-limited attempt goes straight to
//! `Failed` without sleeping.

use std::time::Duration;

use crate::http::HttpResponse;

/// Why the retry loop gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Client,
    Server,
    RateLimitExhausted,
}

/// Current position in the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// About to send a request; `remaining` counts this attempt.
    Attempting { remaining: u32 },
    /// Sleeping before the next attempt.
    Backoff { wait: Duration, remaining: u32 },
    Succeeded,
    Failed(FailureKind),
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded | RetryState::Failed(_))
    }
}

/// Classification of one response, as far as the retry loop cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Ok,
    RateLimited { wait: Duration },
    ClientError,
    ServerError,
}

impl AttemptOutcome {
    pub fn classify(response: &HttpResponse) -> Self {
        match response.status {
            s if s < 400 => AttemptOutcome::Ok,
            429 => AttemptOutcome::RateLimited {
                wait: response.rate_limit_wait(),
            },
            s if s < 500 => AttemptOutcome::ClientError,
            _ => AttemptOutcome::ServerError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed delay added on top of the server-requested wait.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn start(&self) -> RetryState {
        RetryState::Attempting {
            remaining: self.max_attempts.max(1),
        }
    }

    /// Transition after a response was received in `Attempting`.
    ///
    /// Any other state is returned unchanged.
    pub fn on_response(&self, state: RetryState, outcome: AttemptOutcome) -> RetryState {
        let RetryState::Attempting { remaining } = state else {
            return state;
        };

        match outcome {
            AttemptOutcome::Ok => RetryState::Succeeded,
            AttemptOutcome::ClientError => RetryState::Failed(FailureKind::Client),
            AttemptOutcome::ServerError => RetryState::Failed(FailureKind::Server),
            AttemptOutcome::RateLimited { wait } => {
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    RetryState::Failed(FailureKind::RateLimitExhausted)
                } else {
                    RetryState::Backoff {
                        wait: self.backoff.saturating_add(wait),
                        remaining,
                    }
                }
            }
        }
    }

    /// Transition once the backoff sleep is over. Any other state is
    /// returned unchanged.
    pub fn on_backoff_elapsed(&self, state: RetryState) -> RetryState {
        match state {
            RetryState::Backoff { remaining, .. } => RetryState::Attempting { remaining },
            other => other,
        }
    }
}
