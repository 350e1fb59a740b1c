//! Bounded-retry GET executor shared by all connectors.

use std::sync::Arc;
use std::time::Duration;

use rentwire_core::Clock;
use url::Url;

use super::error::{FetchCause, FetchError};
use super::robots::RobotsGate;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Retry settings for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (default: 3).
    pub max_attempts: u32,
    /// Backoff base; the wait after attempt `n` is `base_delay * 2^(n-1)`.
    pub base_delay: Duration,
    /// Per-attempt timeout (default: 15s).
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(2000), timeout: Duration::from_millis(15_000) }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

/// Performs GETs with exponential backoff.
///
/// Does not interpret bodies. Any 2xx short-circuits; any other status or
/// transport failure is retried until `max_attempts` is reached.
#[derive(Debug)]
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    robots: Option<RobotsGate>,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>, clock: Arc<dyn Clock>) -> Self {
        Self { transport, clock, robots: None }
    }

    /// Check robots.txt before every request.
    pub fn with_robots(mut self, user_agent: impl Into<String>) -> Self {
        self.robots = Some(RobotsGate::new(user_agent, self.transport.clone(), self.clock.clone()));
        self
    }

    pub fn respects_robots(&self) -> bool {
        self.robots.is_some()
    }

    /// GET `url`, retrying per `policy`.
    ///
    /// # Errors
    ///
    /// Returns a non-retryable `FetchError` carrying the last attempt's cause
    /// once all attempts fail, or immediately if robots.txt disallows the URL.
    pub async fn get(
        &self, url: &Url, headers: &[(String, String)], policy: &RetryPolicy,
    ) -> Result<HttpResponse, FetchError> {
        if let Some(robots) = &self.robots
            && !robots.is_allowed(url).await
        {
            tracing::warn!(url = %url, "Request blocked by robots.txt");
            return Err(FetchError::fatal(url.as_str(), FetchCause::RobotsDisallowed, 0));
        }

        let request = HttpRequest { url: url.clone(), headers: headers.to_vec(), timeout: policy.timeout };
        let max_attempts = policy.max_attempts.max(1);
        let mut last_cause = FetchCause::Network("no attempt made".into());

        for attempt in 1..=max_attempts {
            tracing::debug!(url = %url, attempt, "Sending request");

            match self.transport.get(&request).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => last_cause = FetchCause::Status(response.status),
                Err(cause) => last_cause = cause,
            }

            if attempt < max_attempts {
                let delay = policy.backoff(attempt);
                let err = FetchError::retryable(url.as_str(), last_cause.clone(), attempt);
                tracing::warn!(
                    url = %url, attempt, retryable = err.retryable, error = %err,
                    delay_ms = delay.as_millis() as u64, "Request failed, retrying"
                );
                self.clock.sleep(delay).await;
            }
        }

        Err(FetchError::fatal(url.as_str(), last_cause, max_attempts))
    }
}
