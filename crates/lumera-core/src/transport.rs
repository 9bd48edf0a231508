//! Resilient outbound HTTP: per-attempt timeout, retry with jittered
//! exponential backoff, and translation of failed responses into
//! [`UpstreamError`].
//!
//! The transport is stateless across calls. Cancellation is the usual tokio
//! contract: dropping the returned future aborts the in-flight attempt and
//! any pending backoff sleep.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;

use crate::error::{GatewayError, Result, UpstreamError, extract_message};

/// Retry behavior for one upstream service.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `3` means up to four attempts total.
    pub max_retries: u32,
    /// Budget for a single attempt, not the whole call.
    pub per_try_timeout: Duration,
    /// Base backoff; delay before attempt n+1 is `base * 2^(n-1) + jitter`.
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            per_try_timeout: Duration::from_secs(4),
            base_delay: Duration::from_millis(200),
            max_jitter: Duration::from_millis(120),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_per_try_timeout(mut self, timeout: Duration) -> Self {
        self.per_try_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Delay before the attempt following `attempt` (1-based):
    /// 200ms, 400ms, 800ms... plus up to `max_jitter` of random spread.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = (self.base_delay.as_millis() as u64)
            .saturating_mul(1u64 << (attempt - 1).min(16));
        let jitter_ms = match self.max_jitter.as_millis() as u64 {
            0 => 0,
            cap => rand::thread_rng().gen_range(0..cap),
        };
        Duration::from_millis(base_ms + jitter_ms)
    }
}

/// A response status worth another attempt: throttling, request timeout, or
/// any server-side failure.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Sends a request with retries, returning the successful response or a
/// translated [`UpstreamError`].
///
/// Retry happens iff attempts remain and the attempt timed out, failed at
/// the connection level, or answered 429/408/5xx. Anything else is
/// translated and surfaced immediately, including the final failure once
/// the retry budget is spent.
pub async fn send_with_retry(
    service: &'static str,
    policy: &RetryPolicy,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let req = request
            .try_clone()
            .ok_or_else(|| GatewayError::internal("request body is not cloneable"))?;

        match tokio::time::timeout(policy.per_try_timeout, req.send()).await {
            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                if !is_retryable_status(status) || attempt > policy.max_retries {
                    return Err(translate_failure(service, response).await.into());
                }
                tracing::debug!(
                    service,
                    status = status.as_u16(),
                    attempt,
                    "retryable upstream status"
                );
            }
            Ok(Err(e)) => {
                if attempt > policy.max_retries {
                    return Err(UpstreamError::Network {
                        service,
                        detail: e.to_string(),
                    }
                    .into());
                }
                tracing::debug!(service, error = %e, attempt, "retrying after connection error");
            }
            Err(_) => {
                if attempt > policy.max_retries {
                    return Err(UpstreamError::Timeout { service }.into());
                }
                tracing::debug!(service, attempt, "attempt timed out, retrying");
            }
        }

        tokio::time::sleep(policy.backoff_delay(attempt)).await;
    }
}

/// Turns a failed response into a typed error, capturing the body
/// best-effort and extracting a JSON `message` field when present.
async fn translate_failure(service: &'static str, response: reqwest::Response) -> UpstreamError {
    let status = response.status().as_u16();
    let body = response.text().await.ok().filter(|b| !b.is_empty());
    let message = body.as_deref().and_then(extract_message);
    tracing::warn!(service, status, "upstream call failed");
    UpstreamError::Status {
        service,
        status,
        body,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::REQUEST_TIMEOUT));
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn backoff_doubles_with_bounded_jitter() {
        let policy = RetryPolicy::default();
        for (attempt, base) in [(1u32, 200u64), (2, 400), (3, 800)] {
            let delay = policy.backoff_delay(attempt).as_millis() as u64;
            assert!(
                (base..base + 120).contains(&delay),
                "attempt {attempt}: {delay}ms outside [{base}, {})",
                base + 120
            );
        }
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let policy = RetryPolicy {
            max_jitter: Duration::ZERO,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(400));
    }
}
