//! Shared HTTP helpers for the network providers.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry schedule for transient HTTP failures.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1 << (attempt - 1))
    }
}

/// Retries an HTTP request with exponential backoff on transient failures.
///
/// Retries on transport errors and 5xx responses. Returns immediately on
/// success or 4xx (client errors that won't resolve with retries).
pub async fn retry_request<F, Fut>(
    policy: RetryPolicy,
    mut make_request: F,
) -> reqwest::Result<reqwest::Response>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = reqwest::Result<reqwest::Response>>,
{
    let mut attempt = 0;

    loop {
        match make_request().await {
            Ok(response) if response.status().is_server_error() => {
                attempt += 1;
                if attempt > policy.max_retries {
                    return Ok(response);
                }
                let delay = policy.delay(attempt);
                warn!(
                    status = %response.status(),
                    delay_ms = delay.as_millis() as u64,
                    "Server error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Ok(response) => return Ok(response),
            Err(e) => {
                attempt += 1;
                if attempt > policy.max_retries {
                    return Err(e);
                }
                let delay = policy.delay(attempt);
                warn!(error = %e, delay_ms = delay.as_millis() as u64, "Request error, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Turn a non-success response into a provider error carrying its body.
pub async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> crate::StorageResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(crate::StorageError::Provider(format!(
        "{provider} returned {status}: {}",
        body.trim()
    )))
}

/// Join a base URL and a path segment with exactly one slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://gw.test/", "/abc"), "https://gw.test/abc");
        assert_eq!(join_url("https://gw.test", "ipfs/Qm"), "https://gw.test/ipfs/Qm");
    }
}
