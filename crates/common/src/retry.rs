use std::future::Future;
use std::time::Duration;

/// Retry policy with exponential backoff. Only errors the caller's
/// predicate classifies as transient are retried; business failures
/// propagate immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the given retry (1-based): initial * 2^(retry-1),
    /// capped at max_backoff.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Run `op` under the retry policy, backing off between attempts.
/// The operation is re-invoked for each attempt so the caller can
/// rebuild the request future.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    name: &str,
    is_transient: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation = name, attempt, "Retried operation succeeded");
                }
                return Ok(value);
            }
            Err(err) if attempt < policy.max_attempts && is_transient(&err) => {
                let backoff = policy.backoff_for(attempt);
                tracing::warn!(
                    operation = name,
                    attempt,
                    backoff_ms = %backoff.as_millis(),
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => {
                if attempt > 1 {
                    tracing::error!(
                        operation = name,
                        attempt,
                        error = %err,
                        "Operation failed after retries"
                    );
                }
                return Err(err);
            }
        }
    }
}
