use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of most recent calls kept in the rolling window.
    pub window_size: usize,
    /// Rates are not evaluated until this many calls have been observed.
    pub min_calls: usize,
    /// Failure rate at or above which the circuit opens.
    pub failure_rate_threshold: f64,
    /// Slow-call rate at or above which the circuit opens.
    pub slow_rate_threshold: f64,
    /// A call slower than this counts as slow even if it succeeds.
    pub slow_call_threshold: Duration,
    /// How long the circuit stays open before probing half-open.
    pub open_duration: Duration,
    /// Hard per-call timeout; a timeout counts as both failed and slow.
    pub call_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            min_calls: 5,
            failure_rate_threshold: 0.5,
            slow_rate_threshold: 0.5,
            slow_call_threshold: Duration::from_secs(3),
            open_duration: Duration::from_secs(10),
            call_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CallOutcome {
    failed: bool,
    slow: bool,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    window: VecDeque<CallOutcome>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

// No code path holds the lock across an await or can panic while
// holding it, so a poisoned lock still carries consistent state.
fn lock(inner: &Mutex<BreakerInner>) -> MutexGuard<'_, BreakerInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of admission control for one call.
enum Admission {
    Rejected,
    Call,
    Probe,
}

/// Holds the half-open probe slot while the admitted probe is in
/// flight. Callers can be cancelled at any await point (a client
/// disconnect drops the handler future), and a dropped probe never
/// reaches `record`; releasing the slot on drop lets the next call
/// become the probe instead of leaving the breaker wedged in HalfOpen.
struct ProbeSlot {
    inner: Arc<Mutex<BreakerInner>>,
    armed: bool,
}

impl ProbeSlot {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeSlot {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = lock(&self.inner);
        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }
}

/// Rolling-window circuit breaker for external service calls.
///
/// Opens when, over the last `window_size` calls (at least `min_calls`
/// observed), the failure rate or the slow-call rate reaches its
/// threshold. While open, calls fail fast without touching the network.
/// After `open_duration` the breaker admits exactly one half-open probe:
/// success closes the circuit (window reset), failure reopens it.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerInner>>,
}

impl CircuitBreaker {
    pub fn new(name: String, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            inner: Arc::new(Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                probe_in_flight: false,
            })),
        }
    }

    /// Execute a function with circuit breaker protection
    pub async fn call<F, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        let mut probe_slot = match self.acquire() {
            Admission::Rejected => {
                tracing::debug!(service = %self.name, "Circuit open, failing fast");
                return Err(CircuitBreakerError::Open);
            }
            Admission::Call => None,
            Admission::Probe => Some(ProbeSlot {
                inner: Arc::clone(&self.inner),
                armed: true,
            }),
        };

        let start = Instant::now();
        let result = tokio::time::timeout(self.config.call_timeout, f).await;
        if let Some(slot) = probe_slot.as_mut() {
            // Past the await: the outcome is recorded normally below
            slot.disarm();
        }
        let elapsed = start.elapsed();
        let slow = elapsed > self.config.slow_call_threshold;

        match result {
            Ok(Ok(value)) => {
                self.record(CallOutcome { failed: false, slow });
                tracing::debug!(
                    service = %self.name,
                    duration_ms = %elapsed.as_millis(),
                    "Circuit breaker call succeeded"
                );
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record(CallOutcome { failed: true, slow });
                tracing::warn!(
                    service = %self.name,
                    duration_ms = %elapsed.as_millis(),
                    "Circuit breaker call failed"
                );
                Err(CircuitBreakerError::CallFailed(err))
            }
            Err(_) => {
                self.record(CallOutcome { failed: true, slow: true });
                tracing::error!(
                    service = %self.name,
                    timeout_secs = %self.config.call_timeout.as_secs(),
                    "Circuit breaker call timed out"
                );
                Err(CircuitBreakerError::Timeout)
            }
        }
    }

    /// Decide whether a call may proceed, transitioning Open -> HalfOpen
    /// once the cooldown has elapsed. In HalfOpen only a single probe is
    /// admitted until its outcome is recorded or its future is dropped.
    fn acquire(&self) -> Admission {
        let mut inner = lock(&self.inner);

        match inner.state {
            CircuitState::Closed => Admission::Call,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);

                if elapsed >= self.config.open_duration {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    tracing::info!(service = %self.name, "Circuit breaker transitioned to HalfOpen");
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Admission::Rejected
                } else {
                    inner.probe_in_flight = true;
                    Admission::Probe
                }
            }
        }
    }

    fn record(&self, outcome: CallOutcome) {
        let mut inner = lock(&self.inner);

        match inner.state {
            CircuitState::HalfOpen => {
                inner.probe_in_flight = false;
                if outcome.failed {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(service = %self.name, "Circuit breaker reopened from HalfOpen");
                } else {
                    inner.state = CircuitState::Closed;
                    inner.window.clear();
                    tracing::info!(service = %self.name, "Circuit breaker transitioned to Closed");
                }
            }
            CircuitState::Closed => {
                if inner.window.len() == self.config.window_size {
                    inner.window.pop_front();
                }
                inner.window.push_back(outcome);

                if inner.window.len() >= self.config.min_calls {
                    let total = inner.window.len() as f64;
                    let failed = inner.window.iter().filter(|o| o.failed).count() as f64;
                    let slow = inner.window.iter().filter(|o| o.slow).count() as f64;

                    if failed / total >= self.config.failure_rate_threshold
                        || slow / total >= self.config.slow_rate_threshold
                    {
                        inner.state = CircuitState::Open;
                        inner.opened_at = Some(Instant::now());
                        inner.window.clear();
                        tracing::warn!(
                            service = %self.name,
                            failure_rate = failed / total,
                            slow_rate = slow / total,
                            "Circuit breaker opened"
                        );
                    }
                }
            }
            CircuitState::Open => {
                // A call that was already in flight when the circuit
                // opened; its outcome no longer changes the state.
            }
        }
    }

    /// Get current state (for testing/monitoring)
    pub async fn state(&self) -> CircuitState {
        lock(&self.inner).state
    }

    /// Reset the circuit breaker (useful for testing)
    pub async fn reset(&self) {
        let mut inner = lock(&self.inner);
        inner.state = CircuitState::Closed;
        inner.window.clear();
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("Circuit breaker is open")]
    Open,

    #[error("Call timed out")]
    Timeout,

    #[error("Call failed: {0}")]
    CallFailed(E),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("Test error")]
    struct TestError;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            window_size: 10,
            min_calls: 5,
            failure_rate_threshold: 0.5,
            slow_rate_threshold: 0.5,
            slow_call_threshold: Duration::from_secs(3),
            open_duration: Duration::from_secs(10),
            call_timeout: Duration::from_secs(10),
        }
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("test-service".to_string(), test_config())
    }

    #[tokio::test]
    async fn test_call_success() {
        let cb = breaker();

        let result = cb.call(async { Ok::<_, TestError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_stays_closed_below_min_calls() {
        let cb = breaker();

        // 4 failures straight, but rates are not evaluated until 5 calls
        for _ in 0..4 {
            let _ = cb.call(async { Err::<i32, _>(TestError) }).await;
        }

        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_opens_at_failure_rate() {
        let cb = breaker();

        for _ in 0..5 {
            let _ = cb.call(async { Err::<i32, _>(TestError) }).await;
        }

        assert_eq!(cb.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_open_fails_fast_without_calling() {
        let cb = breaker();

        for _ in 0..5 {
            let _ = cb.call(async { Err::<i32, _>(TestError) }).await;
        }

        let called = std::sync::atomic::AtomicBool::new(false);
        let result = cb
            .call(async {
                called.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, TestError>(42)
            })
            .await;

        assert!(matches!(result, Err(CircuitBreakerError::Open)));
        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_on_slow_calls() {
        let cb = breaker();

        // Successful but slow calls (paused clock auto-advances timers)
        for _ in 0..5 {
            let _ = cb
                .call(async {
                    tokio::time::sleep(Duration::from_secs(4)).await;
                    Ok::<_, TestError>(1)
                })
                .await;
        }

        assert_eq!(cb.state().await, CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let cb = CircuitBreaker::new(
            "test-service".to_string(),
            CircuitBreakerConfig {
                call_timeout: Duration::from_millis(100),
                ..test_config()
            },
        );

        let result = cb
            .call(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, TestError>(42)
            })
            .await;

        assert!(matches!(result, Err(CircuitBreakerError::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_probe_success_closes() {
        let cb = breaker();

        for _ in 0..5 {
            let _ = cb.call(async { Err::<i32, _>(TestError) }).await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_secs(11)).await;

        let result = cb.call(async { Ok::<_, TestError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_probe_failure_reopens() {
        let cb = breaker();

        for _ in 0..5 {
            let _ = cb.call(async { Err::<i32, _>(TestError) }).await;
        }

        tokio::time::sleep(Duration::from_secs(11)).await;

        let _ = cb.call(async { Err::<i32, _>(TestError) }).await;
        assert_eq!(cb.state().await, CircuitState::Open);

        // Still open right after the failed probe
        let result = cb.call(async { Ok::<_, TestError>(1) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_single_probe() {
        let cb = Arc::new(breaker());

        for _ in 0..5 {
            let _ = cb.call(async { Err::<i32, _>(TestError) }).await;
        }

        tokio::time::sleep(Duration::from_secs(11)).await;

        // First call becomes the probe and holds the slot
        let probe_cb = cb.clone();
        let probe = tokio::spawn(async move {
            probe_cb
                .call(async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok::<_, TestError>(1)
                })
                .await
        });
        tokio::task::yield_now().await;

        // Second call while the probe is in flight is rejected
        let result = cb.call(async { Ok::<_, TestError>(2) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open)));

        assert_eq!(probe.await.unwrap().unwrap(), 1);
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_probe_releases_slot() {
        let cb = Arc::new(breaker());

        for _ in 0..5 {
            let _ = cb.call(async { Err::<i32, _>(TestError) }).await;
        }

        tokio::time::sleep(Duration::from_secs(11)).await;

        // Admit a probe and drop its future mid-flight, as a client
        // disconnect would
        let probe_cb = cb.clone();
        let probe = tokio::spawn(async move {
            probe_cb
                .call(async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, TestError>(1)
                })
                .await
        });
        tokio::task::yield_now().await;
        probe.abort();
        let _ = probe.await;

        // The slot is free again; the next call becomes the new probe
        // and closes the circuit
        let result = cb.call(async { Ok::<_, TestError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_reset() {
        let cb = breaker();

        for _ in 0..5 {
            let _ = cb.call(async { Err::<i32, _>(TestError) }).await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        cb.reset().await;

        let result = cb.call(async { Ok::<_, TestError>(42) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_config_default() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.window_size, 10);
        assert_eq!(config.min_calls, 5);
        assert_eq!(config.open_duration, Duration::from_secs(10));
        assert_eq!(config.slow_call_threshold, Duration::from_secs(3));
    }
}
