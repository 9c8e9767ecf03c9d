//! Retry with exponential backoff
//!
//! [`Retrier::call`] runs a fallible async operation until it succeeds, fails
//! with a non-retryable error, or shutdown is requested. The delay curve and
//! diagnostic cadence live in [`RetryPolicy`] so callers and tests can swap them.

use crate::{
    constants::{DIAGNOSTIC_EVERY_ATTEMPTS, INITIAL_BACKOFF_SECS, MAX_BACKOFF_SECS},
    error::TrackerError,
    metrics::MetricsCollector,
    shutdown::ShutdownCoordinator,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Backoff curve and diagnostic cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failure
    pub base: Duration,
    /// Upper bound for any single delay
    pub ceiling: Duration,
    /// Log a diagnostic whenever the upcoming attempt number is a multiple of this (0 disables)
    pub diagnostic_every: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(INITIAL_BACKOFF_SECS),
            ceiling: Duration::from_secs(MAX_BACKOFF_SECS),
            diagnostic_every: DIAGNOSTIC_EVERY_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based)
    ///
    /// `min(ceiling, base * 2^(attempt - 1))`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.ceiling)
            .min(self.ceiling)
    }

    /// Whether a diagnostic line is due before starting attempt `attempt`
    pub fn is_diagnostic_due(&self, attempt: u32) -> bool {
        self.diagnostic_every != 0 && attempt % self.diagnostic_every == 0
    }
}

/// Bookkeeping for one logical call
#[derive(Debug)]
pub struct RetryState {
    /// Number of the attempt about to run (or running)
    pub attempt: u32,
    /// Most recent retryable failure
    pub last_error: Option<TrackerError>,
    /// Total time spent sleeping between attempts
    pub elapsed_backoff: Duration,
}

impl RetryState {
    fn new() -> Self {
        Self {
            attempt: 1,
            last_error: None,
            elapsed_backoff: Duration::ZERO,
        }
    }

    fn record_failure(&mut self, error: TrackerError, delay: Duration) {
        self.attempt = self.attempt.saturating_add(1);
        self.last_error = Some(error);
        self.elapsed_backoff += delay;
    }
}

/// Runs operations under a [`RetryPolicy`], honoring shutdown between attempts
#[derive(Debug, Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    shutdown: ShutdownCoordinator,
    metrics: Arc<MetricsCollector>,
}

impl Retrier {
    pub fn new(
        policy: RetryPolicy,
        shutdown: ShutdownCoordinator,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            policy,
            shutdown,
            metrics,
        }
    }

    /// Runs `operation` until it succeeds or fails terminally
    ///
    /// Retryable errors never reach the caller. Terminal errors are returned as
    /// soon as they happen. Once shutdown is requested no further attempt is
    /// started and `TrackerError::ShutdownRequested` is returned.
    pub async fn call<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, TrackerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TrackerError>>,
    {
        let mut state = RetryState::new();

        loop {
            self.shutdown.ensure_running()?;

            let started = Instant::now();
            let result = op().await;
            self.metrics
                .record_attempt(started.elapsed(), result.is_ok())
                .await;

            let error = match result {
                Ok(value) => {
                    if state.attempt > 1 {
                        tracing::info!(
                            operation,
                            attempt = state.attempt,
                            backoff_secs = state.elapsed_backoff.as_secs(),
                            "Recovered after retrying"
                        );
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            let delay = self.policy.delay_for(state.attempt);
            tracing::debug!(
                operation,
                attempt = state.attempt,
                delay_secs = delay.as_secs(),
                error = %error,
                "Attempt failed, backing off"
            );
            state.record_failure(error, delay);

            if self.policy.is_diagnostic_due(state.attempt) {
                if let Some(last) = &state.last_error {
                    tracing::error!(
                        operation,
                        attempt = state.attempt,
                        "{}",
                        last.diagnostic_message()
                    );
                    self.metrics.record_diagnostic().await;
                }
            }

            self.metrics.record_retry().await;
            if !self.shutdown.sleep(delay).await {
                return Err(TrackerError::ShutdownRequested);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn retrier(shutdown: ShutdownCoordinator) -> (Retrier, Arc<MetricsCollector>) {
        let metrics = MetricsCollector::new();
        (
            Retrier::new(RetryPolicy::default(), shutdown, metrics.clone()),
            metrics,
        )
    }

    #[test]
    fn test_delay_sequence_doubles_then_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=12).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 900, 900]);

        for attempt in [13, 31, 32, 64, 1_000, u32::MAX] {
            assert_eq!(policy.delay_for(attempt), Duration::from_secs(900));
        }
    }

    #[test]
    fn test_diagnostic_cadence() {
        let policy = RetryPolicy::default();
        let due: Vec<u32> = (1..=20).filter(|a| policy.is_diagnostic_due(*a)).collect();
        assert_eq!(due, vec![5, 10, 15, 20]);

        let silent = RetryPolicy {
            diagnostic_every: 0,
            ..RetryPolicy::default()
        };
        assert!(!silent.is_diagnostic_due(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_four_transient_failures() {
        let (retrier, metrics) = retrier(ShutdownCoordinator::new());
        let calls = AtomicU32::new(0);

        let start = Instant::now();
        let value = retrier
            .call("fetch_price", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 5 {
                        Err(TrackerError::api(503, "Service Unavailable"))
                    } else {
                        Ok(67000.5)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 67000.5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        // 1 + 2 + 4 + 8 seconds of backoff
        assert!(start.elapsed() >= Duration::from_secs(15));

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.diagnostics, 1);
        assert_eq!(snapshot.retries, 4);
        assert_eq!(snapshot.failed_attempts, 4);
        assert_eq!(snapshot.total_attempts, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_diagnostics_every_fifth_attempt() {
        let (retrier, metrics) = retrier(ShutdownCoordinator::new());
        let calls = AtomicU32::new(0);

        retrier
            .call("fetch_price", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n <= 10 {
                        Err(TrackerError::InvalidBody("<html>".into()))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 11);
        assert_eq!(metrics.snapshot().await.diagnostics, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_is_not_retried() {
        let (retrier, metrics) = retrier(ShutdownCoordinator::new());
        let calls = AtomicU32::new(0);

        let err = retrier
            .call("resolve_symbol", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<String, _>(TrackerError::not_found("notacoin")) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, TrackerError::NotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.snapshot().await.retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_call_after_shutdown() {
        let shutdown = ShutdownCoordinator::new();
        shutdown.request_shutdown();
        let (retrier, _) = retrier(shutdown);
        let calls = AtomicU32::new(0);

        let err = retrier
            .call("fetch_price", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, TrackerError>(()) }
            })
            .await
            .unwrap_err();

        assert!(err.is_shutdown());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_backoff_stops_retrying() {
        let shutdown = ShutdownCoordinator::new();
        let (retrier, _) = retrier(shutdown.clone());
        let calls = AtomicU32::new(0);

        let err = retrier
            .call("fetch_price", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                let shutdown = shutdown.clone();
                async move {
                    if n == 3 {
                        shutdown.request_shutdown();
                    }
                    Err::<(), _>(TrackerError::api(500, "Internal Server Error"))
                }
            })
            .await
            .unwrap_err();

        assert!(err.is_shutdown());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
