//! Fetch metrics collection and reporting
//!
//! Tracks attempt latencies, success rate, and how often the retrier had to back
//! off or emit a diagnostic.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Snapshot of fetch metrics
#[derive(Debug, Clone, PartialEq)]
pub struct FetchMetrics {
    /// 50th percentile latency of successful attempts in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful attempts in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate over all attempts (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of remote attempts
    pub total_attempts: u64,
    /// Number of failed attempts
    pub failed_attempts: u64,
    /// Number of backoff sleeps scheduled
    pub retries: u64,
    /// Number of periodic diagnostic lines emitted
    pub diagnostics: u64,
}

impl FetchMetrics {
    /// Creates metrics with no data
    pub fn empty() -> Self {
        Self {
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_attempts: 0,
            failed_attempts: 0,
            retries: 0,
            diagnostics: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

#[derive(Debug, Default)]
struct Counters {
    total_attempts: u64,
    failed_attempts: u64,
    retries: u64,
    diagnostics: u64,
}

/// Collects and computes fetch metrics
#[derive(Debug, Default)]
pub struct MetricsCollector {
    /// Rolling window of latency samples
    samples: RwLock<VecDeque<LatencySample>>,
    /// Lifetime counters
    counters: RwLock<Counters>,
}

impl MetricsCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            samples: RwLock::new(VecDeque::with_capacity(MAX_SAMPLES)),
            counters: RwLock::new(Counters::default()),
        })
    }

    /// Records a remote attempt with its duration and outcome
    pub async fn record_attempt(&self, duration: Duration, success: bool) {
        {
            let mut counters = self.counters.write().await;
            counters.total_attempts += 1;
            if !success {
                counters.failed_attempts += 1;
            }
        }

        let mut samples = self.samples.write().await;
        if samples.len() >= MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(LatencySample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
        });
    }

    pub async fn record_retry(&self) {
        self.counters.write().await.retries += 1;
    }

    pub async fn record_diagnostic(&self) {
        self.counters.write().await.diagnostics += 1;
    }

    /// Computes current metrics from collected samples
    pub async fn snapshot(&self) -> FetchMetrics {
        let samples = self.samples.read().await;
        let counters = self.counters.read().await;

        if counters.total_attempts == 0 {
            return FetchMetrics::empty();
        }

        let mut latencies: Vec<f64> = samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let success_rate = (counters.total_attempts - counters.failed_attempts) as f64
            / counters.total_attempts as f64;

        FetchMetrics {
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_attempts: counters.total_attempts,
            failed_attempts: counters.failed_attempts,
            retries: counters.retries,
            diagnostics: counters.diagnostics,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
