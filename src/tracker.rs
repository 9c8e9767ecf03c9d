//! Price tracker poll loop
//!
//! Resolves the coin symbol once, then fetches the price on a fixed cadence,
//! feeds it into the SMA window and emits one report line per cycle until
//! shutdown or a terminal error.

use crate::{
    config::TrackerConfig,
    error::TrackerError,
    metrics::{FetchMetrics, MetricsCollector},
    provider::MarketPriceProvider,
    report::{PriceReport, ReportSink},
    retry::Retrier,
    shutdown::ShutdownCoordinator,
    types::{CoinIdentity, PollState, StopReason},
    window::SlidingWindow,
};
use std::sync::Arc;

/// Single-coin price tracker
///
/// # Example
/// ```no_run
/// use sma_price_tracker::{
///     providers::CoinGeckoProvider, report::StdoutSink, PriceTracker, ShutdownCoordinator,
///     TrackerConfig,
/// };
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let shutdown = ShutdownCoordinator::new();
/// shutdown.listen_for_ctrl_c();
///
/// let config = TrackerConfig::default();
/// let provider = Arc::new(CoinGeckoProvider::new(&config.api_url, shutdown.clone())?);
/// let mut tracker = PriceTracker::new(config, provider, shutdown, StdoutSink)?;
/// tracker.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct PriceTracker<S: ReportSink> {
    config: TrackerConfig,
    provider: Arc<dyn MarketPriceProvider>,
    retrier: Retrier,
    shutdown: ShutdownCoordinator,
    metrics: Arc<MetricsCollector>,
    window: SlidingWindow,
    state: PollState,
    stop_reason: Option<StopReason>,
    sink: S,
}

impl<S: ReportSink> PriceTracker<S> {
    /// Creates a tracker in the `Starting` state
    ///
    /// Fails with `InvalidConfig` if the window capacity is zero.
    pub fn new(
        config: TrackerConfig,
        provider: Arc<dyn MarketPriceProvider>,
        shutdown: ShutdownCoordinator,
        sink: S,
    ) -> Result<Self, TrackerError> {
        let config = config.validated()?;
        let window = SlidingWindow::new(config.window)?;
        let metrics = MetricsCollector::new();
        let retrier = Retrier::new(config.retry, shutdown.clone(), metrics.clone());

        Ok(Self {
            config,
            provider,
            retrier,
            shutdown,
            metrics,
            window,
            state: PollState::Starting,
            stop_reason: None,
            sink,
        })
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Set once the tracker reaches `Stopped`
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub async fn metrics(&self) -> FetchMetrics {
        self.metrics.snapshot().await
    }

    /// Resolves the coin symbol, retrying transient failures
    pub async fn resolve_coin(&self) -> Result<CoinIdentity, TrackerError> {
        let provider = self.provider.as_ref();
        let coin = self.config.coin.as_str();

        let symbol = self
            .retrier
            .call("resolve_symbol", move || provider.resolve_symbol(coin))
            .await?;

        Ok(CoinIdentity::new(coin, symbol))
    }

    /// Runs one fetch/accumulate/report cycle
    ///
    /// Returns the window occupancy and the moving average after the push.
    pub async fn poll_once(&mut self, coin: &CoinIdentity) -> Result<(usize, f64), TrackerError> {
        let provider = self.provider.as_ref();
        let name = coin.name.as_str();

        let observation = self
            .retrier
            .call("fetch_price", move || provider.fetch_price(name))
            .await?;

        let (count, average) = self.window.push(observation.price);
        let report = PriceReport {
            coin,
            observation,
            count,
            average,
        };
        self.sink.emit(&report.to_string());

        Ok((count, average))
    }

    /// Drives the tracker until shutdown or a terminal error
    ///
    /// Returns the number of completed cycles. A cooperative shutdown is not an
    /// error; every other terminal failure is logged once and returned.
    pub async fn run(&mut self) -> Result<u64, TrackerError> {
        tracing::info!(
            coin = %self.config.coin,
            window = self.config.window,
            provider = self.provider.provider_name(),
            "Price tracker is starting"
        );

        let result = match self.resolve_coin().await {
            Ok(coin) => {
                tracing::info!(coin = %coin.name, symbol = %coin.symbol, "Resolved coin symbol");
                self.state = PollState::Polling;
                self.poll_until_stopped(&coin).await
            }
            Err(e) => Err((0, e)),
        };
        self.state = PollState::Stopped;

        let metrics = self.metrics.snapshot().await;
        // Both shutdown paths (flag seen between cycles, or a retry cut short)
        // end up here and log the same single line.
        let (reason, outcome) = match result {
            Ok(cycles) => (StopReason::Shutdown, Ok(cycles)),
            Err((cycles, e)) if e.is_shutdown() => (StopReason::Shutdown, Ok(cycles)),
            Err((_, e)) => (StopReason::Failed(e.kind()), Err(e)),
        };
        match &outcome {
            Ok(_) => tracing::warn!("Shutdown requested, stopping price tracker"),
            Err(e) => tracing::error!("{}", e),
        }
        self.stop_reason = Some(reason);

        tracing::info!(
            cycles = outcome.as_ref().copied().unwrap_or_default(),
            attempts = metrics.total_attempts,
            retries = metrics.retries,
            success_rate = metrics.success_rate,
            latency_p50_ms = metrics.latency_p50_ms,
            latency_p99_ms = metrics.latency_p99_ms,
            "Price tracker stopped"
        );

        outcome
    }

    async fn poll_until_stopped(&mut self, coin: &CoinIdentity) -> Result<u64, (u64, TrackerError)> {
        let mut cycles = 0u64;

        while !self.shutdown.is_shutdown_requested() {
            self.poll_once(coin).await.map_err(|e| (cycles, e))?;
            cycles += 1;
            self.shutdown.sleep(self.config.poll_interval).await;
        }

        Ok(cycles)
    }
}
