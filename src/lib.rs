//! # SMA Price Tracker
//!
//! Polls the live price of a single cryptocurrency from CoinGecko and reports
//! each observation alongside a simple moving average (SMA) over the most
//! recent prices.
//!
//! ## Architecture
//!
//! ```text
//! PriceTracker (poll loop, 1s cadence)
//!     ↓
//! Retrier (exponential backoff 1s → 900s, diagnostics every 5th attempt)
//!     ↓
//! MarketPriceProvider (CoinGecko)
//!     ↓
//! SlidingWindow (SMA) → ReportSink (stdout)
//! ```
//!
//! A [`ShutdownCoordinator`] is shared by every layer: once Ctrl-C flips it,
//! no new request is issued and pending sleeps return early.
//!
//! ## Usage
//!
//! ```no_run
//! use sma_price_tracker::{
//!     providers::CoinGeckoProvider, report::StdoutSink, PriceTracker, ShutdownCoordinator,
//!     TrackerConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let shutdown = ShutdownCoordinator::new();
//! let config = TrackerConfig {
//!     coin: "solana".to_string(),
//!     window: 5,
//!     ..TrackerConfig::default()
//! };
//! let provider = Arc::new(CoinGeckoProvider::new(&config.api_url, shutdown.clone())?);
//!
//! let mut tracker = PriceTracker::new(config, provider, shutdown, StdoutSink)?;
//! let cycles = tracker.run().await?;
//! println!("stopped after {} cycles", cycles);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod report;
pub mod retry;
pub mod shutdown;
pub mod tracker;
pub mod types;
pub mod window;

// Re-export commonly used types
pub use config::{Cli, TrackerConfig};
pub use error::{ErrorKind, TrackerError};
pub use metrics::FetchMetrics;
pub use retry::{Retrier, RetryPolicy};
pub use shutdown::ShutdownCoordinator;
pub use tracker::PriceTracker;
pub use types::{CoinIdentity, Observation, PollState, StopReason};
pub use window::SlidingWindow;
