//! Runtime configuration
//!
//! Command-line flags (with environment fallbacks) are parsed by [`Cli`] and
//! validated into a [`TrackerConfig`].

use crate::{
    constants::{COINGECKO_API_URL, DEFAULT_COIN, DEFAULT_SMA_WINDOW, POLL_INTERVAL_SECS},
    error::TrackerError,
    retry::RetryPolicy,
};
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "sma-tracker")]
#[command(version)]
#[command(about = "Track live crypto price with SMA.", long_about = None)]
pub struct Cli {
    /// CoinGecko coin name ('solana', 'bitcoin', 'ethereum', etc.)
    #[arg(long, env = "SMA_TRACKER_COIN", default_value = DEFAULT_COIN)]
    pub coin: String,

    /// Number of prices to use for SMA
    #[arg(long, env = "SMA_TRACKER_WINDOW", default_value_t = DEFAULT_SMA_WINDOW)]
    pub sma: usize,

    /// CoinGecko API base URL
    #[arg(long, env = "COINGECKO_API_URL", default_value = COINGECKO_API_URL)]
    pub api_url: String,

    /// Seconds to wait between two successful polls
    #[arg(long, default_value_t = POLL_INTERVAL_SECS)]
    pub interval_secs: u64,
}

impl Cli {
    pub fn into_config(self) -> Result<TrackerConfig, TrackerError> {
        TrackerConfig {
            coin: self.coin,
            window: self.sma,
            api_url: self.api_url,
            poll_interval: Duration::from_secs(self.interval_secs),
            retry: RetryPolicy::default(),
        }
        .validated()
    }
}

/// Validated tracker configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Provider coin identifier, lower-cased
    pub coin: String,
    /// SMA window capacity, at least 1
    pub window: usize,
    /// Provider API root
    pub api_url: String,
    /// Delay between successful cycles
    pub poll_interval: Duration,
    /// Backoff policy for remote calls
    pub retry: RetryPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            coin: DEFAULT_COIN.to_string(),
            window: DEFAULT_SMA_WINDOW,
            api_url: COINGECKO_API_URL.to_string(),
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl TrackerConfig {
    /// Normalizes the coin identifier and rejects unusable values
    pub fn validated(mut self) -> Result<Self, TrackerError> {
        self.coin = self.coin.trim().to_lowercase();
        if self.coin.is_empty() {
            return Err(TrackerError::invalid_config("coin identifier must not be empty"));
        }
        if self.window == 0 {
            return Err(TrackerError::invalid_config(
                "SMA window size must be a positive integer",
            ));
        }
        if self.retry.base > self.retry.ceiling {
            return Err(TrackerError::invalid_config(
                "initial backoff must not exceed the backoff ceiling",
            ));
        }
        Ok(self)
    }
}
