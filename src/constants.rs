//! Constants for the SMA price tracker
//!
//! Compile-time defaults. Everything here can be overridden at runtime through
//! [`TrackerConfig`](crate::config::TrackerConfig) except the retry cadence.

/// Delay between two successful polling cycles (in seconds)
pub const POLL_INTERVAL_SECS: u64 = 1;

/// Default number of prices kept for the moving average
pub const DEFAULT_SMA_WINDOW: usize = 10;

/// Default coin to track
pub const DEFAULT_COIN: &str = "bitcoin";

/// First backoff delay after a failed attempt (in seconds)
pub const INITIAL_BACKOFF_SECS: u64 = 1;

/// Upper bound for a single backoff delay (in seconds)
pub const MAX_BACKOFF_SECS: u64 = 900;

/// A diagnostic line is logged every time the attempt number hits a multiple of this
pub const DIAGNOSTIC_EVERY_ATTEMPTS: u32 = 5;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko endpoint for coin metadata (symbol lookup)
pub const COINGECKO_COINS_ENDPOINT: &str = "/coins";

/// CoinGecko API endpoint for simple price queries
pub const COINGECKO_SIMPLE_PRICE_ENDPOINT: &str = "/simple/price";

/// Quote currency requested from the provider
pub const QUOTE_CURRENCY: &str = "usd";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "sma-price-tracker/0.1.0";
