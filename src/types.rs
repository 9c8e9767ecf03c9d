//! Types for the SMA price tracker

use crate::error::ErrorKind;
use chrono::{DateTime, Utc};

/// Timestamp layout used in report lines (no timezone suffix)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Coin being tracked, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinIdentity {
    /// Provider identifier, lower-cased (e.g. "bitcoin")
    pub name: String,

    /// Trading symbol, upper-cased (e.g. "BTC")
    pub symbol: String,
}

impl CoinIdentity {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into().to_uppercase(),
        }
    }
}

/// A single price observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Price in USD
    pub price: f64,

    /// Server-side last update time, second precision
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(price: f64, observed_at: DateTime<Utc>) -> Self {
        Self { price, observed_at }
    }

    /// Creates an observation from a unix timestamp in seconds
    ///
    /// Returns `None` when the timestamp is outside chrono's representable range.
    pub fn from_unix(price: f64, unix_secs: i64) -> Option<Self> {
        DateTime::from_timestamp(unix_secs, 0).map(|observed_at| Self::new(price, observed_at))
    }

    /// Renders the observation time as `YYYY-MM-DDTHH:MM:SS`
    pub fn timestamp_label(&self) -> String {
        self.observed_at.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Lifecycle of the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Resolving the coin symbol
    Starting,
    /// Steady-state fetch/accumulate/report cycle
    Polling,
    /// Terminal state
    Stopped,
}

/// Why the poll loop reached `Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown was requested, either between cycles or during a retry
    Shutdown,
    /// A terminal error ended the run
    Failed(ErrorKind),
}
