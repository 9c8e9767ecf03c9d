//! Report line formatting

use crate::types::{CoinIdentity, Observation};
use std::fmt;

/// Formats a USD amount with thousands separators and two decimals
///
/// `67000.5` renders as `$67,000.50`, `-1234.567` as `-$1,234.57`.
pub fn format_usd(amount: f64) -> String {
    if !amount.is_finite() {
        return format!("${amount}");
    }

    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    // "-0.00" would read oddly, so only flag amounts that survive rounding
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}

/// One successful polling cycle, ready to print
#[derive(Debug, Clone, PartialEq)]
pub struct PriceReport<'a> {
    pub coin: &'a CoinIdentity,
    pub observation: Observation,
    pub count: usize,
    pub average: f64,
}

impl fmt::Display for PriceReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} → USD: {}: SMA({}): {}",
            self.observation.timestamp_label(),
            self.coin.symbol,
            format_usd(self.observation.price),
            self.count,
            format_usd(self.average)
        )
    }
}

/// Destination for report lines
pub trait ReportSink {
    fn emit(&mut self, line: &str);
}

/// Writes report lines to stdout, keeping them apart from the log stream
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn emit(&mut self, line: &str) {
        println!("{line}");
    }
}
