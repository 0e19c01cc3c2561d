//! Price records and the minimal price-point view the engine reads.

use chrono::{DateTime, Utc};

/// What the exchange and driver need from a tick.
///
/// Richer records (OHLCV bars, quotes) implement this and carry the rest
/// through to the strategy untouched.
pub trait PricePoint: Clone {
    fn ticker(&self) -> &str;
    fn open(&self) -> f64;
    /// Milliseconds since the Unix epoch.
    fn window_start(&self) -> i64;
}

/// One aggregated OHLCV window for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub ticker: String,
    pub volume: i64,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub window_start: i64,
    pub transactions: i64,
}

impl PriceRecord {
    pub fn window_start_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.window_start)
    }
}

impl PricePoint for PriceRecord {
    fn ticker(&self) -> &str {
        &self.ticker
    }

    fn open(&self) -> f64 {
        self.open
    }

    fn window_start(&self) -> i64 {
        self.window_start
    }
}
