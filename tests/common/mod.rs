#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tradereplay::domain::error::TradeReplayError;
use tradereplay::domain::exchange::Exchange;
pub use tradereplay::domain::price::PriceRecord;
use tradereplay::domain::stream::PriceSeries;
use tradereplay::ports::data_port::DataPort;

pub const BUDGET: f64 = 1_000_000_000.0;
pub const CSV_HEADER: &str = "ticker,volume,open,close,high,low,window_start,transactions\n";

/// In-memory data source. `failure` makes every load fail with `MissingData`.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceRecord>>,
    pub failure: Option<String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            failure: None,
        }
    }

    pub fn with_opens(mut self, ticker: &str, opens: &[f64]) -> Self {
        self.data.insert(ticker.to_string(), make_records(ticker, opens));
        self
    }

    pub fn failing(mut self, reason: &str) -> Self {
        self.failure = Some(reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn load_series(&self) -> Result<PriceSeries, TradeReplayError> {
        if let Some(reason) = &self.failure {
            return Err(TradeReplayError::MissingData {
                reason: reason.clone(),
            });
        }
        PriceSeries::new(self.data.clone())
    }
}

pub fn make_record(ticker: &str, open: f64, window_start: i64) -> PriceRecord {
    PriceRecord {
        ticker: ticker.to_string(),
        volume: 1_000,
        open,
        close: open,
        high: open,
        low: open,
        window_start,
        transactions: 10,
    }
}

/// One record per open, one minute apart from 2024-01-02 14:30 UTC.
pub fn make_records(ticker: &str, opens: &[f64]) -> Vec<PriceRecord> {
    opens
        .iter()
        .enumerate()
        .map(|(i, &open)| make_record(ticker, open, 1_704_205_800_000 + i as i64 * 60_000))
        .collect()
}

pub fn exchange() -> Exchange {
    Exchange::new(BUDGET)
}

/// Write a CSV aggregate file with the given per-row `(ticker, open, window_start)`.
pub fn write_csv(path: &Path, rows: &[(&str, f64, i64)]) {
    let mut content = String::from(CSV_HEADER);
    for (ticker, open, ts) in rows {
        content.push_str(&format!(
            "{ticker},1000,{open},{open},{open},{open},{ts},10\n"
        ));
    }
    fs::write(path, content).unwrap();
}
