//! Per-ticker price series and the row-synchronized replay stream.

use std::collections::HashMap;
use std::vec;

use super::error::TradeReplayError;
use super::price::{PricePoint, PriceRecord};

/// Validated ticker → ordered records mapping. Every ticker has the same
/// number of rows.
#[derive(Debug, Clone)]
pub struct PriceSeries<P: PricePoint = PriceRecord> {
    series: HashMap<String, Vec<P>>,
    rows: usize,
}

impl<P: PricePoint> PriceSeries<P> {
    pub fn new(series: HashMap<String, Vec<P>>) -> Result<Self, TradeReplayError> {
        let mut tickers: Vec<&String> = series.keys().collect();
        tickers.sort();

        let rows = tickers.first().map(|t| series[*t].len()).unwrap_or(0);
        for ticker in tickers {
            let count = series[ticker].len();
            if count != rows {
                return Err(TradeReplayError::InconsistentRows {
                    ticker: ticker.clone(),
                    rows: count,
                    expected: rows,
                });
            }
        }

        Ok(Self { series, rows })
    }

    pub fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self.series.keys().cloned().collect();
        tickers.sort();
        tickers
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Records with the earliest and latest `window_start` for `ticker`.
    pub fn time_range(&self, ticker: &str) -> Option<(&P, &P)> {
        let records = self.series.get(ticker)?;
        let first = records.iter().min_by_key(|r| r.window_start())?;
        let last = records.iter().max_by_key(|r| r.window_start())?;
        Some((first, last))
    }

    pub fn into_stream(self) -> PriceStream<P> {
        PriceStream::new(self.series)
    }
}

/// Single-pass cross-ticker join of the per-ticker sequences by row index.
#[derive(Debug)]
pub struct PriceStream<P: PricePoint = PriceRecord> {
    iters: HashMap<String, vec::IntoIter<P>>,
}

impl<P: PricePoint> PriceStream<P> {
    pub fn new(series: HashMap<String, Vec<P>>) -> Self {
        let iters = series
            .into_iter()
            .map(|(ticker, records)| (ticker, records.into_iter()))
            .collect();
        Self { iters }
    }

    /// The next row: one entry per known ticker, `None` once that ticker's
    /// sequence is exhausted. Iteration order over tickers is unspecified.
    pub fn next_row(&mut self) -> HashMap<String, Option<P>> {
        self.iters
            .iter_mut()
            .map(|(ticker, iter)| (ticker.clone(), iter.next()))
            .collect()
    }
}

/// All records of a row, or `None` if the row is empty or any ticker ran dry.
pub fn complete_row<P>(row: HashMap<String, Option<P>>) -> Option<Vec<P>> {
    if row.is_empty() {
        return None;
    }
    row.into_values().collect()
}
