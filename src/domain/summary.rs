//! Per-ticker aggregation of realized fills.

use std::collections::BTreeMap;

use super::lot::ClosedLot;

#[derive(Debug, Clone, PartialEq)]
pub struct TickerSummary {
    pub ticker: String,
    pub fills: usize,
    pub wins: usize,
    pub losses: usize,
    pub total_pnl: f64,
    pub worst_fill: f64,
}

impl TickerSummary {
    pub fn win_rate(&self) -> f64 {
        if self.fills > 0 {
            self.wins as f64 / self.fills as f64
        } else {
            0.0
        }
    }

    /// One summary per ticker, sorted by ticker.
    pub fn compute_per_ticker(closed: &[ClosedLot]) -> Vec<TickerSummary> {
        let mut by_ticker: BTreeMap<&str, TickerSummary> = BTreeMap::new();

        for fill in closed {
            let entry = by_ticker
                .entry(fill.ticker.as_str())
                .or_insert_with(|| TickerSummary {
                    ticker: fill.ticker.clone(),
                    fills: 0,
                    wins: 0,
                    losses: 0,
                    total_pnl: 0.0,
                    worst_fill: 0.0,
                });
            entry.fills += 1;
            entry.total_pnl += fill.pnl;
            if fill.pnl > 0.0 {
                entry.wins += 1;
            } else if fill.pnl < 0.0 {
                entry.losses += 1;
            }
            entry.worst_fill = entry.worst_fill.min(fill.pnl);
        }

        by_ticker.into_values().collect()
    }
}
