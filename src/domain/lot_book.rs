//! FIFO lot book: per-ticker lot queues plus signed net amounts.
//!
//! Each queue holds the newest lot at the front and the oldest at the back.
//! Reducing orders consume from the back.

use std::collections::{HashMap, VecDeque};

use super::lot::Lot;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LotBook {
    lots: HashMap<String, VecDeque<Lot>>,
    net: HashMap<String, i64>,
}

impl LotBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `lot` as the newest entry for `ticker`.
    pub fn push_lot(&mut self, ticker: &str, lot: Lot) {
        *self.net.entry(ticker.to_string()).or_insert(0) += lot.amount;
        self.lots
            .entry(ticker.to_string())
            .or_default()
            .push_front(lot);
    }

    pub fn peek_oldest(&self, ticker: &str) -> Option<&Lot> {
        self.lots.get(ticker).and_then(|q| q.back())
    }

    pub fn pop_oldest(&mut self, ticker: &str) -> Option<Lot> {
        let lot = self.lots.get_mut(ticker)?.pop_back()?;
        if let Some(net) = self.net.get_mut(ticker) {
            *net -= lot.amount;
        }
        Some(lot)
    }

    /// Rewrite the oldest lot's amount, keeping the net amount in step.
    /// Returns the previous amount, or `None` if the queue is empty.
    pub fn replace_oldest(&mut self, ticker: &str, new_amount: i64) -> Option<i64> {
        let lot = self.lots.get_mut(ticker)?.back_mut()?;
        let old = lot.amount;
        lot.amount = new_amount;
        if let Some(net) = self.net.get_mut(ticker) {
            *net += new_amount - old;
        }
        Some(old)
    }

    pub fn net(&self, ticker: &str) -> i64 {
        self.net.get(ticker).copied().unwrap_or(0)
    }

    pub fn is_empty(&self, ticker: &str) -> bool {
        self.lots.get(ticker).is_none_or(|q| q.is_empty())
    }

    pub fn lots(&self, ticker: &str) -> Option<&VecDeque<Lot>> {
        self.lots.get(ticker)
    }

    pub fn positions(&self) -> &HashMap<String, VecDeque<Lot>> {
        &self.lots
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VecDeque<Lot>)> {
        self.lots.iter()
    }

    /// Tickers with at least one open lot.
    pub fn open_tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self
            .lots
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(t, _)| t.clone())
            .collect();
        tickers.sort();
        tickers
    }

    /// Sign uniformity and net consistency for every ticker.
    pub fn invariants_hold(&self) -> bool {
        let queues_ok = self.lots.iter().all(|(ticker, queue)| {
            let net = self.net(ticker);
            let sum: i64 = queue.iter().map(|l| l.amount).sum();
            sum == net && queue.iter().all(|l| l.amount.signum() == net.signum())
        });
        let orphans_ok = self
            .net
            .iter()
            .all(|(ticker, &net)| net == 0 || !self.is_empty(ticker));
        queues_ok && orphans_ok
    }
}
