//! Lots: atomic position entries with a cost basis.

/// One open position entry. Positive amount is long, negative is short.
#[derive(Debug, Clone, PartialEq)]
pub struct Lot {
    pub ticker: String,
    pub amount: i64,
    pub price: f64,
    pub timestamp: i64,
}

impl Lot {
    pub fn new(ticker: &str, amount: i64, price: f64, timestamp: i64) -> Self {
        Lot {
            ticker: ticker.to_string(),
            amount,
            price,
            timestamp,
        }
    }

    pub fn is_long(&self) -> bool {
        self.amount > 0
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.amount as f64 * (price - self.price)
    }

    /// Realized P&L from consuming `shares` of this lot at `price`.
    pub fn realized_pnl(&self, shares: i64, price: f64) -> f64 {
        let shares = shares as f64;
        if self.is_long() {
            shares * (price - self.price)
        } else {
            shares * (self.price - price)
        }
    }
}

/// Audit record of a (partial) lot consumed by an opposing order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedLot {
    pub ticker: String,
    /// Signed amount of the consumed slice, sign of the original lot.
    pub amount: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_timestamp: i64,
    pub exit_timestamp: i64,
    pub pnl: f64,
}
