//! Simulated exchange: order matching, FIFO inventory and realized P&L.
//!
//! Fills are granted at the requested price with no fees or slippage. Every
//! accepted order moves cash by `-amount * price`, so shorts free cash at open
//! and closing fills return principal plus gain.

use log::{debug, warn};
use std::collections::{HashMap, VecDeque};

use super::error::TradeReplayError;
use super::lot::{ClosedLot, Lot};
use super::lot_book::LotBook;
use super::price::{PricePoint, PriceRecord};
use super::result::BacktestResult;

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    InsufficientBudget { required: f64, available: f64 },
    UnknownTicker { ticker: String },
    ZeroAmount,
    /// The order size, or the position it would leave, is not representable.
    AmountOutOfRange { amount: i64 },
}

#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum OrderStatus {
    Filled,
    Rejected(RejectReason),
}

impl OrderStatus {
    pub fn is_filled(&self) -> bool {
        matches!(self, OrderStatus::Filled)
    }

    pub fn is_rejected(&self) -> bool {
        !self.is_filled()
    }
}

#[derive(Debug, Clone)]
pub struct Exchange<P: PricePoint = PriceRecord> {
    initial_budget: f64,
    remaining_budget: f64,
    book: LotBook,
    current_prices: HashMap<String, P>,
    transactions: Vec<Lot>,
    closed_lots: Vec<ClosedLot>,
    result: BacktestResult,
}

impl<P: PricePoint> Exchange<P> {
    pub fn new(initial_budget: f64) -> Self {
        Exchange {
            initial_budget,
            remaining_budget: initial_budget,
            book: LotBook::new(),
            current_prices: HashMap::new(),
            transactions: Vec::new(),
            closed_lots: Vec::new(),
            result: BacktestResult::new(initial_budget),
        }
    }

    /// Execute a market order for `amount` shares (positive buys, negative sells).
    ///
    /// Reducing orders consume the oldest lots first. An order larger than the
    /// open position closes it and opens the overshoot in the other direction.
    /// A rejected order leaves every piece of state untouched.
    pub fn market_order(
        &mut self,
        ticker: &str,
        amount: i64,
        price: f64,
        timestamp: i64,
    ) -> OrderStatus {
        if amount == 0 {
            return OrderStatus::Rejected(RejectReason::ZeroAmount);
        }
        // i64::MIN has no negation, so neither the order nor a resulting net may hold it.
        let fits = amount != i64::MIN
            && self
                .book
                .net(ticker)
                .checked_add(amount)
                .is_some_and(|net| net != i64::MIN);
        if !fits {
            warn!(
                "rejected {} {} @ {}: position size out of range",
                ticker, amount, price
            );
            return OrderStatus::Rejected(RejectReason::AmountOutOfRange { amount });
        }

        let cost = amount as f64 * price;
        if self.remaining_budget - cost < 0.0 {
            warn!(
                "rejected {} {} @ {}: cost {} exceeds remaining budget {}",
                ticker, amount, price, cost, self.remaining_budget
            );
            return OrderStatus::Rejected(RejectReason::InsufficientBudget {
                required: cost,
                available: self.remaining_budget,
            });
        }

        self.transactions
            .push(Lot::new(ticker, amount, price, timestamp));

        let mut remaining = amount;
        while remaining != 0 {
            let pos_sign = self.book.net(ticker).signum();
            if pos_sign == 0 || remaining.signum() == pos_sign {
                self.open_lot(ticker, remaining, price, timestamp);
                remaining = 0;
            } else {
                remaining = self.consume_oldest(ticker, remaining, price, timestamp);
            }
        }

        self.debug_check_invariants();
        OrderStatus::Filled
    }

    /// Flatten `ticker` at the latest observed open.
    ///
    /// A flat ticker is a no-op. Without an observed price the clear is
    /// rejected.
    pub fn market_clear(&mut self, ticker: &str) -> OrderStatus {
        let net = self.book.net(ticker);
        if net == 0 {
            return OrderStatus::Filled;
        }
        let (price, timestamp) = match self.current_prices.get(ticker) {
            Some(p) => (p.open(), p.window_start()),
            None => {
                warn!("cannot clear {}: no price observed yet", ticker);
                return OrderStatus::Rejected(RejectReason::UnknownTicker {
                    ticker: ticker.to_string(),
                });
            }
        };
        self.market_order(ticker, -net, price, timestamp)
    }

    fn open_lot(&mut self, ticker: &str, amount: i64, price: f64, timestamp: i64) {
        self.remaining_budget -= amount as f64 * price;
        self.book
            .push_lot(ticker, Lot::new(ticker, amount, price, timestamp));
        debug!("opened lot {} {} @ {}", ticker, amount, price);
    }

    /// Match `remaining` against the oldest lot and return what is left of it.
    fn consume_oldest(&mut self, ticker: &str, remaining: i64, price: f64, timestamp: i64) -> i64 {
        let Some(oldest) = self.book.peek_oldest(ticker).cloned() else {
            self.open_lot(ticker, remaining, price, timestamp);
            return 0;
        };

        let lot_sign = oldest.amount.signum();
        // Bounded by the lot size, which always fits in i64.
        let consumable = oldest.amount.unsigned_abs().min(remaining.unsigned_abs()) as i64;
        let realized = oldest.realized_pnl(consumable, price);
        // Signed size of this slice of the incoming order.
        let filled = -lot_sign * consumable;

        self.remaining_budget -= filled as f64 * price;
        self.result.record_fill(realized);
        self.closed_lots.push(ClosedLot {
            ticker: ticker.to_string(),
            amount: lot_sign * consumable,
            entry_price: oldest.price,
            exit_price: price,
            entry_timestamp: oldest.timestamp,
            exit_timestamp: timestamp,
            pnl: realized,
        });

        if consumable == oldest.amount.abs() {
            self.book.pop_oldest(ticker);
        } else {
            self.book
                .replace_oldest(ticker, oldest.amount - lot_sign * consumable);
        }
        debug!(
            "closed {} {} @ {} against {} (realized {})",
            ticker, filled, price, oldest.price, realized
        );

        remaining - filled
    }

    fn debug_check_invariants(&self) {
        debug_assert!(
            self.book.invariants_hold(),
            "lot book invariants violated: {:?}",
            self.book
        );
        debug_assert!(self.result.max_drawdown <= 0.0);
        debug_assert!(
            (self.result.rel_performance * self.initial_budget - self.result.abs_performance).abs()
                <= 1e-9 * self.result.abs_performance.abs().max(1.0),
            "relative performance out of step: {} * {} != {}",
            self.result.rel_performance,
            self.initial_budget,
            self.result.abs_performance
        );
        debug_assert!(
            self.accounting_drift() <= 1e-9,
            "cash does not reconcile with cost basis and realized P&L (drift {})",
            self.accounting_drift()
        );
    }

    /// Relative gap in `cash + book at cost == initial + realized`.
    fn accounting_drift(&self) -> f64 {
        let (at_cost, gross) = self
            .book
            .iter()
            .flat_map(|(_, lots)| lots.iter())
            .map(|l| l.amount as f64 * l.price)
            .fold((0.0, 0.0), |(sum, gross), v| (sum + v, gross + v.abs()));
        let lhs = self.remaining_budget + at_cost;
        let rhs = self.initial_budget + self.result.abs_performance;
        let scale = self.remaining_budget.abs()
            + gross
            + self.initial_budget.abs()
            + self.result.abs_performance.abs();
        (lhs - rhs).abs() / scale.max(1.0)
    }

    /// Record the latest observation for its ticker.
    pub fn update_price(&mut self, point: P) {
        self.current_prices.insert(point.ticker().to_string(), point);
        self.debug_check_invariants();
    }

    pub fn current_price(&self, ticker: &str) -> Option<&P> {
        self.current_prices.get(ticker)
    }

    /// Unrealized P&L of the open book against the latest opens.
    /// Tickers without an observed price are skipped.
    pub fn current_portfolio_value(&self) -> f64 {
        self.book
            .iter()
            .filter_map(|(ticker, lots)| {
                let open = self.current_prices.get(ticker)?.open();
                Some(lots.iter().map(|l| l.unrealized_pnl(open)).sum::<f64>())
            })
            .sum()
    }

    /// Cash plus the book marked at the latest opens (cost for unpriced tickers).
    pub fn equity(&self) -> f64 {
        let book_value: f64 = self
            .book
            .iter()
            .map(|(ticker, lots)| {
                let mark = self.current_prices.get(ticker).map(|p| p.open());
                lots.iter()
                    .map(|l| l.amount as f64 * mark.unwrap_or(l.price))
                    .sum::<f64>()
            })
            .sum();
        self.remaining_budget + book_value
    }

    /// Append the current total return to the performance series.
    pub fn record_performance_sample(&mut self) {
        let sample = (self.equity() - self.initial_budget) / self.initial_budget;
        self.result.record_sample(sample);
        self.debug_check_invariants();
    }

    pub fn finalize(&mut self) -> Result<f64, TradeReplayError> {
        self.debug_check_invariants();
        self.result.finalize()
    }

    pub fn open_positions(&self) -> &HashMap<String, VecDeque<Lot>> {
        self.book.positions()
    }

    pub fn net_position(&self, ticker: &str) -> i64 {
        self.book.net(ticker)
    }

    pub fn lot_book(&self) -> &LotBook {
        &self.book
    }

    pub fn initial_budget(&self) -> f64 {
        self.initial_budget
    }

    pub fn remaining_budget(&self) -> f64 {
        self.remaining_budget
    }

    pub fn result(&self) -> &BacktestResult {
        &self.result
    }

    pub fn into_result(self) -> BacktestResult {
        self.result
    }

    pub fn transactions(&self) -> &[Lot] {
        &self.transactions
    }

    pub fn closed_lots(&self) -> &[ClosedLot] {
        &self.closed_lots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const BUDGET: f64 = 1_000_000_000.0;

    fn exchange() -> Exchange {
        Exchange::new(BUDGET)
    }

    fn record(ticker: &str, open: f64, ts: i64) -> PriceRecord {
        PriceRecord {
            ticker: ticker.to_string(),
            volume: 1000,
            open,
            close: open,
            high: open,
            low: open,
            window_start: ts,
            transactions: 10,
        }
    }

    #[test]
    fn zero_amount_rejected() {
        let mut ex = exchange();
        let status = ex.market_order("AAPL", 0, 100.0, 1);
        assert_eq!(status, OrderStatus::Rejected(RejectReason::ZeroAmount));
        assert!(ex.transactions().is_empty());
    }

    #[test]
    fn buy_opens_long_lot_and_spends_cash() {
        let mut ex = exchange();
        assert!(ex.market_order("AAPL", 1000, 100.0, 1234567).is_filled());

        let lots = &ex.open_positions()["AAPL"];
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].amount, 1000);
        assert_eq!(lots[0].price, 100.0);
        assert_eq!(lots[0].timestamp, 1234567);
        assert_relative_eq!(ex.remaining_budget(), BUDGET - 100_000.0);
    }

    #[test]
    fn extending_puts_newest_first() {
        let mut ex = exchange();
        let _ = ex.market_order("AAPL", 1000, 100.0, 1234567);
        let _ = ex.market_order("AAPL", 1000, 100.0, 7654321);
        assert_eq!(ex.open_positions()["AAPL"][0].timestamp, 7654321);
        assert_eq!(ex.net_position("AAPL"), 2000);
    }

    #[test]
    fn short_sale_frees_cash() {
        let mut ex = exchange();
        let _ = ex.market_order("AAPL", -1000, 100.0, 1);
        assert_relative_eq!(ex.remaining_budget(), BUDGET + 100_000.0);
        assert_eq!(ex.net_position("AAPL"), -1000);
    }

    #[test]
    fn fifo_consumes_oldest_lot_first() {
        let mut ex = exchange();
        let _ = ex.market_order("AAPL", 100, 10.0, 1);
        let _ = ex.market_order("AAPL", 100, 20.0, 2);
        let _ = ex.market_order("AAPL", -150, 30.0, 3);

        // 100 @ 10 fully consumed, then 50 of the 20 lot
        assert_relative_eq!(ex.result().abs_performance, 100.0 * 20.0 + 50.0 * 10.0);
        let lots = &ex.open_positions()["AAPL"];
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].amount, 50);
        assert_eq!(lots[0].price, 20.0);
        assert_eq!(ex.closed_lots().len(), 2);
        assert_eq!(ex.closed_lots()[0].entry_timestamp, 1);
    }

    #[test]
    fn flip_long_to_short() {
        let mut ex = exchange();
        let _ = ex.market_order("AAPL", 1000, 10.0, 1);
        let _ = ex.market_order("AAPL", -2000, 100.0, 2);

        assert_relative_eq!(ex.result().abs_performance, 90_000.0);
        assert_eq!(ex.net_position("AAPL"), -1000);
        let lots = &ex.open_positions()["AAPL"];
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].amount, -1000);
        assert_eq!(lots[0].price, 100.0);
    }

    #[test]
    fn budget_rejection_leaves_state_untouched() {
        let mut ex: Exchange = Exchange::new(1000.0);
        let status = ex.market_order("X", 1000, 100.0, 1);
        assert_eq!(
            status,
            OrderStatus::Rejected(RejectReason::InsufficientBudget {
                required: 100_000.0,
                available: 1000.0,
            })
        );
        assert_eq!(ex.remaining_budget(), 1000.0);
        assert!(ex.open_positions().is_empty());
        assert!(ex.transactions().is_empty());
        assert_eq!(ex.result().abs_performance, 0.0);
    }

    #[test]
    fn budget_exactly_spent_is_accepted() {
        let mut ex: Exchange = Exchange::new(1000.0);
        assert!(ex.market_order("X", 10, 100.0, 1).is_filled());
        assert_eq!(ex.remaining_budget(), 0.0);
    }

    #[test]
    fn clear_without_price_rejected() {
        let mut ex = exchange();
        let _ = ex.market_order("AAPL", 10, 100.0, 1);
        let status = ex.market_clear("AAPL");
        assert!(matches!(
            status,
            OrderStatus::Rejected(RejectReason::UnknownTicker { .. })
        ));
        assert_eq!(ex.net_position("AAPL"), 10);
    }

    #[test]
    fn clear_flat_ticker_is_noop() {
        let mut ex = exchange();
        assert!(ex.market_clear("AAPL").is_filled());
        assert!(ex.transactions().is_empty());
    }

    #[test]
    fn clear_uses_latest_open() {
        let mut ex = exchange();
        ex.update_price(record("AAPL", 120.0, 99));
        let _ = ex.market_order("AAPL", 1000, 100.0, 1);
        assert!(ex.market_clear("AAPL").is_filled());

        assert_eq!(ex.net_position("AAPL"), 0);
        assert_relative_eq!(ex.result().abs_performance, 20_000.0);
        assert_eq!(ex.transactions().last().unwrap().timestamp, 99);
        assert_relative_eq!(ex.remaining_budget(), BUDGET + 20_000.0);
    }

    #[test]
    fn portfolio_value_skips_unpriced_tickers() {
        let mut ex = exchange();
        let _ = ex.market_order("AAPL", 1000, 100.0, 1);
        let _ = ex.market_order("MSFT", -10, 50.0, 1);
        assert_eq!(ex.current_portfolio_value(), 0.0);

        ex.update_price(record("AAPL", 101.5, 2));
        assert_relative_eq!(ex.current_portfolio_value(), 1_500.0);

        ex.update_price(record("MSFT", 40.0, 2));
        assert_relative_eq!(ex.current_portfolio_value(), 1_600.0);
    }

    #[test]
    fn performance_sample_is_total_return() {
        let mut ex: Exchange = Exchange::new(10_000.0);
        ex.update_price(record("AAPL", 100.0, 1));
        let _ = ex.market_order("AAPL", 10, 100.0, 1);
        ex.record_performance_sample();

        ex.update_price(record("AAPL", 110.0, 2));
        ex.record_performance_sample();

        let series = &ex.result().performance_series;
        assert_relative_eq!(series[0], 0.0);
        assert_relative_eq!(series[1], 0.01);
    }

    #[test]
    fn finalize_without_samples_errors() {
        let mut ex = exchange();
        assert!(matches!(ex.finalize(), Err(TradeReplayError::EmptySeries)));
    }

    #[test]
    fn min_amount_rejected_before_any_change() {
        let mut ex = exchange();
        assert!(ex.market_order("AAPL", 1, 100.0, 1).is_filled());
        let cash = ex.remaining_budget();

        let status = ex.market_order("AAPL", i64::MIN, 100.0, 2);
        assert_eq!(
            status,
            OrderStatus::Rejected(RejectReason::AmountOutOfRange { amount: i64::MIN })
        );
        assert_eq!(ex.transactions().len(), 1);
        assert_eq!(ex.net_position("AAPL"), 1);
        assert_eq!(ex.remaining_budget(), cash);
        assert!(ex.closed_lots().is_empty());
    }

    #[test]
    fn net_overflow_rejected() {
        let mut ex = exchange();
        assert!(ex.market_order("AAPL", -i64::MAX, 1.0, 1).is_filled());

        // would leave a net of i64::MIN
        let status = ex.market_order("AAPL", -1, 1.0, 2);
        assert!(matches!(
            status,
            OrderStatus::Rejected(RejectReason::AmountOutOfRange { amount: -1 })
        ));
        // would overflow outright
        assert!(ex.market_order("AAPL", -2, 1.0, 3).is_rejected());

        assert_eq!(ex.net_position("AAPL"), -i64::MAX);
        assert_eq!(ex.transactions().len(), 1);
        assert_eq!(ex.open_positions()["AAPL"].len(), 1);
    }

    #[test]
    fn full_flip_of_largest_position() {
        let mut ex = exchange();
        assert!(ex.market_order("AAPL", 1, 1.0, 1).is_filled());
        assert!(ex.market_order("AAPL", -i64::MAX, 1.0, 2).is_filled());
        assert_eq!(ex.net_position("AAPL"), 1 - i64::MAX);
        assert_eq!(ex.closed_lots().len(), 1);
    }

    #[test]
    fn books_reconcile_through_mixed_session() {
        let mut ex = exchange();
        ex.update_price(record("AAPL", 12.5, 1));
        let _ = ex.market_order("AAPL", 300, 10.0, 1);
        let _ = ex.market_order("AAPL", 200, 11.0, 2);
        let _ = ex.market_order("AAPL", -700, 12.0, 3);
        let _ = ex.market_order("MSFT", -40, 33.3, 3);
        let _ = ex.market_order("MSFT", 15, 31.1, 4);
        let _ = ex.market_clear("AAPL");
        ex.record_performance_sample();

        assert!(ex.accounting_drift() < 1e-12);
        assert_relative_eq!(
            ex.result().rel_performance * BUDGET,
            ex.result().abs_performance,
            max_relative = 1e-12
        );
    }
}
