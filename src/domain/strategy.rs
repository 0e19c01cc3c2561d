//! Strategy contract and the bundled threshold strategy.

use log::warn;

use crate::domain::exchange::{Exchange, OrderStatus};
use crate::domain::price::{PricePoint, PriceRecord};

/// Reacts to each tick delivered by the driver.
///
/// Called synchronously once per ticker per row. Orders are placed directly on
/// the exchange passed in; the strategy owns whatever state it keeps.
pub trait Strategy<P: PricePoint = PriceRecord> {
    fn handle_new_price(&mut self, point: &P, exchange: &mut Exchange<P>);
}

/// Buys a fixed size whenever the open dips below a threshold and the ticker
/// is flat; clears once the position is up by `take_profit` or shows any loss.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdStrategy {
    pub buy_threshold: f64,
    /// Fractional gain against the newest lot that triggers a clear.
    pub take_profit: f64,
    pub order_size: i64,
}

impl ThresholdStrategy {
    pub fn new(buy_threshold: f64, take_profit: f64) -> Self {
        ThresholdStrategy {
            buy_threshold,
            take_profit,
            order_size: 100,
        }
    }
}

impl<P: PricePoint> Strategy<P> for ThresholdStrategy {
    fn handle_new_price(&mut self, point: &P, exchange: &mut Exchange<P>) {
        let ticker = point.ticker();
        let price = point.open();

        if price < self.buy_threshold && exchange.lot_book().is_empty(ticker) {
            let status =
                exchange.market_order(ticker, self.order_size, price, point.window_start());
            if let OrderStatus::Rejected(reason) = status {
                warn!(
                    "buy {} {} @ {} at {} failed: {:?}",
                    ticker,
                    self.order_size,
                    price,
                    point.window_start(),
                    reason
                );
            }
        }

        let buy_in = match exchange.open_positions().get(ticker).and_then(|q| q.front()) {
            Some(newest) => newest.price,
            None => return,
        };
        let change = (price - buy_in) / buy_in;
        if change >= self.take_profit || change < 0.0 {
            if let OrderStatus::Rejected(reason) = exchange.market_clear(ticker) {
                warn!("clear {} failed: {:?}", ticker, reason);
            }
        }
    }
}
