//! Backtest driver loop.
//!
//! BacktestConfig defines the run parameters read from config or CLI flags.
//! A single exchange runs through `run_backtest`; several exchanges sharing one
//! strategy run through `run_connected`.

use log::info;
use std::path::PathBuf;

use super::error::TradeReplayError;
use super::exchange::Exchange;
use super::price::{PricePoint, PriceRecord};
use super::result::BacktestResult;
use super::stream::{complete_row, PriceStream};
use super::strategy::Strategy;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    /// Budget of each connected exchange.
    pub initial_budget: f64,
    /// One data source per exchange.
    pub data_paths: Vec<PathBuf>,
}

/// An exchange together with the stream that feeds it.
#[derive(Debug)]
pub struct Venue<P: PricePoint = PriceRecord> {
    pub exchange: Exchange<P>,
    pub stream: PriceStream<P>,
}

impl<P: PricePoint> Venue<P> {
    pub fn new(exchange: Exchange<P>, stream: PriceStream<P>) -> Self {
        Self { exchange, stream }
    }
}

/// Sample, then deliver one row. Returns `false` once the stream is done.
fn advance<P, S>(strategy: &mut S, exchange: &mut Exchange<P>, stream: &mut PriceStream<P>) -> bool
where
    P: PricePoint,
    S: Strategy<P> + ?Sized,
{
    exchange.record_performance_sample();
    let Some(points) = complete_row(stream.next_row()) else {
        return false;
    };

    for point in &points {
        exchange.update_price(point.clone());
    }
    for point in &points {
        strategy.handle_new_price(point, exchange);
    }
    true
}

/// Replay `stream` through `strategy` against `exchange`.
///
/// Before each pull from the stream the exchange's total return is sampled into
/// the performance series. All prices of a row are published to the exchange
/// before the strategy sees any of them. The run ends on the first row where a
/// ticker is exhausted; volatility is then finalized on the exchange's result.
///
/// Returns the number of rows delivered.
pub fn run_backtest<P, S>(
    strategy: &mut S,
    exchange: &mut Exchange<P>,
    stream: &mut PriceStream<P>,
) -> Result<usize, TradeReplayError>
where
    P: PricePoint,
    S: Strategy<P> + ?Sized,
{
    let mut rows = 0usize;
    while advance(strategy, exchange, stream) {
        rows += 1;
    }

    let volatility = exchange.finalize()?;
    info!(
        "backtest finished after {} rows: abs {} rel {} volatility {}",
        rows,
        exchange.result().abs_performance,
        exchange.result().rel_performance,
        volatility
    );
    Ok(rows)
}

/// Drive one strategy against several exchanges in lockstep and merge their
/// results.
///
/// Each round delivers the next row of every venue still running, in venue
/// order; the strategy acts on the exchange it is handed. A venue drops out
/// when its stream is exhausted, and the run ends when all have.
pub fn run_connected<P, S>(
    strategy: &mut S,
    venues: &mut [Venue<P>],
) -> Result<BacktestResult, TradeReplayError>
where
    P: PricePoint,
    S: Strategy<P> + ?Sized,
{
    if venues.is_empty() {
        return Err(TradeReplayError::MissingData {
            reason: "no exchanges to run against".to_string(),
        });
    }

    let mut running = vec![true; venues.len()];
    let mut rounds = 0usize;
    while running.iter().any(|r| *r) {
        let mut delivered = false;
        for (venue, live) in venues.iter_mut().zip(running.iter_mut()) {
            if !*live {
                continue;
            }
            if advance(strategy, &mut venue.exchange, &mut venue.stream) {
                delivered = true;
            } else {
                *live = false;
            }
        }
        if delivered {
            rounds += 1;
        }
    }

    let mut merged: Option<BacktestResult> = None;
    for venue in venues.iter_mut() {
        venue.exchange.finalize()?;
        let result = venue.exchange.result();
        merged = Some(match merged {
            Some(acc) => BacktestResult::merge(&acc, result),
            None => result.clone(),
        });
    }
    let merged = merged.ok_or(TradeReplayError::EmptySeries)?;

    info!(
        "connected run over {} exchanges finished after {} rounds: abs {} rel {}",
        venues.len(),
        rounds,
        merged.abs_performance,
        merged.rel_performance
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stream::PriceSeries;
    use std::collections::HashMap;

    /// Records every tick it sees and never trades.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<(String, i64)>,
        prices_visible: Vec<usize>,
    }

    impl Strategy for Recorder {
        fn handle_new_price(&mut self, point: &PriceRecord, exchange: &mut Exchange) {
            self.seen.push((point.ticker.clone(), point.window_start));
            let visible = ["AAPL", "MSFT"]
                .iter()
                .filter(|&&t| {
                    exchange
                        .current_price(t)
                        .is_some_and(|p| p.window_start == point.window_start)
                })
                .count();
            self.prices_visible.push(visible);
        }
    }

    fn rec(ticker: &str, open: f64, ts: i64) -> PriceRecord {
        PriceRecord {
            ticker: ticker.to_string(),
            volume: 1,
            open,
            close: open,
            high: open,
            low: open,
            window_start: ts,
            transactions: 1,
        }
    }

    /// Opens one share per ticker on whichever exchange it is handed.
    struct BuyOnce;

    impl Strategy for BuyOnce {
        fn handle_new_price(&mut self, point: &PriceRecord, exchange: &mut Exchange) {
            if exchange.net_position(&point.ticker) == 0 {
                let _ = exchange.market_order(&point.ticker, 1, point.open, point.window_start);
            }
        }
    }

    fn stream(rows: usize) -> PriceStream {
        let mut map = HashMap::new();
        for t in ["AAPL", "MSFT"] {
            map.insert(
                t.to_string(),
                (0..rows).map(|i| rec(t, 10.0, i as i64)).collect(),
            );
        }
        PriceSeries::new(map).unwrap().into_stream()
    }

    #[test]
    fn delivers_every_tick_once() {
        let mut strategy = Recorder::default();
        let mut ex: Exchange = Exchange::new(1_000.0);
        let mut s = stream(3);

        let rows = run_backtest(&mut strategy, &mut ex, &mut s).unwrap();
        assert_eq!(rows, 3);
        assert_eq!(strategy.seen.len(), 6);
        for ts in 0..3 {
            assert_eq!(strategy.seen.iter().filter(|(_, t)| *t == ts).count(), 2);
        }
    }

    #[test]
    fn whole_row_priced_before_strategy_runs() {
        let mut strategy = Recorder::default();
        let mut ex: Exchange = Exchange::new(1_000.0);
        let mut s = stream(2);

        run_backtest(&mut strategy, &mut ex, &mut s).unwrap();
        assert!(strategy.prices_visible.iter().all(|&v| v == 2));
    }

    #[test]
    fn samples_once_per_pull() {
        let mut strategy = Recorder::default();
        let mut ex: Exchange = Exchange::new(1_000.0);
        let mut s = stream(4);

        run_backtest(&mut strategy, &mut ex, &mut s).unwrap();
        // four rows plus the terminating pull
        assert_eq!(ex.result().performance_series.len(), 5);
        assert_eq!(ex.result().volatility, Some(0.0));
    }

    #[test]
    fn empty_stream_finishes_cleanly() {
        let mut strategy = Recorder::default();
        let mut ex: Exchange = Exchange::new(1_000.0);
        let mut s = stream(0);

        let rows = run_backtest(&mut strategy, &mut ex, &mut s).unwrap();
        assert_eq!(rows, 0);
        assert_eq!(ex.result().performance_series, vec![0.0]);
        assert_eq!(ex.result().volatility, Some(0.0));
    }

    #[test]
    fn stream_without_tickers_terminates() {
        let mut strategy = Recorder::default();
        let mut ex: Exchange = Exchange::new(1_000.0);
        let mut s: PriceStream = PriceStream::new(HashMap::new());

        assert_eq!(run_backtest(&mut strategy, &mut ex, &mut s).unwrap(), 0);
    }

    #[test]
    fn connected_run_visits_every_venue() {
        let mut strategy = Recorder::default();
        let mut venues = vec![
            Venue::new(Exchange::new(1_000.0), stream(3)),
            Venue::new(Exchange::new(1_000.0), stream(1)),
        ];

        let merged = run_connected(&mut strategy, &mut venues).unwrap();
        assert_eq!(strategy.seen.len(), 8);
        assert_eq!(merged.initial_budget, 2_000.0);
        // the shorter venue took two samples, the longer four
        assert_eq!(venues[0].exchange.result().performance_series.len(), 4);
        assert_eq!(venues[1].exchange.result().performance_series.len(), 2);
        assert_eq!(merged.performance_series.len(), 2);
        assert!(venues.iter().all(|v| v.exchange.result().volatility.is_some()));
    }

    #[test]
    fn connected_orders_land_on_their_own_exchange() {
        let mut strategy = BuyOnce;
        let mut venues = vec![
            Venue::new(Exchange::new(1_000.0), stream(2)),
            Venue::new(Exchange::new(500.0), stream(2)),
        ];

        run_connected(&mut strategy, &mut venues).unwrap();
        for venue in &venues {
            assert_eq!(venue.exchange.net_position("AAPL"), 1);
            assert_eq!(venue.exchange.net_position("MSFT"), 1);
            assert_eq!(venue.exchange.transactions().len(), 2);
        }
        assert_eq!(venues[0].exchange.remaining_budget(), 980.0);
        assert_eq!(venues[1].exchange.remaining_budget(), 480.0);
    }

    #[test]
    fn connected_run_needs_an_exchange() {
        let mut strategy = Recorder::default();
        let mut venues: Vec<Venue> = Vec::new();
        let err = run_connected(&mut strategy, &mut venues).unwrap_err();
        assert!(matches!(err, TradeReplayError::MissingData { .. }));
    }
}
