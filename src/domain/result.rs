//! Realized performance accumulator and run statistics.

use super::error::TradeReplayError;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub initial_budget: f64,
    pub abs_performance: f64,
    pub rel_performance: f64,
    /// Most negative single realized fill since inception, never positive.
    pub max_drawdown: f64,
    pub performance_series: Vec<f64>,
    /// Set by [`BacktestResult::finalize`].
    pub volatility: Option<f64>,
    /// Largest peak-to-trough fall of `1 + sample` over the series, as a
    /// non-negative fraction. Set by [`BacktestResult::finalize`].
    pub max_equity_drawdown: f64,
}

impl BacktestResult {
    pub fn new(initial_budget: f64) -> Self {
        BacktestResult {
            initial_budget,
            abs_performance: 0.0,
            rel_performance: 0.0,
            max_drawdown: 0.0,
            performance_series: Vec::new(),
            volatility: None,
            max_equity_drawdown: 0.0,
        }
    }

    pub fn record_fill(&mut self, realized: f64) {
        self.abs_performance += realized;
        self.rel_performance = self.abs_performance / self.initial_budget;
        if realized < self.max_drawdown {
            self.max_drawdown = realized;
        }
    }

    pub fn record_sample(&mut self, sample: f64) {
        self.performance_series.push(sample);
    }

    /// Compute end-of-run statistics over the performance series.
    pub fn finalize(&mut self) -> Result<f64, TradeReplayError> {
        let vol = population_std_dev(&self.performance_series)?;
        self.volatility = Some(vol);
        self.max_equity_drawdown = equity_drawdown(&self.performance_series);
        Ok(vol)
    }

    /// Combine results of two independently run exchanges.
    pub fn merge(first: &BacktestResult, second: &BacktestResult) -> BacktestResult {
        let initial_budget = first.initial_budget + second.initial_budget;
        let abs_performance = first.abs_performance + second.abs_performance;
        let rel_performance = if initial_budget != 0.0 {
            abs_performance / initial_budget
        } else {
            0.0
        };

        let performance_series: Vec<f64> = first
            .performance_series
            .iter()
            .zip(&second.performance_series)
            .map(|(a, b)| a + b)
            .collect();
        let volatility = population_std_dev(&performance_series).ok();
        let max_equity_drawdown = equity_drawdown(&performance_series);

        BacktestResult {
            initial_budget,
            abs_performance,
            rel_performance,
            max_drawdown: first.max_drawdown.min(second.max_drawdown),
            performance_series,
            volatility,
            max_equity_drawdown,
        }
    }
}

/// Population standard deviation (divides by n, not n - 1).
pub fn population_std_dev(values: &[f64]) -> Result<f64, TradeReplayError> {
    if values.is_empty() {
        return Err(TradeReplayError::EmptySeries);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Ok(variance.sqrt())
}

fn equity_drawdown(series: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;

    for sample in series {
        let equity = 1.0 + sample;
        if equity > peak {
            peak = equity;
        } else if peak > 0.0 {
            let dd = (peak - equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}
