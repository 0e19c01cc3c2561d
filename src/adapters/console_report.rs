//! Plain-text result report for the terminal.

use std::io::Write;

use crate::domain::error::TradeReplayError;
use crate::domain::result::BacktestResult;
use crate::domain::summary::TickerSummary;
use crate::ports::report_port::ReportPort;

pub struct ConsoleReport;

impl ReportPort for ConsoleReport {
    fn write(&self, result: &BacktestResult, out: &mut dyn Write) -> Result<(), TradeReplayError> {
        writeln!(out, "Results of the Backtest")?;
        writeln!(out, "-----------------------")?;
        writeln!(out, "Relative Performance: {}", result.rel_performance)?;
        writeln!(out, "Absolute Performance: {}", result.abs_performance)?;
        writeln!(out, "Max Drawdown: {}", result.max_drawdown)?;
        match result.volatility {
            Some(v) => writeln!(out, "Volatility: {}", v)?,
            None => writeln!(out, "Volatility: n/a")?,
        }
        Ok(())
    }

    /// Equity drawdown and one line per traded ticker.
    fn write_summary(
        &self,
        result: &BacktestResult,
        summaries: &[TickerSummary],
        out: &mut dyn Write,
    ) -> Result<(), TradeReplayError> {
        writeln!(
            out,
            "Max Equity Drawdown: {:.2}%",
            result.max_equity_drawdown * 100.0
        )?;
        writeln!(out, "Per-Ticker Summary")?;
        for s in summaries {
            let sign = if s.total_pnl >= 0.0 { "+" } else { "" };
            writeln!(
                out,
                "  {}: {} fills, {:.1}% win rate, {}{:.2}, worst {:.2}",
                s.ticker,
                s.fills,
                s.win_rate() * 100.0,
                sign,
                s.total_pnl,
                s.worst_fill
            )?;
        }
        Ok(())
    }
}
