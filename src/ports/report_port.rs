//! Result reporting port trait.

use std::io::Write;

use crate::domain::error::TradeReplayError;
use crate::domain::result::BacktestResult;
use crate::domain::summary::TickerSummary;

/// Port for rendering a finished backtest.
///
/// The aggregate block and the per-ticker breakdown are written separately so
/// callers can route them to different sinks.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, out: &mut dyn Write) -> Result<(), TradeReplayError>;

    /// Default implementation: writes nothing.
    fn write_summary(
        &self,
        _result: &BacktestResult,
        _summaries: &[TickerSummary],
        _out: &mut dyn Write,
    ) -> Result<(), TradeReplayError> {
        Ok(())
    }
}
