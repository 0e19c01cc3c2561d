//! Price data access port trait.

use crate::domain::error::TradeReplayError;
use crate::domain::stream::PriceSeries;

pub trait DataPort {
    /// Load every ticker's full, ordered series.
    fn load_series(&self) -> Result<PriceSeries, TradeReplayError>;
}
