//! Domain error types.

/// Top-level error type for tradereplay.
///
/// Rejected orders are not errors; see [`crate::domain::exchange::OrderStatus`].
#[derive(Debug, thiserror::Error)]
pub enum TradeReplayError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("missing data: {reason}")]
    MissingData { reason: String },

    #[error("inconsistent row count for {ticker}: have {rows} rows, expected {expected}")]
    InconsistentRows {
        ticker: String,
        rows: usize,
        expected: usize,
    },

    #[error("volatility requested over an empty performance series")]
    EmptySeries,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TradeReplayError> for std::process::ExitCode {
    fn from(err: &TradeReplayError) -> Self {
        let code: u8 = match err {
            TradeReplayError::Io(_) => 1,
            TradeReplayError::ConfigParse { .. }
            | TradeReplayError::ConfigMissing { .. }
            | TradeReplayError::ConfigInvalid { .. } => 2,
            TradeReplayError::MissingData { .. } | TradeReplayError::InconsistentRows { .. } => 5,
            TradeReplayError::EmptySeries => 6,
        };
        std::process::ExitCode::from(code)
    }
}
