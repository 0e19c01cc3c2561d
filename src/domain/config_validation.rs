//! Configuration validation.
//!
//! Validates config fields before a backtest runs.

use crate::domain::error::TradeReplayError;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_INITIAL_BUDGET: f64 = 1_000_000.0;
pub const DEFAULT_TAKE_PROFIT: f64 = 0.01;
pub const DEFAULT_ORDER_SIZE: i64 = 100;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TradeReplayError> {
    validate_initial_budget(config)?;
    validate_data_path(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TradeReplayError> {
    validate_buy_threshold(config)?;
    validate_take_profit(config)?;
    validate_order_size(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> TradeReplayError {
    TradeReplayError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// A present value must parse as a number; `get_double` would silently
/// fall back to the default otherwise.
fn check_numeric(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), TradeReplayError> {
    match config.get_string(section, key) {
        Some(raw) if raw.trim().parse::<f64>().is_err() => {
            Err(invalid(section, key, &format!("{key} must be a number")))
        }
        _ => Ok(()),
    }
}

fn validate_initial_budget(config: &dyn ConfigPort) -> Result<(), TradeReplayError> {
    check_numeric(config, "backtest", "initial_budget")?;
    let value = config.get_double("backtest", "initial_budget", DEFAULT_INITIAL_BUDGET);
    if value <= 0.0 || !value.is_finite() {
        return Err(invalid(
            "backtest",
            "initial_budget",
            "initial_budget must be positive",
        ));
    }
    Ok(())
}

fn validate_data_path(config: &dyn ConfigPort) -> Result<(), TradeReplayError> {
    match config.get_string("backtest", "data_path") {
        Some(s) if s.trim().is_empty() => Err(invalid(
            "backtest",
            "data_path",
            "data_path must not be empty",
        )),
        _ => Ok(()),
    }
}

fn validate_buy_threshold(config: &dyn ConfigPort) -> Result<(), TradeReplayError> {
    if config.get_string("strategy", "buy_threshold").is_none() {
        return Err(TradeReplayError::ConfigMissing {
            section: "strategy".to_string(),
            key: "buy_threshold".to_string(),
        });
    }
    check_numeric(config, "strategy", "buy_threshold")?;
    let value = config.get_double("strategy", "buy_threshold", 0.0);
    if value <= 0.0 {
        return Err(invalid(
            "strategy",
            "buy_threshold",
            "buy_threshold must be positive",
        ));
    }
    Ok(())
}

fn validate_take_profit(config: &dyn ConfigPort) -> Result<(), TradeReplayError> {
    check_numeric(config, "strategy", "take_profit")?;
    let value = config.get_double("strategy", "take_profit", DEFAULT_TAKE_PROFIT);
    if value <= 0.0 {
        return Err(invalid(
            "strategy",
            "take_profit",
            "take_profit must be positive",
        ));
    }
    Ok(())
}

fn validate_order_size(config: &dyn ConfigPort) -> Result<(), TradeReplayError> {
    if let Some(raw) = config.get_string("strategy", "order_size") {
        if raw.trim().parse::<i64>().is_err() {
            return Err(invalid(
                "strategy",
                "order_size",
                "order_size must be a whole number of shares",
            ));
        }
    }
    let value = config.get_int("strategy", "order_size", DEFAULT_ORDER_SIZE);
    if value < 1 {
        return Err(invalid(
            "strategy",
            "order_size",
            "order_size must be at least 1",
        ));
    }
    Ok(())
}
