//! Configuration access port trait.
//!
//! Keys are read by section:
//! - `[backtest]`: `initial_budget`, `data_path` (comma-separated for several exchanges)
//! - `[strategy]`: `buy_threshold`, `take_profit`, `order_size`
//! - `[report]`: `per_ticker_summary`
//!
//! Typed getters fall back to `default` when a key is absent or unparseable.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
