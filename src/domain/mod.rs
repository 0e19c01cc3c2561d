pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod exchange;
pub mod lot;
pub mod lot_book;
pub mod price;
pub mod result;
pub mod strategy;
pub mod stream;
pub mod summary;
