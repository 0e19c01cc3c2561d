//! tradereplay: event-driven backtester over per-ticker price streams.
//!
//! Hexagonal architecture: the exchange, lot book and driver live in
//! [`domain`], port traits in [`ports`], CSV/INI/console implementations in
//! [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
