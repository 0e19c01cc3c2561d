//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::console_report::ConsoleReport;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, Venue};
use crate::domain::config_validation::{
    validate_backtest_config, validate_strategy_config, DEFAULT_INITIAL_BUDGET,
    DEFAULT_ORDER_SIZE, DEFAULT_TAKE_PROFIT,
};
use crate::domain::error::TradeReplayError;
use crate::domain::exchange::Exchange;
use crate::domain::price::PriceRecord;
use crate::domain::result::BacktestResult;
use crate::domain::strategy::ThresholdStrategy;
use crate::domain::summary::TickerSummary;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "tradereplay", about = "Event-driven backtester over minute aggregates")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [backtest] data_path; repeat to connect several exchanges
        #[arg(short, long)]
        data: Vec<PathBuf>,
        /// Overrides [backtest] initial_budget
        #[arg(short, long)]
        budget: Option<f64>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show row counts and time range per ticker
    Info {
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            budget,
        } => run_backtest(&config, &data, budget),
        Command::Validate { config } => run_validate(&config),
        Command::Info { data } => run_info(&data),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_backtest(config_path: &Path, data_override: &[PathBuf], budget_override: Option<f64>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    if let Err(e) = validate_strategy_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let bt_config = match build_backtest_config(&adapter, data_override, budget_override) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let mut strategy = build_strategy(&adapter);
    let per_ticker_summary = adapter.get_bool("report", "per_ticker_summary", true);

    let adapters: Vec<CsvAdapter> = bt_config
        .data_paths
        .iter()
        .map(|p| CsvAdapter::new(p.clone()))
        .collect();
    let data_ports: Vec<&dyn DataPort> = adapters.iter().map(|a| a as &dyn DataPort).collect();
    let stdout = io::stdout();
    let stderr = io::stderr();
    match run_backtest_pipeline(
        &data_ports,
        &mut strategy,
        &bt_config,
        per_ticker_summary,
        &mut stdout.lock(),
        &mut stderr.lock(),
    ) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Resolve the run parameters; flags win over the config file.
///
/// `data_path` may list several comma-separated sources, one exchange each.
pub fn build_backtest_config(
    adapter: &dyn ConfigPort,
    data_override: &[PathBuf],
    budget_override: Option<f64>,
) -> Result<BacktestConfig, TradeReplayError> {
    let data_paths: Vec<PathBuf> = if data_override.is_empty() {
        adapter
            .get_string("backtest", "data_path")
            .map(|s| parse_data_paths(&s))
            .unwrap_or_default()
    } else {
        data_override.to_vec()
    };
    if data_paths.is_empty() {
        return Err(TradeReplayError::ConfigMissing {
            section: "backtest".into(),
            key: "data_path".into(),
        });
    }

    let initial_budget = budget_override
        .unwrap_or_else(|| adapter.get_double("backtest", "initial_budget", DEFAULT_INITIAL_BUDGET));
    if initial_budget <= 0.0 || !initial_budget.is_finite() {
        return Err(TradeReplayError::ConfigInvalid {
            section: "backtest".into(),
            key: "initial_budget".into(),
            reason: "initial_budget must be positive".into(),
        });
    }

    Ok(BacktestConfig {
        initial_budget,
        data_paths,
    })
}

fn parse_data_paths(input: &str) -> Vec<PathBuf> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Expects a config that already passed `validate_strategy_config`.
pub fn build_strategy(adapter: &dyn ConfigPort) -> ThresholdStrategy {
    ThresholdStrategy {
        buy_threshold: adapter.get_double("strategy", "buy_threshold", 0.0),
        take_profit: adapter.get_double("strategy", "take_profit", DEFAULT_TAKE_PROFIT),
        order_size: adapter.get_int("strategy", "order_size", DEFAULT_ORDER_SIZE),
    }
}

/// Load, replay and report. One exchange is opened per data source, all driven
/// by the same strategy; their results are merged into the reported block.
/// The result block goes to `out`; progress and the per-ticker summary go to
/// `diag`.
pub fn run_backtest_pipeline(
    data_ports: &[&dyn DataPort],
    strategy: &mut ThresholdStrategy,
    bt_config: &BacktestConfig,
    per_ticker_summary: bool,
    out: &mut dyn Write,
    diag: &mut dyn Write,
) -> Result<BacktestResult, TradeReplayError> {
    let mut venues: Vec<Venue<PriceRecord>> = Vec::with_capacity(data_ports.len());
    for data_port in data_ports {
        let series = data_port.load_series()?;
        writeln!(
            diag,
            "Running backtest: {} tickers, {} rows, budget {}",
            series.tickers().len(),
            series.row_count(),
            bt_config.initial_budget
        )?;
        venues.push(Venue::new(
            Exchange::new(bt_config.initial_budget),
            series.into_stream(),
        ));
    }

    let result = backtest_engine::run_connected(strategy, &mut venues)?;

    let mut closed = Vec::new();
    for venue in &venues {
        let exchange = &venue.exchange;
        writeln!(
            diag,
            "  {} orders filled, {} lots closed",
            exchange.transactions().len(),
            exchange.closed_lots().len()
        )?;
        let open = exchange.lot_book().open_tickers();
        if !open.is_empty() {
            writeln!(diag, "  Still open: {}", open.join(", "))?;
        }
        closed.extend_from_slice(exchange.closed_lots());
    }

    let report = ConsoleReport;
    report.write(&result, out)?;

    if per_ticker_summary {
        let summaries = TickerSummary::compute_per_ticker(&closed);
        if !summaries.is_empty() {
            writeln!(diag)?;
            report.write_summary(&result, &summaries, diag)?;
        }
    }

    Ok(result)
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    if let Err(e) = validate_strategy_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let strategy = build_strategy(&adapter);
    eprintln!("\nStrategy:");
    eprintln!("  Buy threshold: {}", strategy.buy_threshold);
    eprintln!("  Take profit:   {:.2}%", strategy.take_profit * 100.0);
    eprintln!("  Order size:    {}", strategy.order_size);

    eprintln!("\nValidation passed");
    ExitCode::SUCCESS
}

fn format_timestamp(record: &PriceRecord) -> String {
    match record.window_start_utc() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => record.window_start.to_string(),
    }
}

fn run_info(data_path: &Path) -> ExitCode {
    let adapter = CsvAdapter::new(data_path.to_path_buf());
    let series = match adapter.load_series() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    println!("{} tickers, {} rows each", series.tickers().len(), series.row_count());
    for ticker in series.tickers() {
        match series.time_range(&ticker) {
            Some((first, last)) => println!(
                "  {}: {} to {} (open {} to {})",
                ticker,
                format_timestamp(first),
                format_timestamp(last),
                first.open,
                last.open
            ),
            None => println!("  {}: no data", ticker),
        }
    }
    ExitCode::SUCCESS
}
