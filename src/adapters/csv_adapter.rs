//! CSV flat-file data adapter.
//!
//! Reads aggregate files with the header
//! `ticker,volume,open,close,high,low,window_start,transactions`.
//! A path may name one file or a directory; directories are walked
//! recursively in sorted order and rows are appended per ticker in that order.

use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::error::TradeReplayError;
use crate::domain::price::PriceRecord;
use crate::domain::stream::PriceSeries;
use crate::ports::data_port::DataPort;

pub const EXPECTED_HEADER: [&str; 8] = [
    "ticker",
    "volume",
    "open",
    "close",
    "high",
    "low",
    "window_start",
    "transactions",
];

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn data_files(&self) -> Result<Vec<PathBuf>, TradeReplayError> {
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }
        if !self.path.is_dir() {
            return Err(TradeReplayError::MissingData {
                reason: format!("{} does not exist", self.path.display()),
            });
        }

        let mut files = Vec::new();
        walk(&self.path, &mut files)?;
        if files.is_empty() {
            return Err(TradeReplayError::MissingData {
                reason: format!("no data files under {}", self.path.display()),
            });
        }
        Ok(files)
    }
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), TradeReplayError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| TradeReplayError::MissingData {
            reason: format!("failed to read directory {}: {}", dir.display(), e),
        })?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            walk(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

fn parse_field<T>(
    record: &csv::StringRecord,
    index: usize,
    file: &Path,
    line: u64,
) -> Result<T, TradeReplayError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let name = EXPECTED_HEADER[index];
    let raw = record.get(index).ok_or_else(|| TradeReplayError::MissingData {
        reason: format!("{}:{}: missing {} column", file.display(), line, name),
    })?;
    raw.trim().parse().map_err(|e| TradeReplayError::MissingData {
        reason: format!("{}:{}: invalid {} value {:?}: {}", file.display(), line, name, raw, e),
    })
}

/// Parse one file into per-ticker records, in file order.
pub fn parse_file(path: &Path) -> Result<HashMap<String, Vec<PriceRecord>>, TradeReplayError> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| TradeReplayError::MissingData {
        reason: format!("failed to open {}: {}", path.display(), e),
    })?;

    let headers = rdr.headers().map_err(|e| TradeReplayError::MissingData {
        reason: format!("{}: unreadable header: {}", path.display(), e),
    })?;
    if headers.iter().ne(EXPECTED_HEADER.iter().copied()) {
        return Err(TradeReplayError::MissingData {
            reason: format!(
                "{}: unexpected header {:?}, expected {}",
                path.display(),
                headers.iter().collect::<Vec<_>>(),
                EXPECTED_HEADER.join(",")
            ),
        });
    }

    let mut parsed: HashMap<String, Vec<PriceRecord>> = HashMap::new();
    for result in rdr.records() {
        let record = result.map_err(|e| TradeReplayError::MissingData {
            reason: format!("{}: CSV parse error: {}", path.display(), e),
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let ticker: String = parse_field(&record, 0, path, line)?;
        let price = PriceRecord {
            volume: parse_field(&record, 1, path, line)?,
            open: parse_field(&record, 2, path, line)?,
            close: parse_field(&record, 3, path, line)?,
            high: parse_field(&record, 4, path, line)?,
            low: parse_field(&record, 5, path, line)?,
            window_start: parse_field(&record, 6, path, line)?,
            transactions: parse_field(&record, 7, path, line)?,
            ticker: ticker.clone(),
        };
        parsed.entry(ticker).or_default().push(price);
    }

    debug!("parsed {} tickers from {}", parsed.len(), path.display());
    Ok(parsed)
}

impl DataPort for CsvAdapter {
    fn load_series(&self) -> Result<PriceSeries, TradeReplayError> {
        let mut merged: HashMap<String, Vec<PriceRecord>> = HashMap::new();
        for file in self.data_files()? {
            for (ticker, records) in parse_file(&file)? {
                merged.entry(ticker).or_default().extend(records);
            }
        }

        let series = PriceSeries::new(merged)?;
        info!(
            "loaded {} tickers x {} rows from {}",
            series.tickers().len(),
            series.row_count(),
            self.path.display()
        );
        Ok(series)
    }
}
