//! CSV file data adapter.
//!
//! One `<SYMBOL>.csv` per symbol with header
//! `timestamp,open,high,low,close,volume` (a `date` column is accepted for
//! `timestamp`). Timestamps are `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`.

use crate::domain::error::RoboError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

pub const OHLCV_HEADER: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    /// Writes `bars` to `<base>/<symbol>.csv` in the layout `fetch_ohlcv` reads.
    pub fn write_ohlcv(&self, symbol: &str, bars: &[OhlcvBar]) -> Result<PathBuf, RoboError> {
        fs::create_dir_all(&self.base_path)?;
        let path = self.csv_path(symbol);
        let mut wtr = csv::Writer::from_path(&path)?;
        wtr.write_record(OHLCV_HEADER)?;
        for bar in bars {
            wtr.write_record([
                bar.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                bar.volume.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(path)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn column_index(headers: &csv::StringRecord, name: &str, symbol: &str) -> Result<usize, RoboError> {
    headers
        .iter()
        .position(|h| {
            let h = h.trim().to_lowercase();
            h == name || (name == "timestamp" && h == "date")
        })
        .ok_or_else(|| RoboError::DataValidation {
            symbol: symbol.to_string(),
            reason: format!("missing {} column", name),
        })
}

fn read_bars(path: &Path, symbol: &str) -> Result<Vec<OhlcvBar>, RoboError> {
    let content = fs::read_to_string(path).map_err(|e| {
        RoboError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read {}: {}", path.display(), e),
        ))
    })?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr.headers()?.clone();
    let mut columns = [0usize; 6];
    for (slot, name) in columns.iter_mut().zip(OHLCV_HEADER) {
        *slot = column_index(&headers, name, symbol)?;
    }

    let invalid = |row: usize, reason: String| RoboError::DataValidation {
        symbol: symbol.to_string(),
        reason: format!("row {}: {}", row, reason),
    };

    let mut bars = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let field = |i: usize| record.get(columns[i]).unwrap_or("").trim();

        let timestamp = parse_timestamp(field(0))
            .ok_or_else(|| invalid(row + 1, format!("invalid timestamp '{}'", field(0))))?;

        let mut values = [0.0f64; 5];
        for (offset, value) in values.iter_mut().enumerate() {
            let raw = field(offset + 1);
            *value = raw
                .parse()
                .map_err(|_| invalid(row + 1, format!("invalid {} value '{}'", OHLCV_HEADER[offset + 1], raw)))?;
        }
        let [open, high, low, close, volume] = values;

        bars.push(OhlcvBar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    let total = bars.len();
    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    if bars.len() < total {
        debug!("{}: dropped {} duplicate timestamps", symbol, total - bars.len());
    }
    Ok(bars)
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(&self, symbol: &str) -> Result<Vec<OhlcvBar>, RoboError> {
        read_bars(&self.csv_path(symbol), symbol)
    }

    fn list_symbols(&self) -> Result<Vec<String>, RoboError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            RoboError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read directory {}: {}", self.base_path.display(), e),
            ))
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(symbol) = name.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
