#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use robo::domain::error::RoboError;
pub use robo::domain::ohlcv::{OhlcvBar, SymbolSeries};
use robo::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(&self, symbol: &str) -> Result<Vec<OhlcvBar>, RoboError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(RoboError::DataValidation {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).cloned().unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, RoboError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn day(offset: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(offset as i64)
}

/// Flat bar: open, high, low and close all equal.
pub fn make_bar(offset: usize, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp: day(offset),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000.0,
    }
}

/// Bar with a 1% range either side of the close.
pub fn make_ranged_bar(offset: usize, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp: day(offset),
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 1000.0,
    }
}

pub fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
    closes.iter().enumerate().map(|(i, &c)| make_bar(i, c)).collect()
}

pub fn rising(n: usize, start: f64, step: f64) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

pub fn sinusoid(n: usize, period: f64, mid: f64, amplitude: f64) -> Vec<f64> {
    (0..n)
        .map(|i| mid + amplitude * (2.0 * std::f64::consts::PI * i as f64 / period).sin())
        .collect()
}

pub fn series(symbol: &str, closes: &[f64]) -> SymbolSeries {
    SymbolSeries::new(symbol, bars_from_closes(closes))
}
