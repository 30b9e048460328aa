//! Symbol universe: parses symbol lists and loads a validated series per symbol.
//!
//! A symbol whose data cannot be fetched or fails validation is dropped with a
//! warning; the run continues with the rest.

use std::collections::HashSet;

use log::{info, warn};

use crate::domain::error::RoboError;
use crate::domain::ohlcv::{validate_series, SymbolSeries};
use crate::ports::data_port::DataPort;

/// Fewer bars than this cannot warm up any registered strategy.
pub const MIN_OHLCV_BARS: usize = 30;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

impl From<UniverseError> for RoboError {
    fn from(err: UniverseError) -> Self {
        RoboError::invalid("sweep", "symbols", err.to_string())
    }
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData(String),
    Invalid(String),
    InsufficientBars { bars: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct Universe {
    pub series: Vec<SymbolSeries>,
    pub skipped: Vec<SkippedSymbol>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.series.len()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.symbol.as_str()).collect()
    }
}

/// Fetches and validates every symbol, in the order given.
///
/// Fails with `InsufficientData` only when no symbol survives.
pub fn load_universe(data_port: &dyn DataPort, symbols: &[String]) -> Result<Universe, RoboError> {
    let mut series = Vec::new();
    let mut skipped = Vec::new();

    for symbol in symbols {
        let bars = match data_port.fetch_ohlcv(symbol) {
            Ok(bars) => bars,
            Err(e) => {
                warn!("skipping {} ({})", symbol, e);
                skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    reason: SkipReason::NoData(e.to_string()),
                });
                continue;
            }
        };

        if bars.len() < MIN_OHLCV_BARS {
            warn!(
                "skipping {} (only {} bars, minimum {} required)",
                symbol,
                bars.len(),
                MIN_OHLCV_BARS
            );
            skipped.push(SkippedSymbol {
                symbol: symbol.clone(),
                reason: SkipReason::InsufficientBars { bars: bars.len() },
            });
            continue;
        }

        match validate_series(symbol, &bars) {
            Ok(zero_volume) => {
                if zero_volume > 0 {
                    warn!("{}: {} bars with zero volume", symbol, zero_volume);
                }
                info!("{}: {} bars [OK]", symbol, bars.len());
                series.push(SymbolSeries::new(symbol.clone(), bars));
            }
            Err(e) => {
                warn!("skipping {} ({})", symbol, e);
                skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    reason: SkipReason::Invalid(e.to_string()),
                });
            }
        }
    }

    if series.is_empty() {
        return Err(RoboError::InsufficientData {
            symbol: "all".to_string(),
            bars: 0,
            minimum: MIN_OHLCV_BARS,
        });
    }

    if !skipped.is_empty() {
        info!("Using {} of {} symbols", series.len(), symbols.len());
    }

    Ok(Universe { series, skipped })
}
