//! OHLCV bar representation and series validation.

use chrono::NaiveDateTime;

use super::error::RoboError;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Ordered bars for one symbol, as handed over by a data port.
#[derive(Debug, Clone)]
pub struct SymbolSeries {
    pub symbol: String,
    pub bars: Vec<OhlcvBar>,
}

impl SymbolSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<OhlcvBar>) -> Self {
        SymbolSeries {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

pub fn closes(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Check the pre-validation contract: finite non-negative prices, a consistent
/// high/low envelope and strictly increasing timestamps.
///
/// Returns the number of zero-volume bars, which are tolerated.
pub fn validate_series(symbol: &str, bars: &[OhlcvBar]) -> Result<usize, RoboError> {
    let fail = |i: usize, reason: &str| RoboError::DataValidation {
        symbol: symbol.to_string(),
        reason: format!("bar {} ({}): {}", i, bars[i].timestamp, reason),
    };

    if bars.is_empty() {
        return Err(RoboError::DataValidation {
            symbol: symbol.to_string(),
            reason: "series is empty".to_string(),
        });
    }

    let mut zero_volume = 0;
    for (i, bar) in bars.iter().enumerate() {
        let fields = [bar.open, bar.high, bar.low, bar.close, bar.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(fail(i, "missing or non-finite value"));
        }
        if fields.iter().any(|&v| v < 0.0) {
            return Err(fail(i, "negative value"));
        }
        if bar.high < bar.low {
            return Err(fail(i, "high below low"));
        }
        if bar.high < bar.open || bar.high < bar.close {
            return Err(fail(i, "high below open/close"));
        }
        if bar.low > bar.open || bar.low > bar.close {
            return Err(fail(i, "low above open/close"));
        }
        if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
            return Err(fail(i, "timestamps not strictly increasing"));
        }
        if bar.volume == 0.0 {
            zero_volume += 1;
        }
    }

    Ok(zero_volume)
}
