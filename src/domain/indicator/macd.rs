//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: max(fast, slow) - 1 + signal - 1 bars.

use crate::domain::indicator::ema::ema_of;
use crate::domain::indicator::{
    invalid_point, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    bars: &[OhlcvBar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let closes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
    let ema_fast = ema_of(&closes, fast);
    let ema_slow = ema_of(&closes, slow);

    let macd_line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();
    let signal_line = ema_of(&macd_line, signal_period);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match (macd_line[i], signal_line[i]) {
            (Some(line), Some(signal)) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Macd {
                    line,
                    signal,
                    histogram: line - signal,
                },
            },
            _ => invalid_point(bar.timestamp),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Macd {
            fast,
            slow,
            signal: signal_period,
        },
        values,
    }
}

pub fn calculate_macd_default(bars: &[OhlcvBar]) -> IndicatorSeries {
    calculate_macd(bars, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    fn macd_at(series: &IndicatorSeries, i: usize) -> (f64, f64, f64) {
        match series.values[i].value {
            IndicatorValue::Macd {
                line,
                signal,
                histogram,
            } => (line, signal, histogram),
            _ => panic!("Expected MACD value"),
        }
    }

    #[test]
    fn macd_warmup_uses_longer_span() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&prices);
        let series = calculate_macd(&bars, 3, 5, 2);

        // slow EMA valid from 4, signal EMA needs two MACD values: first valid at 5
        for i in 0..5 {
            assert!(!series.values[i].valid, "bar {} should be invalid", i);
        }
        assert!(series.values[5].valid);
    }

    #[test]
    fn macd_warmup_when_fast_is_longer() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let series = calculate_macd(&make_bars(&prices), 6, 3, 2);
        assert!(!series.values[5].valid);
        assert!(series.values[6].valid);
    }

    #[test]
    fn macd_histogram_is_difference() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.4).sin() * 5.0).collect();
        let series = calculate_macd(&make_bars(&prices), 12, 26, 9);
        for i in 34..40 {
            let (line, signal, histogram) = macd_at(&series, i);
            assert!((histogram - (line - signal)).abs() < 1e-12);
        }
    }

    #[test]
    fn macd_rising_prices_positive_line() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 2.0).collect();
        let series = calculate_macd_default(&make_bars(&prices));
        let (line, _, _) = macd_at(&series, 59);
        assert!(line > 0.0);
    }

    #[test]
    fn macd_zero_period_keeps_length() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        let series = calculate_macd(&bars, 0, 26, 9);
        assert_eq!(series.len(), 3);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
