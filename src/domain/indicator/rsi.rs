//! RSI (Relative Strength Index) indicator.
//!
//! Two averaging schemes for the gains/losses of close-to-close deltas:
//! - `Wilder`: first average is the simple mean of the first n deltas,
//!   then avg = (prev_avg * (n-1) + current) / n. If avg_loss == 0: RSI = 100.
//! - `Simple`: plain rolling mean of the last n deltas. RSI is undefined when
//!   the window holds no movement at all.
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//!
//! Warmup: first n bars are invalid (need n price changes).

use crate::domain::indicator::{
    invalid_point, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RsiSmoothing {
    Wilder,
    Simple,
}

pub fn calculate_rsi(bars: &[OhlcvBar], period: usize, smoothing: RsiSmoothing) -> IndicatorSeries {
    let indicator_type = IndicatorType::Rsi { period, smoothing };

    if period == 0 || bars.len() < 2 {
        return IndicatorSeries {
            indicator_type,
            values: bars.iter().map(|b| invalid_point(b.timestamp)).collect(),
        };
    }

    let mut values = Vec::with_capacity(bars.len());
    values.push(invalid_point(bars[0].timestamp));

    let mut gains: Vec<f64> = Vec::with_capacity(bars.len() - 1);
    let mut losses: Vec<f64> = Vec::with_capacity(bars.len() - 1);
    for i in 1..bars.len() {
        let change = bars[i].close - bars[i - 1].close;
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, bar) in bars.iter().enumerate().skip(1) {
        let delta_idx = i - 1;

        if delta_idx + 1 < period {
            values.push(invalid_point(bar.timestamp));
            continue;
        }

        let window_start = delta_idx + 1 - period;
        match smoothing {
            RsiSmoothing::Simple => {
                avg_gain = gains[window_start..=delta_idx].iter().sum::<f64>() / period as f64;
                avg_loss = losses[window_start..=delta_idx].iter().sum::<f64>() / period as f64;
            }
            RsiSmoothing::Wilder if delta_idx + 1 == period => {
                avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
                avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
            }
            RsiSmoothing::Wilder => {
                avg_gain = (avg_gain * (period - 1) as f64 + gains[delta_idx]) / period as f64;
                avg_loss = (avg_loss * (period - 1) as f64 + losses[delta_idx]) / period as f64;
            }
        }

        let rsi = if avg_loss == 0.0 {
            if smoothing == RsiSmoothing::Simple && avg_gain == 0.0 {
                None
            } else {
                Some(100.0)
            }
        } else {
            Some(100.0 - (100.0 / (1.0 + avg_gain / avg_loss)))
        };

        values.push(match rsi {
            Some(v) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Simple(v),
            },
            None => invalid_point(bar.timestamp),
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    fn rsi_at(series: &IndicatorSeries, i: usize) -> f64 {
        match series.values[i].value {
            IndicatorValue::Simple(v) => v,
            _ => panic!("Expected Simple value"),
        }
    }

    #[test]
    fn rsi_empty_bars() {
        let series = calculate_rsi(&[], 14, RsiSmoothing::Wilder);
        assert_eq!(series.values.len(), 0);
    }

    #[test]
    fn rsi_single_bar() {
        let bars = make_bars(&[100.0]);
        let series = calculate_rsi(&bars, 14, RsiSmoothing::Wilder);
        assert_eq!(series.values.len(), 1);
        assert!(!series.values[0].valid);
    }

    #[test]
    fn rsi_warmup_period() {
        let prices: Vec<f64> = (1..=15).map(|i| 100.0 + (i as f64 % 5.0) * 2.0).collect();
        let bars = make_bars(&prices);

        for smoothing in [RsiSmoothing::Wilder, RsiSmoothing::Simple] {
            let series = calculate_rsi(&bars, 14, smoothing);
            assert_eq!(series.values.len(), 15);
            for i in 0..14 {
                assert!(!series.values[i].valid, "Bar {} should be invalid", i);
            }
            assert!(series.values[14].valid, "Bar 14 should be valid");
        }
    }

    #[test]
    fn rsi_all_gains_no_losses() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let series = calculate_rsi(&make_bars(&prices), 14, RsiSmoothing::Wilder);
        assert!((rsi_at(&series, 14) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_all_losses_no_gains() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let series = calculate_rsi(&make_bars(&prices), 14, RsiSmoothing::Simple);
        assert!(rsi_at(&series, 14).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_in_range() {
        let prices: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        let bars = make_bars(&prices);

        for smoothing in [RsiSmoothing::Wilder, RsiSmoothing::Simple] {
            let series = calculate_rsi(&bars, 14, smoothing);
            for v in series.simple_values().into_iter().flatten() {
                assert!((0.0..=100.0).contains(&v), "RSI {} out of range", v);
            }
        }
    }

    #[test]
    fn simple_rsi_flat_window_is_undefined() {
        let bars = make_bars(&[100.0; 20]);
        let series = calculate_rsi(&bars, 14, RsiSmoothing::Simple);
        assert!(series.simple_values().iter().all(|v| v.is_none()));
    }

    #[test]
    fn simple_rsi_uses_rolling_window() {
        // deltas: +2, -1, +1, -2 ; period 2 windows at the last bar: [+1, -2]
        let bars = make_bars(&[10.0, 12.0, 11.0, 12.0, 10.0]);
        let series = calculate_rsi(&bars, 2, RsiSmoothing::Simple);
        let avg_gain = 0.5;
        let avg_loss = 1.0;
        let expected = 100.0 - 100.0 / (1.0 + avg_gain / avg_loss);
        assert!((rsi_at(&series, 4) - expected).abs() < 1e-9);
    }

    #[test]
    fn rsi_zero_period() {
        let bars = make_bars(&[100.0, 101.0]);
        let series = calculate_rsi(&bars, 0, RsiSmoothing::Wilder);
        assert_eq!(series.values.len(), 2);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn rsi_known_calculation() {
        let bars = make_bars(&[
            44.0, 44.25, 44.50, 43.75, 44.50, 44.25, 44.75, 45.25, 45.50, 45.25, 45.50, 46.0,
            46.25, 46.0, 46.50,
        ]);
        let series = calculate_rsi(&bars, 14, RsiSmoothing::Wilder);
        assert!(series.values[14].valid);
        let rsi = rsi_at(&series, 14);
        assert!(rsi > 50.0 && rsi < 100.0, "RSI should be in bullish territory");
    }
}
