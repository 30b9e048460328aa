//! Average True Range (Wilder smoothing).
//!
//! TR[0] = high - low, TR[i] = max(H-L, |H-C[i-1]|, |L-C[i-1]|).
//! ATR seeds with the mean of the first n true ranges, then
//! ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{
    invalid_point, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_atr(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut tr_sum = 0.0;
    let mut atr = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };

        if period == 0 || i + 1 < period {
            tr_sum += tr;
            values.push(invalid_point(bar.timestamp));
            continue;
        }

        atr = if i + 1 == period {
            (tr_sum + tr) / period as f64
        } else {
            (atr * (period - 1) as f64 + tr) / period as f64
        };
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid: true,
            value: IndicatorValue::Simple(atr),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(day: u32, high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn atr_basic() {
        let bars: Vec<OhlcvBar> = (0..5)
            .map(|i| make_bar(i + 1, 110.0, 90.0, 100.0))
            .collect();
        let series = calculate_atr(&bars, 3);

        assert_eq!(series.len(), 5);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        for v in series.simple_values().into_iter().skip(2) {
            assert!((v.unwrap() - 20.0).abs() < 1e-10);
        }
    }

    #[test]
    fn atr_wilder_smoothing() {
        let bars = vec![
            make_bar(1, 12.0, 10.0, 11.0),
            make_bar(2, 13.0, 11.0, 12.0),
            make_bar(3, 18.0, 12.0, 17.0),
        ];
        let values = calculate_atr(&bars, 2).simple_values();
        // TR: 2, 2, 6 ; seed (2+2)/2 = 2 ; then (2*1 + 6)/2 = 4
        assert!((values[1].unwrap() - 2.0).abs() < 1e-12);
        assert!((values[2].unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn atr_short_series_keeps_length() {
        let bars = vec![make_bar(1, 11.0, 9.0, 10.0), make_bar(2, 11.0, 9.0, 10.0)];
        let series = calculate_atr(&bars, 14);
        assert_eq!(series.len(), 2);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn atr_gap_uses_previous_close() {
        let bars = vec![make_bar(1, 101.0, 99.0, 100.0), make_bar(2, 121.0, 119.0, 120.0)];
        let values = calculate_atr(&bars, 1).simple_values();
        assert!((values[1].unwrap() - 21.0).abs() < 1e-12);
    }
}
