//! Rolling Standard Deviation indicator.
//!
//! Sample standard deviation (n-1 denominator) over n closing prices.
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n-1) / (n-1))
//! Warmup: first (n-1) bars are invalid. Periods below 2 are never valid.

use crate::domain::indicator::{
    invalid_point, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_stddev(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let values = rolling_mean_std(bars, period)
        .into_iter()
        .zip(bars)
        .map(|(stats, bar)| match stats {
            Some((_, std)) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Simple(std),
            },
            None => invalid_point(bar.timestamp),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Stddev(period),
        values,
    }
}

/// (mean, sample std) of the close over each trailing window of `period` bars.
pub(crate) fn rolling_mean_std(bars: &[OhlcvBar], period: usize) -> Vec<Option<(f64, f64)>> {
    let mut out = vec![None; bars.len()];
    if period < 2 {
        return out;
    }

    for i in (period - 1)..bars.len() {
        let window = &bars[i + 1 - period..=i];
        let mean = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|b| {
                let diff = b.close - mean;
                diff * diff
            })
            .sum::<f64>()
            / (period - 1) as f64;
        out[i] = Some((mean, variance.sqrt()));
    }

    out
}
