//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the sample standard deviation (divides by N-1), matching
//! [`calculate_stddev`](super::calculate_stddev).
//!
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::stddev::rolling_mean_std;
use crate::domain::indicator::{
    IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_bollinger(bars: &[OhlcvBar], period: usize, stddev_mult: f64) -> IndicatorSeries {
    let values = rolling_mean_std(bars, period)
        .into_iter()
        .zip(bars)
        .map(|(stats, bar)| {
            let (valid, upper, middle, lower) = match stats {
                Some((mean, std)) => (true, mean + stddev_mult * std, mean, mean - stddev_mult * std),
                None => (false, 0.0, 0.0, 0.0),
            };
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid,
                value: IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100: (stddev_mult * 100.0).round() as u32,
        },
        values,
    }
}
