//! MACD momentum: Buy while the MACD line is above its signal line.

use crate::domain::error::RoboError;
use crate::domain::indicator::{calculate_macd, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::Signal;
use crate::domain::strategy::{ParameterSet, Strategy};

#[derive(Debug, Clone)]
pub struct MacdMomentum {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
    params: ParameterSet,
}

impl MacdMomentum {
    pub const NAME: &'static str = "macd";
    pub const PARAMS: &'static [&'static str] = &["fast_period", "slow_period", "signal_period"];

    pub fn from_params(params: &ParameterSet) -> Result<Self, RoboError> {
        let fast_period = params.require_period(Self::NAME, "fast_period", 1)?;
        let slow_period = params.require_period(Self::NAME, "slow_period", 1)?;
        let signal_period = params.require_period(Self::NAME, "signal_period", 1)?;
        if fast_period >= slow_period {
            return Err(RoboError::invalid(
                Self::NAME,
                "fast_period",
                format!("must be below slow_period ({})", slow_period),
            ));
        }
        Ok(MacdMomentum {
            fast_period,
            slow_period,
            signal_period,
            params: params.clone(),
        })
    }
}

impl Strategy for MacdMomentum {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        Self::PARAMS
    }

    fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    fn generate_signals(&self, bars: &[OhlcvBar]) -> Vec<Signal> {
        calculate_macd(bars, self.fast_period, self.slow_period, self.signal_period)
            .values
            .iter()
            .map(|p| match (p.valid, &p.value) {
                (true, IndicatorValue::Macd { line, signal, .. }) => {
                    Signal::from_levels(Some(*line), Some(*signal))
                }
                _ => Signal::Hold,
            })
            .collect()
    }

    fn warmup_bars(&self) -> usize {
        self.slow_period + self.signal_period - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    fn strategy(fast: f64, slow: f64, signal: f64) -> MacdMomentum {
        let params = ParameterSet::new()
            .with("fast_period", fast)
            .with("slow_period", slow)
            .with("signal_period", signal);
        MacdMomentum::from_params(&params).unwrap()
    }

    #[test]
    fn warmup_is_hold() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let s = strategy(12.0, 26.0, 9.0);
        let signals = s.generate_signals(&make_bars(&prices));
        assert_eq!(signals.len(), 40);
        assert!(signals[..s.warmup_bars() - 1].iter().all(|x| *x == Signal::Hold));
    }

    #[test]
    fn accelerating_rally_is_bullish() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + (i * i) as f64 * 0.05).collect();
        let signals = strategy(3.0, 6.0, 3.0).generate_signals(&make_bars(&prices));
        assert_eq!(signals[59], Signal::Buy);
    }

    #[test]
    fn accelerating_decline_is_bearish() {
        let prices: Vec<f64> = (0..60).map(|i| 500.0 - (i * i) as f64 * 0.05).collect();
        let signals = strategy(3.0, 6.0, 3.0).generate_signals(&make_bars(&prices));
        assert_eq!(signals[59], Signal::Sell);
    }

    #[test]
    fn fast_must_be_below_slow() {
        let params = ParameterSet::new()
            .with("fast_period", 26.0)
            .with("slow_period", 12.0)
            .with("signal_period", 9.0);
        assert!(MacdMomentum::from_params(&params).is_err());
    }
}
