//! RSI mean reversion: Buy below `oversold`, Sell above `overbought`.
//!
//! Uses the rolling-mean RSI so the sweep reproduces the reference figures.

use crate::domain::error::RoboError;
use crate::domain::indicator::{calculate_rsi, RsiSmoothing};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::Signal;
use crate::domain::strategy::{ParameterSet, Strategy};

#[derive(Debug, Clone)]
pub struct RsiReversion {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
    params: ParameterSet,
}

impl RsiReversion {
    pub const NAME: &'static str = "rsi";
    pub const PARAMS: &'static [&'static str] = &["period", "oversold", "overbought"];

    pub fn from_params(params: &ParameterSet) -> Result<Self, RoboError> {
        let period = params.require_period(Self::NAME, "period", 1)?;
        let (oversold, overbought) = rsi_thresholds(Self::NAME, params)?;
        Ok(RsiReversion {
            period,
            oversold,
            overbought,
            params: params.clone(),
        })
    }
}

/// `oversold` and `overbought`, both within [0, 100] and strictly ordered.
pub(crate) fn rsi_thresholds(strategy: &str, params: &ParameterSet) -> Result<(f64, f64), RoboError> {
    let oversold = params.require(strategy, "oversold")?;
    let overbought = params.require(strategy, "overbought")?;
    for (key, v) in [("oversold", oversold), ("overbought", overbought)] {
        if !(0.0..=100.0).contains(&v) {
            return Err(RoboError::invalid(strategy, key, format!("{} outside 0..=100", v)));
        }
    }
    if oversold >= overbought {
        return Err(RoboError::invalid(
            strategy,
            "oversold",
            format!("must be below overbought ({})", overbought),
        ));
    }
    Ok((oversold, overbought))
}

impl Strategy for RsiReversion {
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
        calculate_rsi(bars, self.period, RsiSmoothing::Simple)
            .simple_values()
            .into_iter()
            .map(|rsi| match rsi {
                Some(v) if v < self.oversold => Signal::Buy,
                Some(v) if v > self.overbought => Signal::Sell,
                _ => Signal::Hold,
            })
            .collect()
    }

    fn warmup_bars(&self) -> usize {
        self.period + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    fn strategy() -> RsiReversion {
        let params = ParameterSet::new()
            .with("period", 14.0)
            .with("oversold", 30.0)
            .with("overbought", 70.0);
        RsiReversion::from_params(&params).unwrap()
    }

    #[test]
    fn oscillation_produces_both_regions() {
        let prices: Vec<f64> = (0..200)
            .map(|i| 100.0 + 10.0 * (2.0 * std::f64::consts::PI * i as f64 / 28.0).sin())
            .collect();
        let signals = strategy().generate_signals(&make_bars(&prices));

        assert_eq!(signals.len(), 200);
        assert!(signals[..14].iter().all(|s| *s == Signal::Hold));
        assert!(signals.contains(&Signal::Buy));
        assert!(signals.contains(&Signal::Sell));
    }

    #[test]
    fn steady_decline_is_oversold() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let signals = strategy().generate_signals(&make_bars(&prices));
        assert_eq!(signals[19], Signal::Buy);
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let params = ParameterSet::new()
            .with("period", 14.0)
            .with("oversold", 70.0)
            .with("overbought", 30.0);
        assert!(matches!(
            RsiReversion::from_params(&params),
            Err(RoboError::ConfigInvalid { .. })
        ));
    }
}
