//! Bollinger-band mean reversion: Buy below the lower band, Sell above the upper.

use crate::domain::error::RoboError;
use crate::domain::indicator::{calculate_bollinger, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::Signal;
use crate::domain::strategy::{ParameterSet, Strategy};

#[derive(Debug, Clone)]
pub struct BollingerReversion {
    pub period: usize,
    pub std_dev: f64,
    params: ParameterSet,
}

impl BollingerReversion {
    pub const NAME: &'static str = "bollinger_bands";
    pub const PARAMS: &'static [&'static str] = &["period", "std_dev"];

    pub fn from_params(params: &ParameterSet) -> Result<Self, RoboError> {
        let period = params.require_period(Self::NAME, "period", 2)?;
        let std_dev = params.require(Self::NAME, "std_dev")?;
        if std_dev <= 0.0 {
            return Err(RoboError::invalid(Self::NAME, "std_dev", "must be positive"));
        }
        Ok(BollingerReversion {
            period,
            std_dev,
            params: params.clone(),
        })
    }
}

impl Strategy for BollingerReversion {
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
        let bands = calculate_bollinger(bars, self.period, self.std_dev);
        bars.iter()
            .zip(&bands.values)
            .map(|(bar, p)| match (p.valid, &p.value) {
                (true, IndicatorValue::Bollinger { upper, lower, .. }) => {
                    if bar.close < *lower {
                        Signal::Buy
                    } else if bar.close > *upper {
                        Signal::Sell
                    } else {
                        Signal::Hold
                    }
                }
                _ => Signal::Hold,
            })
            .collect()
    }

    fn warmup_bars(&self) -> usize {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    fn strategy(period: f64, std_dev: f64) -> BollingerReversion {
        let params = ParameterSet::new()
            .with("period", period)
            .with("std_dev", std_dev);
        BollingerReversion::from_params(&params).unwrap()
    }

    #[test]
    fn crash_below_band_buys() {
        let mut prices = vec![100.0, 101.0, 99.0, 100.0, 101.0, 99.0, 100.0];
        prices.push(80.0);
        let signals = strategy(5.0, 1.5).generate_signals(&make_bars(&prices));
        assert_eq!(signals[7], Signal::Buy);
    }

    #[test]
    fn spike_above_band_sells() {
        let mut prices = vec![100.0, 101.0, 99.0, 100.0, 101.0, 99.0, 100.0];
        prices.push(120.0);
        let signals = strategy(5.0, 1.5).generate_signals(&make_bars(&prices));
        assert_eq!(signals[7], Signal::Sell);
    }

    #[test]
    fn inside_bands_holds() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + (i % 2) as f64).collect();
        let signals = strategy(10.0, 2.0).generate_signals(&make_bars(&prices));
        assert!(signals.iter().all(|s| *s == Signal::Hold));
    }

    #[test]
    fn non_positive_width_rejected() {
        let params = ParameterSet::new().with("period", 20.0).with("std_dev", 0.0);
        assert!(BollingerReversion::from_params(&params).is_err());
    }
}
