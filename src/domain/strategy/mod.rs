//! Signal-generating strategies.
//!
//! Every variant is an immutable value built once from a [`ParameterSet`] and
//! shared read-only across sweep workers. Dispatch by name goes through
//! [`create_strategy`].

pub mod bollinger;
pub mod ema_cross;
pub mod macd;
pub mod rsi;
pub mod rsi_trend;
pub mod sma_crossover;

pub use bollinger::BollingerReversion;
pub use ema_cross::EmaCross;
pub use macd::MacdMomentum;
pub use rsi::RsiReversion;
pub use rsi_trend::RsiTrend;
pub use sma_crossover::SmaCrossover;

use std::fmt;

use crate::domain::error::RoboError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::{Signal, SignalPlan};

pub trait Strategy: Send + Sync {
    /// Registry name, e.g. `sma_crossover`.
    fn name(&self) -> &'static str;

    fn parameter_names(&self) -> &'static [&'static str];

    fn parameters(&self) -> &ParameterSet;

    /// One signal per bar. Bars inside an indicator warmup are `Hold`.
    fn generate_signals(&self, bars: &[OhlcvBar]) -> Vec<Signal>;

    /// Entry and exit streams consumed by the engine.
    fn generate_plan(&self, bars: &[OhlcvBar]) -> SignalPlan {
        SignalPlan::uniform(self.generate_signals(bars))
    }

    /// Bars needed before the first non-Hold signal can appear.
    fn warmup_bars(&self) -> usize;
}

impl fmt::Debug for dyn Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.parameters())
    }
}

/// Ordered name/value pairs for one strategy run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSet {
    entries: Vec<(String, f64)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        ParameterSet::default()
    }

    /// Inserts or replaces `name`, keeping first-insertion order.
    pub fn set(&mut self, name: &str, value: f64) {
        match self.entries.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, v)| *v).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn require(&self, strategy: &str, name: &str) -> Result<f64, RoboError> {
        match self.get(name) {
            Some(v) if v.is_finite() => Ok(v),
            Some(v) => Err(RoboError::invalid(strategy, name, format!("{} is not finite", v))),
            None => Err(RoboError::MissingParameter {
                strategy: strategy.to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// A window length: a whole number of at least `min` bars.
    pub(crate) fn require_period(
        &self,
        strategy: &str,
        name: &str,
        min: usize,
    ) -> Result<usize, RoboError> {
        let v = self.require(strategy, name)?;
        if v.fract() != 0.0 || v < min as f64 {
            return Err(RoboError::invalid(
                strategy,
                name,
                format!("must be a whole number >= {}, got {}", min, v),
            ));
        }
        Ok(v as usize)
    }

    /// Flags are encoded as 0/1; a missing flag takes `default`.
    pub(crate) fn flag_or(&self, name: &str, default: bool) -> bool {
        self.get(name).map_or(default, |v| v != 0.0)
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for (k, v) in iter {
            set.set(&k.into(), v);
        }
        set
    }
}

/// Names accepted by [`create_strategy`].
pub const STRATEGY_NAMES: &[&str] = &[
    SmaCrossover::NAME,
    RsiReversion::NAME,
    MacdMomentum::NAME,
    BollingerReversion::NAME,
    EmaCross::NAME,
    RsiTrend::NAME,
];

pub fn create_strategy(name: &str, params: &ParameterSet) -> Result<Box<dyn Strategy>, RoboError> {
    let strategy: Box<dyn Strategy> = match name {
        SmaCrossover::NAME => Box::new(SmaCrossover::from_params(params)?),
        RsiReversion::NAME => Box::new(RsiReversion::from_params(params)?),
        MacdMomentum::NAME => Box::new(MacdMomentum::from_params(params)?),
        BollingerReversion::NAME => Box::new(BollingerReversion::from_params(params)?),
        EmaCross::NAME => Box::new(EmaCross::from_params(params)?),
        RsiTrend::NAME => Box::new(RsiTrend::from_params(params)?),
        _ => {
            return Err(RoboError::UnknownStrategy {
                name: name.to_string(),
            });
        }
    };
    Ok(strategy)
}

pub fn parameter_names_for(name: &str) -> Result<&'static [&'static str], RoboError> {
    match name {
        SmaCrossover::NAME => Ok(SmaCrossover::PARAMS),
        RsiReversion::NAME => Ok(RsiReversion::PARAMS),
        MacdMomentum::NAME => Ok(MacdMomentum::PARAMS),
        BollingerReversion::NAME => Ok(BollingerReversion::PARAMS),
        EmaCross::NAME => Ok(EmaCross::PARAMS),
        RsiTrend::NAME => Ok(RsiTrend::PARAMS),
        _ => Err(RoboError::UnknownStrategy {
            name: name.to_string(),
        }),
    }
}

/// Closing price above/below the trend SMA; permissive while the filter is
/// disabled, blocking while it is still warming up.
pub(crate) fn trend_allows(enabled: bool, close: f64, trend: Option<f64>, long: bool) -> bool {
    if !enabled {
        return true;
    }
    match trend {
        Some(t) if long => close > t,
        Some(t) => close < t,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_set_keeps_insertion_order() {
        let params = ParameterSet::new()
            .with("short_window", 5.0)
            .with("long_window", 20.0)
            .with("short_window", 10.0);
        assert_eq!(params.len(), 2);
        assert_eq!(params.to_string(), "short_window=10, long_window=20");
        assert_eq!(params.values(), vec![10.0, 20.0]);
    }

    #[test]
    fn parameter_set_display_keeps_fractions() {
        let params: ParameterSet = [("period", 20.0), ("std_dev", 2.5)].into_iter().collect();
        assert_eq!(params.to_string(), "period=20, std_dev=2.5");
    }

    #[test]
    fn require_period_rejects_fractions() {
        let params = ParameterSet::new().with("period", 14.5);
        let err = params.require_period("rsi", "period", 1).unwrap_err();
        assert!(matches!(err, RoboError::ConfigInvalid { .. }));
    }

    #[test]
    fn missing_parameter_is_reported() {
        let params = ParameterSet::new().with("short_window", 5.0);
        let err = create_strategy("sma_crossover", &params).unwrap_err();
        match err {
            RoboError::MissingParameter { strategy, name } => {
                assert_eq!(strategy, "sma_crossover");
                assert_eq!(name, "long_window");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let err = create_strategy("martingale", &ParameterSet::new()).unwrap_err();
        assert!(matches!(err, RoboError::UnknownStrategy { .. }));
        assert!(parameter_names_for("martingale").is_err());
    }

    #[test]
    fn registry_builds_every_variant() {
        let sets = [
            ("sma_crossover", vec![("short_window", 5.0), ("long_window", 20.0)]),
            ("rsi", vec![("period", 14.0), ("oversold", 30.0), ("overbought", 70.0)]),
            (
                "macd",
                vec![("fast_period", 12.0), ("slow_period", 26.0), ("signal_period", 9.0)],
            ),
            ("bollinger_bands", vec![("period", 20.0), ("std_dev", 2.0)]),
            (
                "ema_cross",
                vec![("fast", 9.0), ("slow", 50.0), ("trend_period", 200.0), ("trend_enabled", 1.0)],
            ),
            (
                "rsi_trend",
                vec![
                    ("period", 14.0),
                    ("oversold", 35.0),
                    ("overbought", 65.0),
                    ("trend_period", 200.0),
                    ("trend_enabled", 0.0),
                ],
            ),
        ];
        for (name, pairs) in sets {
            let params: ParameterSet = pairs.into_iter().collect();
            let strategy = create_strategy(name, &params).unwrap();
            assert_eq!(strategy.name(), name);
            assert_eq!(strategy.parameter_names(), parameter_names_for(name).unwrap());
            assert!(STRATEGY_NAMES.contains(&name));
        }
    }

    #[test]
    fn trend_filter_gates() {
        assert!(trend_allows(false, 10.0, None, true));
        assert!(!trend_allows(true, 10.0, None, true));
        assert!(trend_allows(true, 10.0, Some(9.0), true));
        assert!(!trend_allows(true, 10.0, Some(9.0), false));
        assert!(trend_allows(true, 8.0, Some(9.0), false));
    }
}
