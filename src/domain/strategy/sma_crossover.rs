//! Moving-average crossover in level form.
//!
//! Emits Buy on every bar where the short SMA is above the long SMA and Sell on
//! every bar where it is below. The engine treats repeats as "hold state".

use crate::domain::error::RoboError;
use crate::domain::indicator::calculate_sma;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::Signal;
use crate::domain::strategy::{ParameterSet, Strategy};

#[derive(Debug, Clone)]
pub struct SmaCrossover {
    pub short_window: usize,
    pub long_window: usize,
    params: ParameterSet,
}

impl SmaCrossover {
    pub const NAME: &'static str = "sma_crossover";
    pub const PARAMS: &'static [&'static str] = &["short_window", "long_window"];

    pub fn from_params(params: &ParameterSet) -> Result<Self, RoboError> {
        let short_window = params.require_period(Self::NAME, "short_window", 1)?;
        let long_window = params.require_period(Self::NAME, "long_window", 1)?;
        if short_window >= long_window {
            return Err(RoboError::invalid(
                Self::NAME,
                "short_window",
                format!("must be below long_window ({})", long_window),
            ));
        }
        Ok(SmaCrossover {
            short_window,
            long_window,
            params: params.clone(),
        })
    }
}

impl Strategy for SmaCrossover {
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
        let short = calculate_sma(bars, self.short_window).simple_values();
        let long = calculate_sma(bars, self.long_window).simple_values();
        short
            .into_iter()
            .zip(long)
            .map(|(s, l)| Signal::from_levels(s, l))
            .collect()
    }

    fn warmup_bars(&self) -> usize {
        self.long_window
    }
}
