//! EMA crossover with an SMA trend filter.
//!
//! Entries fire on the crossing bar only: a bullish cross above the trend SMA
//! is a long entry, a bearish cross below it is a short entry. Exits ignore
//! the filter and fire on the opposite cross.

use crate::domain::error::RoboError;
use crate::domain::indicator::{calculate_ema, calculate_sma};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::{crossed_above, crossed_below, Signal, SignalPlan};
use crate::domain::strategy::{trend_allows, ParameterSet, Strategy};

pub const DEFAULT_TREND_PERIOD: usize = 200;

#[derive(Debug, Clone)]
pub struct EmaCross {
    pub fast: usize,
    pub slow: usize,
    pub trend_period: usize,
    pub trend_enabled: bool,
    params: ParameterSet,
}

impl EmaCross {
    pub const NAME: &'static str = "ema_cross";
    pub const PARAMS: &'static [&'static str] = &["fast", "slow", "trend_period", "trend_enabled"];

    pub fn from_params(params: &ParameterSet) -> Result<Self, RoboError> {
        let fast = params.require_period(Self::NAME, "fast", 1)?;
        let slow = params.require_period(Self::NAME, "slow", 1)?;
        if fast >= slow {
            return Err(RoboError::invalid(
                Self::NAME,
                "fast",
                format!("must be below slow ({})", slow),
            ));
        }
        let trend_period = match params.get("trend_period") {
            Some(_) => params.require_period(Self::NAME, "trend_period", 1)?,
            None => DEFAULT_TREND_PERIOD,
        };
        Ok(EmaCross {
            fast,
            slow,
            trend_period,
            trend_enabled: params.flag_or("trend_enabled", true),
            params: params.clone(),
        })
    }
}

impl Strategy for EmaCross {
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
        self.generate_plan(bars).entries
    }

    fn generate_plan(&self, bars: &[OhlcvBar]) -> SignalPlan {
        let fast = calculate_ema(bars, self.fast).simple_values();
        let slow = calculate_ema(bars, self.slow).simple_values();
        let trend = if self.trend_enabled {
            calculate_sma(bars, self.trend_period).simple_values()
        } else {
            vec![None; bars.len()]
        };

        let mut entries = vec![Signal::Hold; bars.len()];
        let mut exits = vec![Signal::Hold; bars.len()];
        for (i, bar) in bars.iter().enumerate() {
            if crossed_above(&fast, &slow, i) {
                exits[i] = Signal::Buy;
                if trend_allows(self.trend_enabled, bar.close, trend[i], true) {
                    entries[i] = Signal::Buy;
                }
            } else if crossed_below(&fast, &slow, i) {
                exits[i] = Signal::Sell;
                if trend_allows(self.trend_enabled, bar.close, trend[i], false) {
                    entries[i] = Signal::Sell;
                }
            }
        }

        SignalPlan { entries, exits }
    }

    fn warmup_bars(&self) -> usize {
        if self.trend_enabled {
            self.slow.max(self.trend_period)
        } else {
            self.slow + 1
        }
    }
}
