//! Wilder RSI with an SMA trend filter.
//!
//! Long entry: RSI < oversold and close above the trend SMA.
//! Short entry: RSI > overbought and close below the trend SMA.
//! Exit long once RSI >= overbought, exit short once RSI <= oversold.

use crate::domain::error::RoboError;
use crate::domain::indicator::{calculate_rsi, calculate_sma, RsiSmoothing};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::{Signal, SignalPlan};
use crate::domain::strategy::ema_cross::DEFAULT_TREND_PERIOD;
use crate::domain::strategy::rsi::rsi_thresholds;
use crate::domain::strategy::{trend_allows, ParameterSet, Strategy};

#[derive(Debug, Clone)]
pub struct RsiTrend {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub trend_period: usize,
    pub trend_enabled: bool,
    params: ParameterSet,
}

impl RsiTrend {
    pub const NAME: &'static str = "rsi_trend";
    pub const PARAMS: &'static [&'static str] =
        &["period", "oversold", "overbought", "trend_period", "trend_enabled"];

    pub fn from_params(params: &ParameterSet) -> Result<Self, RoboError> {
        let period = params.require_period(Self::NAME, "period", 1)?;
        let (oversold, overbought) = rsi_thresholds(Self::NAME, params)?;
        let trend_period = match params.get("trend_period") {
            Some(_) => params.require_period(Self::NAME, "trend_period", 1)?,
            None => DEFAULT_TREND_PERIOD,
        };
        Ok(RsiTrend {
            period,
            oversold,
            overbought,
            trend_period,
            trend_enabled: params.flag_or("trend_enabled", true),
            params: params.clone(),
        })
    }
}

impl Strategy for RsiTrend {
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
        let rsi = calculate_rsi(bars, self.period, RsiSmoothing::Wilder).simple_values();
        let trend = if self.trend_enabled {
            calculate_sma(bars, self.trend_period).simple_values()
        } else {
            vec![None; bars.len()]
        };

        let mut entries = vec![Signal::Hold; bars.len()];
        let mut exits = vec![Signal::Hold; bars.len()];
        for (i, bar) in bars.iter().enumerate() {
            let Some(r) = rsi[i] else {
                continue;
            };
            if r < self.oversold && trend_allows(self.trend_enabled, bar.close, trend[i], true) {
                entries[i] = Signal::Buy;
            } else if r > self.overbought
                && trend_allows(self.trend_enabled, bar.close, trend[i], false)
            {
                entries[i] = Signal::Sell;
            }

            if r >= self.overbought {
                exits[i] = Signal::Sell;
            } else if r <= self.oversold {
                exits[i] = Signal::Buy;
            }
        }

        SignalPlan { entries, exits }
    }

    fn warmup_bars(&self) -> usize {
        if self.trend_enabled {
            (self.period + 1).max(self.trend_period)
        } else {
            self.period + 1
        }
    }
}
