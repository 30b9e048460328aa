//! Typed run configuration built from a [`ConfigPort`].
//!
//! The values are read once, validated, and then passed by reference into
//! every simulation. Nothing here is mutated after construction.

use crate::domain::backtest::{BracketConfig, EngineConfig, ExitMode};
use crate::domain::config_validation::{
    flag, name_list, number, number_or, parse_values, period_or, split_names, trade_direction,
    validate_backtest_config, validate_risk_config, validate_strategy_config, validate_sweep_config,
    DEFAULT_ATR_PERIOD, DEFAULT_EMA_FAST, DEFAULT_EMA_SLOW, DEFAULT_RSI_OVERBOUGHT,
    DEFAULT_RSI_OVERSOLD, DEFAULT_RSI_PERIOD,
};
use crate::domain::error::RoboError;
use crate::domain::metrics::TRADING_DAYS_PER_YEAR;
use crate::domain::position::TradeDirection;
use crate::domain::risk::RiskConfig;
use crate::domain::strategy::ema_cross::DEFAULT_TREND_PERIOD;
use crate::domain::strategy::{
    parameter_names_for, EmaCross, ParameterSet, RsiReversion, RsiTrend, STRATEGY_NAMES,
};
use crate::domain::sweep::{
    default_param_ranges, ParamRange, DEFAULT_COMMISSION, DEFAULT_INITIAL_CAPITAL, DEFAULT_SYMBOLS,
};
use crate::ports::config_port::ConfigPort;

/// `[indicators]`
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSettings {
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub trend_period: usize,
    pub trend_enabled: bool,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub atr_period: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        IndicatorSettings {
            rsi_period: DEFAULT_RSI_PERIOD,
            rsi_oversold: DEFAULT_RSI_OVERSOLD,
            rsi_overbought: DEFAULT_RSI_OVERBOUGHT,
            trend_period: DEFAULT_TREND_PERIOD,
            trend_enabled: true,
            ema_fast: DEFAULT_EMA_FAST,
            ema_slow: DEFAULT_EMA_SLOW,
            atr_period: DEFAULT_ATR_PERIOD,
        }
    }
}

impl IndicatorSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RoboError> {
        let d = IndicatorSettings::default();
        Ok(IndicatorSettings {
            rsi_period: period_or(config, "indicators", "rsi.period", d.rsi_period)?,
            rsi_oversold: number_or(config, "indicators", "rsi.oversold", d.rsi_oversold)?,
            rsi_overbought: number_or(config, "indicators", "rsi.overbought", d.rsi_overbought)?,
            trend_period: period_or(config, "indicators", "sma_trend.period", d.trend_period)?,
            trend_enabled: flag(config, "indicators", "sma_trend.enabled", d.trend_enabled)?,
            ema_fast: period_or(config, "indicators", "ema.fast", d.ema_fast)?,
            ema_slow: period_or(config, "indicators", "ema.slow", d.ema_slow)?,
            atr_period: period_or(config, "indicators", "atr.period", d.atr_period)?,
        })
    }
}

pub fn risk_config_from(config: &dyn ConfigPort) -> Result<RiskConfig, RoboError> {
    let d = RiskConfig::default();
    let s = "risk_management";
    Ok(RiskConfig {
        risk_per_trade_percent: number_or(config, s, "risk_per_trade_percent", d.risk_per_trade_percent)?,
        max_position_size_percent: number_or(
            config,
            s,
            "max_position_size_percent",
            d.max_position_size_percent,
        )?,
        stop_loss_atr_multiplier: number_or(config, s, "stop_loss.atr_multiplier", d.stop_loss_atr_multiplier)?,
        take_profit_atr_multiplier: number_or(
            config,
            s,
            "take_profit.atr_multiplier",
            d.take_profit_atr_multiplier,
        )?,
        max_concurrent_positions: period_or(config, s, "max_concurrent_positions", d.max_concurrent_positions)?,
        max_correlated_positions: period_or(config, s, "max_correlated_positions", d.max_correlated_positions)?,
        daily_loss_limit_percent: number_or(config, s, "daily_loss_limit_percent", d.daily_loss_limit_percent)?,
        correlation_threshold: number_or(config, s, "correlation_threshold", d.correlation_threshold)?,
    })
}

/// `[backtest]`
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub initial_capital: f64,
    pub commission: f64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        BacktestSettings {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            commission: DEFAULT_COMMISSION,
        }
    }
}

impl BacktestSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RoboError> {
        validate_backtest_config(config)?;
        let d = BacktestSettings::default();
        Ok(BacktestSettings {
            initial_capital: number_or(config, "backtest", "initial_capital", d.initial_capital)?,
            commission: number_or(config, "backtest", "commission", d.commission)?,
        })
    }
}

/// A configured single-strategy run in bracket mode.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub strategy: String,
    pub trade_direction: TradeDirection,
    pub indicators: IndicatorSettings,
    pub risk: RiskConfig,
    pub backtest: BacktestSettings,
    /// `[parameters]` overrides, in the strategy's parameter order.
    pub overrides: ParameterSet,
}

impl RunConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RoboError> {
        validate_strategy_config(config)?;
        validate_risk_config(config)?;
        let backtest = BacktestSettings::from_config(config)?;

        let strategy = config
            .get_string("strategy", "name")
            .map(|s| s.trim().to_lowercase())
            .ok_or_else(|| RoboError::ConfigMissing {
                section: "strategy".to_string(),
                key: "name".to_string(),
            })?;

        let mut overrides = ParameterSet::new();
        for name in parameter_names_for(&strategy)? {
            if let Some(value) = number(config, "parameters", name)? {
                overrides.set(name, value);
            }
        }

        Ok(RunConfig {
            trade_direction: trade_direction(config)?,
            indicators: IndicatorSettings::from_config(config)?,
            risk: risk_config_from(config)?,
            backtest,
            overrides,
            strategy,
        })
    }

    /// Parameters for the configured strategy: the indicator settings the
    /// strategy understands, then any `[parameters]` overrides.
    pub fn strategy_parameters(&self) -> ParameterSet {
        let ind = &self.indicators;
        let trend_enabled = if ind.trend_enabled { 1.0 } else { 0.0 };
        let mut params = match self.strategy.as_str() {
            EmaCross::NAME => ParameterSet::new()
                .with("fast", ind.ema_fast as f64)
                .with("slow", ind.ema_slow as f64)
                .with("trend_period", ind.trend_period as f64)
                .with("trend_enabled", trend_enabled),
            RsiTrend::NAME => ParameterSet::new()
                .with("period", ind.rsi_period as f64)
                .with("oversold", ind.rsi_oversold)
                .with("overbought", ind.rsi_overbought)
                .with("trend_period", ind.trend_period as f64)
                .with("trend_enabled", trend_enabled),
            RsiReversion::NAME => ParameterSet::new()
                .with("period", ind.rsi_period as f64)
                .with("oversold", ind.rsi_oversold)
                .with("overbought", ind.rsi_overbought),
            _ => ParameterSet::new(),
        };
        for (name, value) in self.overrides.iter() {
            params.set(name, value);
        }
        params
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_capital: self.backtest.initial_capital,
            commission: self.backtest.commission,
            trade_direction: self.trade_direction,
            exit_mode: ExitMode::Bracket(BracketConfig {
                atr_period: self.indicators.atr_period,
                stop_loss_atr_multiplier: self.risk.stop_loss_atr_multiplier,
                take_profit_atr_multiplier: self.risk.take_profit_atr_multiplier,
                ..BracketConfig::default()
            }),
            periods_per_year: TRADING_DAYS_PER_YEAR,
        }
    }
}

/// `[sweep]` plus one `[sweep.<strategy>]` section per strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub strategies: Vec<String>,
    pub symbols: Vec<String>,
    pub backtest: BacktestSettings,
    /// Value grids in `strategies` order.
    pub ranges: Vec<(String, Vec<ParamRange>)>,
}

impl SweepConfig {
    /// Built-in grids for the four level strategies over the default symbols.
    pub fn defaults() -> Self {
        let strategies: Vec<String> = STRATEGY_NAMES[..4].iter().map(|s| s.to_string()).collect();
        let ranges = strategies
            .iter()
            .filter_map(|s| default_param_ranges(s).ok().map(|r| (s.clone(), r)))
            .collect();
        SweepConfig {
            strategies,
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            backtest: BacktestSettings::default(),
            ranges,
        }
    }

    /// Missing keys fall back to [`SweepConfig::defaults`]; a strategy whose
    /// section lists only some parameters keeps the built-in grid for the rest.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RoboError> {
        validate_sweep_config(config)?;
        let defaults = SweepConfig::defaults();

        let strategies = match name_list(config, "sweep", "strategies")? {
            names if names.is_empty() => defaults.strategies,
            names => names,
        };
        let symbols = match config.get_string("sweep", "symbols") {
            Some(raw) => split_names(&raw).into_iter().map(|s| s.to_uppercase()).collect(),
            None => defaults.symbols,
        };

        let mut ranges = Vec::with_capacity(strategies.len());
        for strategy in &strategies {
            ranges.push((strategy.clone(), ranges_for(config, strategy)?));
        }

        Ok(SweepConfig {
            strategies,
            symbols,
            backtest: BacktestSettings::from_config(config)?,
            ranges,
        })
    }
}

fn ranges_for(config: &dyn ConfigPort, strategy: &str) -> Result<Vec<ParamRange>, RoboError> {
    let section = format!("sweep.{}", strategy);
    let mut ranges = default_param_ranges(strategy)?;
    for name in parameter_names_for(strategy)? {
        let Some(raw) = config.get_string(&section, name) else {
            continue;
        };
        let values = parse_values(&section, name, &raw)?;
        match ranges.iter_mut().find(|r| r.name == *name) {
            Some(range) => range.values = values,
            None => ranges.push(ParamRange::new(*name, values)),
        }
    }
    Ok(ranges)
}
