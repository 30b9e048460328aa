//! Configuration validation.
//!
//! Every field is checked before any simulation runs. The typed readers at
//! the bottom are shared with `run_config`, so a value that validates is the
//! value that gets used.

use crate::domain::error::RoboError;
use crate::domain::position::TradeDirection;
use crate::domain::strategy::{parameter_names_for, STRATEGY_NAMES};
use crate::ports::config_port::ConfigPort;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RoboError> {
    validate_initial_capital(config)?;
    validate_commission(config)?;
    Ok(())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), RoboError> {
    for key in [
        "risk_per_trade_percent",
        "max_position_size_percent",
        "daily_loss_limit_percent",
    ] {
        validate_percent(config, key)?;
    }
    for key in ["stop_loss.atr_multiplier", "take_profit.atr_multiplier"] {
        if let Some(value) = number(config, "risk_management", key)? {
            if value <= 0.0 {
                return Err(RoboError::invalid("risk_management", key, "must be positive"));
            }
        }
    }
    for key in ["max_concurrent_positions", "max_correlated_positions"] {
        period_or(config, "risk_management", key, 1)?;
    }
    if let Some(value) = number(config, "risk_management", "correlation_threshold")? {
        if !(0.0..=1.0).contains(&value) {
            return Err(RoboError::invalid(
                "risk_management",
                "correlation_threshold",
                "must be between 0 and 1",
            ));
        }
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), RoboError> {
    validate_strategy_name(config)?;
    validate_trade_direction(config)?;
    validate_indicators(config)?;
    Ok(())
}

/// `[sweep] strategies` must name registered strategies and every
/// `[sweep.<strategy>]` value list must parse.
pub fn validate_sweep_config(config: &dyn ConfigPort) -> Result<(), RoboError> {
    let strategies = name_list(config, "sweep", "strategies")?;
    for name in &strategies {
        if !STRATEGY_NAMES.contains(&name.as_str()) {
            return Err(RoboError::UnknownStrategy { name: name.clone() });
        }
    }
    for name in STRATEGY_NAMES {
        let section = format!("sweep.{}", name);
        let known = parameter_names_for(name)?;
        if let Some(unknown) = config.keys(&section).into_iter().find(|k| !known.contains(&k.as_str())) {
            return Err(RoboError::invalid(
                &section,
                &unknown,
                format!("not a parameter of {} (expected one of {})", name, known.join(", ")),
            ));
        }
        for key in known {
            if let Some(raw) = config.get_string(&section, key) {
                parse_values(&section, key, &raw)?;
            }
        }
    }
    if let Some(symbols) = config.get_string("sweep", "symbols") {
        if split_names(&symbols).is_empty() {
            return Err(RoboError::invalid("sweep", "symbols", "no symbols listed"));
        }
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), RoboError> {
    if let Some(value) = number(config, "backtest", "initial_capital")? {
        if value <= 0.0 {
            return Err(RoboError::invalid(
                "backtest",
                "initial_capital",
                "initial_capital must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), RoboError> {
    if let Some(value) = number(config, "backtest", "commission")? {
        if !(0.0..1.0).contains(&value) {
            return Err(RoboError::invalid(
                "backtest",
                "commission",
                "commission must be a fraction in [0, 1)",
            ));
        }
    }
    Ok(())
}

fn validate_percent(config: &dyn ConfigPort, key: &str) -> Result<(), RoboError> {
    if let Some(value) = number(config, "risk_management", key)? {
        if value <= 0.0 || value > 100.0 {
            return Err(RoboError::invalid(
                "risk_management",
                key,
                format!("{} must be in (0, 100]", key),
            ));
        }
    }
    Ok(())
}

fn validate_strategy_name(config: &dyn ConfigPort) -> Result<(), RoboError> {
    match config.get_string("strategy", "name") {
        Some(name) if !name.trim().is_empty() => {
            let name = name.trim();
            if STRATEGY_NAMES.contains(&name) {
                Ok(())
            } else {
                Err(RoboError::UnknownStrategy {
                    name: name.to_string(),
                })
            }
        }
        _ => Err(RoboError::ConfigMissing {
            section: "strategy".to_string(),
            key: "name".to_string(),
        }),
    }
}

fn validate_trade_direction(config: &dyn ConfigPort) -> Result<(), RoboError> {
    trade_direction(config).map(|_| ())
}

fn validate_indicators(config: &dyn ConfigPort) -> Result<(), RoboError> {
    for key in ["rsi.period", "sma_trend.period", "ema.fast", "ema.slow", "atr.period"] {
        period_or(config, "indicators", key, 1)?;
    }

    let oversold = number(config, "indicators", "rsi.oversold")?.unwrap_or(DEFAULT_RSI_OVERSOLD);
    let overbought = number(config, "indicators", "rsi.overbought")?.unwrap_or(DEFAULT_RSI_OVERBOUGHT);
    for (key, value) in [("rsi.oversold", oversold), ("rsi.overbought", overbought)] {
        if !(0.0..=100.0).contains(&value) {
            return Err(RoboError::invalid("indicators", key, "must be between 0 and 100"));
        }
    }
    if oversold >= overbought {
        return Err(RoboError::invalid(
            "indicators",
            "rsi.oversold",
            "rsi.oversold must be below rsi.overbought",
        ));
    }

    let fast = period_or(config, "indicators", "ema.fast", DEFAULT_EMA_FAST)?;
    let slow = period_or(config, "indicators", "ema.slow", DEFAULT_EMA_SLOW)?;
    if fast >= slow {
        return Err(RoboError::invalid(
            "indicators",
            "ema.fast",
            "ema.fast must be below ema.slow",
        ));
    }

    flag(config, "indicators", "sma_trend.enabled", true)?;
    Ok(())
}

pub(crate) const DEFAULT_RSI_PERIOD: usize = 14;
pub(crate) const DEFAULT_RSI_OVERSOLD: f64 = 35.0;
pub(crate) const DEFAULT_RSI_OVERBOUGHT: f64 = 65.0;
pub(crate) const DEFAULT_EMA_FAST: usize = 9;
pub(crate) const DEFAULT_EMA_SLOW: usize = 50;
pub(crate) const DEFAULT_ATR_PERIOD: usize = 14;

/// A present value must parse as a finite number.
pub(crate) fn number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, RoboError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(RoboError::invalid(section, key, format!("'{}' is not a number", raw))),
    }
}

pub(crate) fn number_or(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, RoboError> {
    Ok(number(config, section, key)?.unwrap_or(default))
}

/// A whole number of at least 1.
pub(crate) fn period_or(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> Result<usize, RoboError> {
    match number(config, section, key)? {
        None => Ok(default),
        Some(v) if v >= 1.0 && v.fract() == 0.0 => Ok(v as usize),
        Some(v) => Err(RoboError::invalid(
            section,
            key,
            format!("must be a whole number >= 1, got {}", v),
        )),
    }
}

pub(crate) fn flag(config: &dyn ConfigPort, section: &str, key: &str, default: bool) -> Result<bool, RoboError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(default);
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(RoboError::invalid(section, key, format!("'{}' is not a boolean", other))),
    }
}

pub(crate) fn trade_direction(config: &dyn ConfigPort) -> Result<TradeDirection, RoboError> {
    match config.get_string("strategy", "trade_direction") {
        Some(raw) => raw.parse(),
        None => Ok(TradeDirection::default()),
    }
}

/// Comma-separated numbers, e.g. `5, 10, 20`.
pub(crate) fn parse_values(section: &str, key: &str, raw: &str) -> Result<Vec<f64>, RoboError> {
    let values = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| RoboError::invalid(section, key, format!("'{}' is not a number", s)))
        })
        .collect::<Result<Vec<f64>, RoboError>>()?;
    if values.is_empty() {
        return Err(RoboError::invalid(section, key, "no values listed"));
    }
    Ok(values)
}

pub(crate) fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn name_list(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Vec<String>, RoboError> {
    match config.get_string(section, key) {
        None => Ok(Vec::new()),
        Some(raw) => {
            let names: Vec<String> = split_names(&raw).into_iter().map(|s| s.to_lowercase()).collect();
            if names.is_empty() {
                Err(RoboError::invalid(section, key, "no names listed"))
            } else {
                Ok(names)
            }
        }
    }
}
