//! Portfolio-level risk limits and risk-budget position sizing.
//!
//! A `RiskManager` owns its `RiskState` outright. Every simulation builds its
//! own manager, so nothing here is shared between sweep workers.

use std::collections::HashMap;

use log::debug;

use super::error::RoboError;
use super::position::Direction;

/// `[risk_management]` settings. Percentages are in percent units (2.0 = 2%).
#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub risk_per_trade_percent: f64,
    pub max_position_size_percent: f64,
    pub stop_loss_atr_multiplier: f64,
    pub take_profit_atr_multiplier: f64,
    pub max_concurrent_positions: usize,
    /// Recorded for the correlation check, which is not modelled.
    pub max_correlated_positions: usize,
    pub daily_loss_limit_percent: f64,
    pub correlation_threshold: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            risk_per_trade_percent: 2.0,
            max_position_size_percent: 50.0,
            stop_loss_atr_multiplier: 1.5,
            take_profit_atr_multiplier: 3.0,
            max_concurrent_positions: 3,
            max_correlated_positions: 1,
            daily_loss_limit_percent: 5.0,
            correlation_threshold: 0.7,
        }
    }
}

impl RiskConfig {
    /// Invest the whole equity on every entry, with no daily limit.
    pub fn full_capital() -> Self {
        RiskConfig {
            risk_per_trade_percent: 100.0,
            max_position_size_percent: 100.0,
            max_concurrent_positions: 1,
            daily_loss_limit_percent: 100.0,
            ..RiskConfig::default()
        }
    }
}

/// Outcome of a pre-trade check. A rejection is an ordinary result.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskDecision {
    pub allowed: bool,
    pub reason: String,
}

impl RiskDecision {
    fn allow() -> Self {
        RiskDecision {
            allowed: true,
            reason: "OK".to_string(),
        }
    }

    fn reject(reason: String) -> Self {
        RiskDecision {
            allowed: false,
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenRisk {
    pub direction: Direction,
    pub entry_price: f64,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RiskState {
    pub open_positions: HashMap<String, OpenRisk>,
    pub daily_pnl: f64,
    /// Equity at the last day boundary; `None` until the first reset.
    pub reference_equity: Option<f64>,
}

/// Notional below this fraction of equity is not worth a trade.
const MIN_NOTIONAL_FRACTION: f64 = 0.001;

#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
    state: RiskState,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        RiskManager {
            config,
            state: RiskState::default(),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn open_position_count(&self) -> usize {
        self.state.open_positions.len()
    }

    pub fn can_open_position(&self, symbol: &str, equity: f64) -> RiskDecision {
        if self.state.open_positions.contains_key(symbol) {
            return RiskDecision::reject(format!("Position already open for {}", symbol));
        }

        let max = self.config.max_concurrent_positions;
        if self.state.open_positions.len() >= max {
            return RiskDecision::reject(format!("Max positions limit reached ({})", max));
        }

        let reference = self.state.reference_equity.unwrap_or(equity);
        if self.state.daily_pnl < 0.0 && reference > 0.0 {
            let loss_pct = (self.state.daily_pnl / reference).abs() * 100.0;
            if loss_pct >= self.config.daily_loss_limit_percent {
                return RiskDecision::reject(format!("Daily loss limit reached ({:.2}%)", loss_pct));
            }
        }

        RiskDecision::allow()
    }

    /// Units to buy so that a move of `risk_per_unit` (fraction of price)
    /// against the position loses `risk_per_trade_percent` of equity.
    ///
    /// Capped at `max_position_size_percent` of equity; 0 when the stop is
    /// degenerate or the resulting notional is negligible.
    pub fn compute_position_size(&self, equity: f64, risk_per_unit: f64, price: f64) -> f64 {
        if risk_per_unit <= 0.0 || price <= 0.0 || equity <= 0.0 {
            return 0.0;
        }

        let risk_amount = equity * self.config.risk_per_trade_percent / 100.0;
        let size = risk_amount / (risk_per_unit * price);
        let max_size = equity * self.config.max_position_size_percent / 100.0 / price;
        let size = size.min(max_size).max(0.0);

        if size * price < equity * MIN_NOTIONAL_FRACTION {
            return 0.0;
        }
        size
    }

    pub fn register_position(&mut self, symbol: &str, direction: Direction, entry_price: f64, size: f64) {
        debug!("registered position: {} {} @ {:.4}, size={:.6}", direction, symbol, entry_price, size);
        self.state.open_positions.insert(
            symbol.to_string(),
            OpenRisk {
                direction,
                entry_price,
                size,
            },
        );
    }

    /// Removes the position and books its price PnL into the daily total.
    pub fn close_position(&mut self, symbol: &str, exit_price: f64) -> Result<f64, RoboError> {
        let pos = self
            .state
            .open_positions
            .remove(symbol)
            .ok_or_else(|| RoboError::PositionNotFound {
                symbol: symbol.to_string(),
            })?;

        let pnl = pos.direction.sign() * (exit_price - pos.entry_price) * pos.size;
        self.state.daily_pnl += pnl;
        debug!("closed position: {} @ {:.4}, pnl={:.2}", symbol, exit_price, pnl);
        Ok(pnl)
    }

    /// Books a realized amount without an open position, e.g. commissions.
    pub fn record_pnl(&mut self, amount: f64) {
        self.state.daily_pnl += amount;
    }

    pub fn reset_daily(&mut self, equity: f64) {
        self.state.daily_pnl = 0.0;
        self.state.reference_equity = Some(equity);
        debug!("daily risk reset, equity={:.2}", equity);
    }

    /// Open notional as a fraction of the reference equity.
    pub fn current_exposure(&self) -> f64 {
        match self.state.reference_equity {
            Some(reference) if reference > 0.0 => {
                self.state
                    .open_positions
                    .values()
                    .map(|p| p.entry_price * p.size)
                    .sum::<f64>()
                    / reference
            }
            _ => 0.0,
        }
    }
}
