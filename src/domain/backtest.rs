//! Backtest engine and bar-by-bar event loop.
//!
//! One engine serves both run modes:
//! - `ExitMode::Signal`: enter on the entry stream, leave on an opposing exit
//!   signal, no protective levels. Used by the sweep.
//! - `ExitMode::Bracket`: ATR stop-loss/take-profit around each entry, sized
//!   from the risk budget. Used by single configured runs.
//!
//! Per bar: brackets, then exit signal, then entry, then the equity mark.

use log::debug;

use super::error::RoboError;
use super::execution::{calculate_commission, enter_position, exit_position, EntryOrder, EntryResult};
use super::indicator::calculate_atr;
use super::metrics::{Metrics, TRADING_DAYS_PER_YEAR};
use super::ohlcv::{OhlcvBar, SymbolSeries};
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{Direction, ExitReason, TradeDirection, Trade};
use super::risk::{RiskConfig, RiskManager};
use super::signal::Signal;
use super::strategy::{ParameterSet, Strategy};

/// A stop wider than this fraction of price is treated as a broken signal.
const MAX_STOP_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct BracketConfig {
    pub atr_period: usize,
    pub stop_loss_atr_multiplier: f64,
    pub take_profit_atr_multiplier: f64,
    /// Stops never sit closer to the entry than this fraction of price.
    pub min_stop_fraction: f64,
}

impl Default for BracketConfig {
    fn default() -> Self {
        BracketConfig {
            atr_period: 14,
            stop_loss_atr_multiplier: 1.5,
            take_profit_atr_multiplier: 3.0,
            min_stop_fraction: 0.005,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitMode {
    Signal,
    Bracket(BracketConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub initial_capital: f64,
    /// Fraction of notional paid on every fill (0.001 = 0.1%).
    pub commission: f64,
    pub trade_direction: TradeDirection,
    pub exit_mode: ExitMode,
    pub periods_per_year: f64,
}

impl EngineConfig {
    /// Long-only, signal exits: the accounting used by parameter sweeps.
    pub fn signal(initial_capital: f64, commission: f64) -> Self {
        EngineConfig {
            initial_capital,
            commission,
            trade_direction: TradeDirection::Long,
            exit_mode: ExitMode::Signal,
            periods_per_year: TRADING_DAYS_PER_YEAR,
        }
    }

    /// Short entries need bracket exits; an unstopped short can lose more
    /// than its escrow.
    pub fn validate(&self) -> Result<(), RoboError> {
        if self.exit_mode == ExitMode::Signal && self.trade_direction != TradeDirection::Long {
            return Err(RoboError::invalid(
                "strategy",
                "trade_direction",
                format!("{} entries need bracket exits", self.trade_direction),
            ));
        }
        Ok(())
    }
}

/// Outcome of one (strategy, parameters, symbol) simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub strategy: String,
    pub params: ParameterSet,
    pub symbol: String,
    pub metrics: Metrics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestResult {
    pub fn total_return(&self) -> f64 {
        self.metrics.total_return
    }

    pub fn sharpe_ratio(&self) -> f64 {
        self.metrics.sharpe_ratio
    }

    pub fn win_rate(&self) -> f64 {
        self.metrics.win_rate
    }
}

pub fn run_backtest(
    strategy: &dyn Strategy,
    series: &SymbolSeries,
    config: &EngineConfig,
    risk_config: &RiskConfig,
) -> Result<BacktestResult, RoboError> {
    config.validate()?;
    let bars = &series.bars;
    let symbol = series.symbol.as_str();
    if bars.is_empty() {
        return Err(RoboError::InsufficientData {
            symbol: symbol.to_string(),
            bars: 0,
            minimum: 1,
        });
    }
    if bars.len() < strategy.warmup_bars() {
        debug!(
            "{} on {}: {} bars is inside the {}-bar warmup, signals stay Hold",
            strategy.name(),
            symbol,
            bars.len(),
            strategy.warmup_bars()
        );
    }

    let plan = strategy.generate_plan(bars);
    if plan.len() != bars.len() {
        return Err(RoboError::Execution {
            reason: format!(
                "{} produced {} signals for {} bars",
                strategy.name(),
                plan.len(),
                bars.len()
            ),
        });
    }

    let atr = match &config.exit_mode {
        ExitMode::Bracket(bracket) => calculate_atr(bars, bracket.atr_period).simple_values(),
        ExitMode::Signal => Vec::new(),
    };

    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut risk = RiskManager::new(risk_config.clone());
    let mut entry_index = 0usize;

    for (i, bar) in bars.iter().enumerate() {
        if i == 0 || bar.timestamp.date() != bars[i - 1].timestamp.date() {
            let mark = if i == 0 { bar.open } else { bars[i - 1].close };
            risk.reset_daily(portfolio.equity(mark));
        }

        let mut exited = false;

        // the entry bar itself is not tested against its own brackets
        let bracket_hit = match (&portfolio.position, &config.exit_mode) {
            (Some(pos), ExitMode::Bracket(_)) if i > entry_index => pos.bracket_hit(bar.high, bar.low),
            _ => None,
        };
        if let Some((reason, level)) = bracket_hit {
            close_open(&mut portfolio, &mut risk, level, bar, reason, config.commission)?;
            exited = true;
        }

        let opposing = match portfolio.position.as_ref().map(|p| p.direction) {
            Some(Direction::Long) => plan.exits[i] == Signal::Sell,
            Some(Direction::Short) => plan.exits[i] == Signal::Buy,
            None => false,
        };
        if !exited && opposing {
            close_open(&mut portfolio, &mut risk, bar.close, bar, ExitReason::Signal, config.commission)?;
            exited = true;
        }

        if !exited && portfolio.is_flat() {
            let direction = match plan.entries[i] {
                Signal::Buy => Some(Direction::Long),
                Signal::Sell => Some(Direction::Short),
                Signal::Hold => None,
            };
            if let Some(direction) = direction.filter(|d| config.trade_direction.allows(*d)) {
                let atr_now = atr.get(i).copied().flatten();
                if try_enter(&mut portfolio, &mut risk, symbol, bar, direction, atr_now, config) {
                    entry_index = i;
                }
            }
        }

        portfolio.record_equity(bar.timestamp, portfolio.equity(bar.close));
    }

    if let Some(last) = bars.last() {
        if !portfolio.is_flat() {
            close_open(&mut portfolio, &mut risk, last.close, last, ExitReason::EndOfData, config.commission)?;
            if let Some(point) = portfolio.equity_curve.last_mut() {
                point.equity = portfolio.cash;
            }
        }
    }

    let metrics = Metrics::compute(
        &portfolio.trades,
        &portfolio.equity_values(),
        config.initial_capital,
        portfolio.cash,
        config.periods_per_year,
    );

    debug!(
        "{} ({}) on {}: return {:.2}%, {} trades",
        strategy.name(),
        strategy.parameters(),
        symbol,
        metrics.total_return,
        metrics.total_trades
    );

    Ok(BacktestResult {
        strategy: strategy.name().to_string(),
        params: strategy.parameters().clone(),
        symbol: symbol.to_string(),
        metrics,
        trades: portfolio.trades,
        equity_curve: portfolio.equity_curve,
    })
}

fn close_open(
    portfolio: &mut Portfolio,
    risk: &mut RiskManager,
    price: f64,
    bar: &OhlcvBar,
    reason: ExitReason,
    commission: f64,
) -> Result<(), RoboError> {
    let Some(trade) = exit_position(portfolio, price, bar.timestamp, reason, commission) else {
        return Ok(());
    };
    // the entry commission was booked when the position opened
    risk.close_position(&trade.symbol, price)?;
    risk.record_pnl(-calculate_commission(trade.size * price, commission));
    debug!(
        "exit {} {} @ {:.4} ({}), pnl={:.2}",
        trade.direction, trade.symbol, price, reason, trade.pnl
    );
    Ok(())
}

/// Protective levels for an entry at `price`, or `None` if the stop is unusable.
fn bracket_levels(
    bracket: &BracketConfig,
    direction: Direction,
    price: f64,
    atr: f64,
) -> Option<(f64, Option<f64>)> {
    let (stop, target) = match direction {
        Direction::Long => (
            (price - bracket.stop_loss_atr_multiplier * atr).min(price * (1.0 - bracket.min_stop_fraction)),
            price + bracket.take_profit_atr_multiplier * atr,
        ),
        Direction::Short => (
            (price + bracket.stop_loss_atr_multiplier * atr).max(price * (1.0 + bracket.min_stop_fraction)),
            price - bracket.take_profit_atr_multiplier * atr,
        ),
    };
    let distance = (price - stop).abs();
    if distance <= 0.0 || distance >= price * MAX_STOP_FRACTION {
        return None;
    }
    let target = (target > 0.0).then_some(target);
    Some((stop, target))
}

fn try_enter(
    portfolio: &mut Portfolio,
    risk: &mut RiskManager,
    symbol: &str,
    bar: &OhlcvBar,
    direction: Direction,
    atr: Option<f64>,
    config: &EngineConfig,
) -> bool {
    let price = bar.close;
    let (stop_loss, take_profit, risk_per_unit) = match &config.exit_mode {
        ExitMode::Signal => (None, None, 1.0),
        ExitMode::Bracket(bracket) => {
            let Some(atr) = atr.filter(|a| *a > 0.0) else {
                return false;
            };
            let Some((stop, target)) = bracket_levels(bracket, direction, price, atr) else {
                debug!("skip {} {}: stop too wide for ATR {:.4}", direction, symbol, atr);
                return false;
            };
            (Some(stop), target, (price - stop).abs() / price)
        }
    };

    let equity = portfolio.equity(price);
    let decision = risk.can_open_position(symbol, equity);
    if !decision.allowed {
        debug!("skip {} {}: {}", direction, symbol, decision.reason);
        return false;
    }

    let size = risk.compute_position_size(equity, risk_per_unit, price);
    if size <= 0.0 {
        return false;
    }

    let order = EntryOrder {
        direction,
        price,
        timestamp: bar.timestamp,
        size,
        stop_loss,
        take_profit,
    };
    match enter_position(portfolio, symbol, &order, config.commission) {
        EntryResult::Entered { size, commission } => {
            risk.register_position(symbol, direction, price, size);
            risk.record_pnl(-commission);
            debug!("enter {} {} @ {:.4}, size={:.6}", direction, symbol, price, size);
            true
        }
        EntryResult::PositionOpen | EntryResult::InsufficientCapital => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::{create_strategy, SmaCrossover};
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(i: usize) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::days(i as i64)
    }

    fn series(closes: &[f64]) -> SymbolSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcvBar {
                timestamp: ts(i),
                open: c,
                high: c * 1.01,
                low: c * 0.99,
                close: c,
                volume: 1_000.0,
            })
            .collect();
        SymbolSeries::new("BTC-USD", bars)
    }

    /// Replays fixed signal streams.
    struct Scripted {
        entries: Vec<Signal>,
        exits: Vec<Signal>,
        params: ParameterSet,
    }

    impl Scripted {
        fn uniform(signals: Vec<Signal>) -> Self {
            Scripted {
                exits: signals.clone(),
                entries: signals,
                params: ParameterSet::new(),
            }
        }
    }

    impl Strategy for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }
        fn parameter_names(&self) -> &'static [&'static str] {
            &[]
        }
        fn parameters(&self) -> &ParameterSet {
            &self.params
        }
        fn generate_signals(&self, _bars: &[OhlcvBar]) -> Vec<Signal> {
            self.entries.clone()
        }
        fn generate_plan(&self, _bars: &[OhlcvBar]) -> crate::domain::signal::SignalPlan {
            crate::domain::signal::SignalPlan {
                entries: self.entries.clone(),
                exits: self.exits.clone(),
            }
        }
        fn warmup_bars(&self) -> usize {
            0
        }
    }

    fn sma(short: f64, long: f64) -> SmaCrossover {
        let params = ParameterSet::new()
            .with("short_window", short)
            .with("long_window", long);
        SmaCrossover::from_params(&params).unwrap()
    }

    #[test]
    fn rising_series_single_forced_trade() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let result = run_backtest(
            &sma(5.0, 20.0),
            &series(&closes),
            &EngineConfig::signal(10_000.0, 0.001),
            &RiskConfig::full_capital(),
        )
        .unwrap();

        assert_eq!(result.metrics.total_trades, 1);
        assert_eq!(result.metrics.winning_trades, 1);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::EndOfData);
        assert!((trade.entry_price - 119.0).abs() < 1e-9);
        assert!((trade.exit_price - 159.0).abs() < 1e-9);
        assert!(result.metrics.total_return > 0.0);
        assert_eq!(result.equity_curve.len(), 60);
    }

    #[test]
    fn repeated_buy_signals_do_not_reenter() {
        let signals = vec![Signal::Buy; 10];
        let result = run_backtest(
            &Scripted::uniform(signals),
            &series(&[100.0; 10]),
            &EngineConfig::signal(1_000.0, 0.0),
            &RiskConfig::full_capital(),
        )
        .unwrap();
        assert_eq!(result.metrics.total_trades, 1);
        assert!((result.metrics.final_capital - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn sell_closes_long_at_close() {
        let mut signals = vec![Signal::Hold; 6];
        signals[1] = Signal::Buy;
        signals[4] = Signal::Sell;
        let result = run_backtest(
            &Scripted::uniform(signals),
            &series(&[100.0, 100.0, 105.0, 108.0, 110.0, 90.0]),
            &EngineConfig::signal(1_000.0, 0.0),
            &RiskConfig::full_capital(),
        )
        .unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::Signal);
        assert!((result.metrics.final_capital - 1_100.0).abs() < 1e-9);
        assert!((result.metrics.total_return - 10.0).abs() < 1e-9);
    }

    #[test]
    fn long_only_ignores_sell_entries() {
        let signals = vec![Signal::Sell; 5];
        let result = run_backtest(
            &Scripted::uniform(signals),
            &series(&[100.0, 99.0, 98.0, 97.0, 96.0]),
            &EngineConfig::signal(1_000.0, 0.0),
            &RiskConfig::full_capital(),
        )
        .unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.metrics.max_drawdown, 0.0);
    }

    #[test]
    fn signal_mode_rejects_short_entries() {
        let config = EngineConfig {
            trade_direction: TradeDirection::Both,
            ..EngineConfig::signal(1_000.0, 0.0)
        };
        let err = run_backtest(
            &Scripted::uniform(vec![Signal::Sell; 5]),
            &series(&[100.0, 150.0, 210.0, 260.0, 300.0]),
            &config,
            &RiskConfig::full_capital(),
        )
        .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("trade_direction"));
    }

    #[test]
    fn bracket_short_profits_from_decline() {
        let mut bars: Vec<OhlcvBar> = (0..20)
            .map(|i| OhlcvBar {
                timestamp: ts(i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1.0,
            })
            .collect();
        // ATR(5) = 2 -> stop at 103, target at 94
        bars[12].low = 93.0;
        let mut entries = vec![Signal::Hold; 20];
        entries[10] = Signal::Sell;
        let strategy = Scripted {
            entries,
            exits: vec![Signal::Hold; 20],
            params: ParameterSet::new(),
        };
        let config = EngineConfig {
            trade_direction: TradeDirection::Short,
            exit_mode: ExitMode::Bracket(BracketConfig {
                atr_period: 5,
                ..BracketConfig::default()
            }),
            ..EngineConfig::signal(10_000.0, 0.0)
        };

        let result = run_backtest(&strategy, &SymbolSeries::new("ETH-USD", bars), &config, &RiskConfig::default()).unwrap();
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.direction, Direction::Short);
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert!((trade.exit_price - 94.0).abs() < 1e-9);
        assert!(result.metrics.final_capital > 10_000.0);
    }

    #[test]
    fn daily_pnl_books_each_commission_once() {
        let config = EngineConfig::signal(10_000.0, 0.01);
        let mut portfolio = Portfolio::new(10_000.0);
        let mut risk = RiskManager::new(RiskConfig::full_capital());
        risk.reset_daily(10_000.0);
        let bar = series(&[100.0]).bars[0].clone();

        assert!(try_enter(&mut portfolio, &mut risk, "BTC-USD", &bar, Direction::Long, None, &config));
        close_open(&mut portfolio, &mut risk, 100.0, &bar, ExitReason::Signal, 0.01).unwrap();

        let trade = &portfolio.trades[0];
        assert!(trade.pnl < 0.0);
        assert!((risk.state().daily_pnl - trade.pnl).abs() < 1e-9);
        assert!((risk.state().daily_pnl - (portfolio.cash - 10_000.0)).abs() < 1e-9);
    }

    #[test]
    fn commission_reduces_return() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let run = |commission: f64| {
            run_backtest(
                &sma(5.0, 20.0),
                &series(&closes),
                &EngineConfig::signal(10_000.0, commission),
                &RiskConfig::full_capital(),
            )
            .unwrap()
            .metrics
            .total_return
        };
        assert!(run(0.01) < run(0.001));
        assert!(run(0.001) < run(0.0));
    }

    #[test]
    fn bracket_stop_loss_exits_at_level() {
        let mut bars: Vec<OhlcvBar> = (0..20)
            .map(|i| OhlcvBar {
                timestamp: ts(i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1.0,
            })
            .collect();
        // ATR(5) = 2 -> stop at 97, target at 106
        bars[12].low = 95.0;
        let mut entries = vec![Signal::Hold; 20];
        entries[10] = Signal::Buy;
        let strategy = Scripted {
            entries,
            exits: vec![Signal::Hold; 20],
            params: ParameterSet::new(),
        };
        let config = EngineConfig {
            exit_mode: ExitMode::Bracket(BracketConfig {
                atr_period: 5,
                ..BracketConfig::default()
            }),
            ..EngineConfig::signal(10_000.0, 0.0)
        };

        let result = run_backtest(&strategy, &SymbolSeries::new("ETH-USD", bars), &config, &RiskConfig::default()).unwrap();
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert!((trade.exit_price - 97.0).abs() < 1e-9);
        // 2% of 10000 at risk over a 3.0 stop -> 66.67 units, capped at 50 units (50%)
        assert!((trade.size - 50.0).abs() < 1e-9);
    }

    #[test]
    fn bracket_mode_waits_for_atr() {
        let mut entries = vec![Signal::Hold; 5];
        entries[1] = Signal::Buy;
        let strategy = Scripted::uniform(entries);
        let config = EngineConfig {
            exit_mode: ExitMode::Bracket(BracketConfig::default()),
            ..EngineConfig::signal(10_000.0, 0.0)
        };
        let result = run_backtest(&strategy, &series(&[100.0; 5]), &config, &RiskConfig::default()).unwrap();
        assert!(result.trades.is_empty());
    }

    #[test]
    fn bracket_levels_respect_minimum_distance() {
        let bracket = BracketConfig::default();
        let (stop, target) = bracket_levels(&bracket, Direction::Long, 100.0, 0.01).unwrap();
        assert!((stop - 99.5).abs() < 1e-9);
        assert!((target.unwrap() - 100.03).abs() < 1e-9);
        let (stop, _) = bracket_levels(&bracket, Direction::Short, 100.0, 0.01).unwrap();
        assert!((stop - 100.5).abs() < 1e-9);
        // stop wider than half the price is refused
        assert!(bracket_levels(&bracket, Direction::Long, 100.0, 40.0).is_none());
    }

    #[test]
    fn empty_series_is_insufficient_data() {
        let strategy = create_strategy("sma_crossover", &ParameterSet::new().with("short_window", 2.0).with("long_window", 3.0)).unwrap();
        let err = run_backtest(
            strategy.as_ref(),
            &SymbolSeries::new("ADA-USD", Vec::new()),
            &EngineConfig::signal(10_000.0, 0.0),
            &RiskConfig::full_capital(),
        )
        .unwrap_err();
        assert!(matches!(err, RoboError::InsufficientData { .. }));
    }

    #[test]
    fn short_series_completes_without_trades() {
        let result = run_backtest(
            &sma(5.0, 20.0),
            &series(&[100.0, 101.0, 102.0]),
            &EngineConfig::signal(10_000.0, 0.001),
            &RiskConfig::full_capital(),
        )
        .unwrap();
        assert_eq!(result.metrics.total_trades, 0);
        assert!((result.metrics.final_capital - 10_000.0).abs() < f64::EPSILON);
    }
}
