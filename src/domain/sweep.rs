//! Parameter sweep harness.
//!
//! Expands per-parameter value lists into their cartesian product and runs one
//! backtest per (parameter set, symbol) cell on the rayon pool. Cells share
//! only read-only market data; each builds its own strategy and risk state.
//!
//! Cell results come back in discovery order (parameter sets in expansion
//! order, symbols in the order given), whatever order the pool finished them in.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use log::{info, warn};
use rayon::prelude::*;

use super::backtest::{run_backtest, BacktestResult, EngineConfig};
use super::error::RoboError;
use super::ohlcv::SymbolSeries;
use super::risk::RiskConfig;
use super::strategy::{
    create_strategy, parameter_names_for, BollingerReversion, EmaCross, MacdMomentum, ParameterSet,
    RsiReversion, RsiTrend, SmaCrossover,
};

pub const DEFAULT_SYMBOLS: &[&str] = &["BTC-USD", "ETH-USD", "BNB-USD", "SOL-USD", "ADA-USD"];
pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;
pub const DEFAULT_COMMISSION: f64 = 0.001;

/// Candidate values for one strategy parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamRange {
    pub name: String,
    pub values: Vec<f64>,
}

impl ParamRange {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        ParamRange {
            name: name.into(),
            values,
        }
    }
}

/// Built-in grid for each registered strategy.
pub fn default_param_ranges(strategy: &str) -> Result<Vec<ParamRange>, RoboError> {
    let ranges = match strategy {
        SmaCrossover::NAME => vec![
            ParamRange::new("short_window", vec![5.0, 10.0, 20.0, 30.0]),
            ParamRange::new("long_window", vec![50.0, 100.0, 200.0]),
        ],
        RsiReversion::NAME => vec![
            ParamRange::new("period", vec![7.0, 14.0, 21.0, 28.0]),
            ParamRange::new("oversold", vec![20.0, 25.0, 30.0]),
            ParamRange::new("overbought", vec![70.0, 75.0, 80.0]),
        ],
        MacdMomentum::NAME => vec![
            ParamRange::new("fast_period", vec![8.0, 12.0, 16.0]),
            ParamRange::new("slow_period", vec![21.0, 26.0, 30.0]),
            ParamRange::new("signal_period", vec![7.0, 9.0, 11.0]),
        ],
        BollingerReversion::NAME => vec![
            ParamRange::new("period", vec![10.0, 20.0, 30.0]),
            ParamRange::new("std_dev", vec![1.5, 2.0, 2.5, 3.0]),
        ],
        EmaCross::NAME => vec![
            ParamRange::new("fast", vec![5.0, 9.0, 12.0]),
            ParamRange::new("slow", vec![26.0, 50.0, 100.0]),
        ],
        RsiTrend::NAME => vec![
            ParamRange::new("period", vec![7.0, 14.0, 21.0]),
            ParamRange::new("oversold", vec![30.0, 35.0]),
            ParamRange::new("overbought", vec![65.0, 70.0]),
        ],
        _ => {
            return Err(RoboError::UnknownStrategy {
                name: strategy.to_string(),
            });
        }
    };
    Ok(ranges)
}

/// Cartesian product of `ranges`: the first range varies slowest, values keep
/// their listed order. No ranges yield one empty set; an empty value list
/// yields nothing.
pub fn parameter_combinations(ranges: &[ParamRange]) -> Vec<ParameterSet> {
    ranges.iter().fold(vec![ParameterSet::new()], |acc, range| {
        acc.iter()
            .flat_map(|base| {
                range
                    .values
                    .iter()
                    .map(move |&value| base.clone().with(&range.name, value))
            })
            .collect()
    })
}

/// Cooperative cancellation shared between a sweep and its caller.
///
/// Cells that start after `cancel()` are skipped; running cells finish.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }
}

/// Why a cell produced no result.
#[derive(Debug)]
pub enum CellFailure {
    Cancelled,
    Error(RoboError),
}

impl fmt::Display for CellFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellFailure::Cancelled => write!(f, "cancelled"),
            CellFailure::Error(err) => write!(f, "{}", err),
        }
    }
}

/// One (parameter set, symbol) cell and what came of it.
#[derive(Debug)]
pub struct CellOutcome {
    pub strategy: String,
    pub symbol: String,
    pub params: ParameterSet,
    pub result: Result<BacktestResult, CellFailure>,
}

impl CellOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SweepSummary {
    pub strategy: String,
    pub total_cells: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Progress callbacks for a running sweep. Called from worker threads.
pub trait SweepObserver: Send + Sync {
    fn on_sweep_start(&self, _strategy: &str, _total_cells: usize) {}

    fn on_cell_finished(&self, _result: &BacktestResult, _completed: usize, _total: usize) {}

    fn on_cell_failed(
        &self,
        _symbol: &str,
        _params: &ParameterSet,
        _failure: &CellFailure,
        _completed: usize,
        _total: usize,
    ) {
    }

    fn on_sweep_finished(&self, _summary: &SweepSummary) {}
}

/// Silent observer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl SweepObserver for NullObserver {}

/// Forwards sweep progress to the `log` facade.
#[derive(Debug, Clone, Copy)]
pub struct LogObserver {
    pub progress_every: usize,
}

impl Default for LogObserver {
    fn default() -> Self {
        LogObserver { progress_every: 10 }
    }
}

impl LogObserver {
    fn report_progress(&self, completed: usize, total: usize) {
        let every = self.progress_every.max(1);
        if completed % every == 0 || completed == total {
            info!("Progress: {}/{} backtests completed", completed, total);
        }
    }
}

impl SweepObserver for LogObserver {
    fn on_sweep_start(&self, strategy: &str, total_cells: usize) {
        info!("Sweeping {}: {} backtests", strategy, total_cells);
    }

    fn on_cell_finished(&self, _result: &BacktestResult, completed: usize, total: usize) {
        self.report_progress(completed, total);
    }

    fn on_cell_failed(
        &self,
        symbol: &str,
        params: &ParameterSet,
        failure: &CellFailure,
        completed: usize,
        total: usize,
    ) {
        if !matches!(failure, CellFailure::Cancelled) {
            warn!("Backtest failed for {} ({}): {}", symbol, params, failure);
        }
        self.report_progress(completed, total);
    }

    fn on_sweep_finished(&self, summary: &SweepSummary) {
        info!(
            "Finished {}: {} succeeded, {} failed, {} cancelled",
            summary.strategy, summary.succeeded, summary.failed, summary.cancelled
        );
    }
}

/// Ranking key for [`rank_results`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TotalReturn,
    SharpeRatio,
    WinRate,
    MaxDrawdown,
    FinalCapital,
    TotalTrades,
}

impl Metric {
    pub fn value(self, result: &BacktestResult) -> f64 {
        let m = &result.metrics;
        match self {
            Metric::TotalReturn => m.total_return,
            Metric::SharpeRatio => m.sharpe_ratio,
            Metric::WinRate => m.win_rate,
            Metric::MaxDrawdown => m.max_drawdown,
            Metric::FinalCapital => m.final_capital,
            Metric::TotalTrades => m.total_trades as f64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::TotalReturn => "total_return",
            Metric::SharpeRatio => "sharpe_ratio",
            Metric::WinRate => "win_rate",
            Metric::MaxDrawdown => "max_drawdown",
            Metric::FinalCapital => "final_capital",
            Metric::TotalTrades => "total_trades",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = RoboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "total_return" | "return" => Ok(Metric::TotalReturn),
            "sharpe_ratio" | "sharpe" => Ok(Metric::SharpeRatio),
            "win_rate" => Ok(Metric::WinRate),
            "max_drawdown" | "drawdown" => Ok(Metric::MaxDrawdown),
            "final_capital" => Ok(Metric::FinalCapital),
            "total_trades" | "trades" => Ok(Metric::TotalTrades),
            other => Err(RoboError::invalid(
                "report",
                "metric",
                format!("unknown metric '{}'", other),
            )),
        }
    }
}

/// NaN sorts below every number.
fn metric_key(value: f64) -> f64 {
    if value.is_nan() { f64::NEG_INFINITY } else { value }
}

fn compare_params(a: &ParameterSet, b: &ParameterSet) -> Ordering {
    for ((_, x), (_, y)) in a.iter().zip(b.iter()) {
        match x.total_cmp(&y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// Top `n` results by `metric`, highest first.
///
/// Ties fall back to symbol name, then the parameter tuple, then discovery
/// order, so identical inputs always rank identically.
pub fn rank_results(results: &[BacktestResult], n: usize, metric: Metric) -> Vec<&BacktestResult> {
    let mut ranked: Vec<&BacktestResult> = results.iter().collect();
    ranked.sort_by(|a, b| {
        metric_key(metric.value(b))
            .total_cmp(&metric_key(metric.value(a)))
            .then_with(|| a.symbol.cmp(&b.symbol))
            .then_with(|| compare_params(&a.params, &b.params))
    });
    ranked.truncate(n);
    ranked
}

/// Runs sweeps and keeps every successful result for later ranking.
#[derive(Debug, Clone)]
pub struct Sweeper {
    engine: EngineConfig,
    risk: RiskConfig,
    results: Vec<BacktestResult>,
}

impl Sweeper {
    pub fn new(engine: EngineConfig, risk: RiskConfig) -> Self {
        Sweeper {
            engine,
            risk,
            results: Vec::new(),
        }
    }

    /// Long-only signal exits with the whole equity committed to each entry.
    pub fn signal_mode(initial_capital: f64, commission: f64) -> Self {
        Sweeper::new(
            EngineConfig::signal(initial_capital, commission),
            RiskConfig::full_capital(),
        )
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn results(&self) -> &[BacktestResult] {
        &self.results
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }

    /// Runs every cell and keeps the successes. Returns how many were added.
    pub fn sweep(
        &mut self,
        strategy: &str,
        ranges: &[ParamRange],
        data: &[SymbolSeries],
        observer: &dyn SweepObserver,
        cancel: &CancelToken,
    ) -> Result<usize, RoboError> {
        let outcomes = self.run_cells(strategy, ranges, data, observer, cancel)?;
        let before = self.results.len();
        self.results
            .extend(outcomes.into_iter().filter_map(|cell| cell.result.ok()));
        Ok(self.results.len() - before)
    }

    /// Runs all `ranges x data` cells without touching the stored results.
    ///
    /// Unknown strategies, unknown parameter names and missing parameters are
    /// configuration errors and abort before any cell runs. A parameter set
    /// with invalid values only fails its own cells.
    pub fn run_cells(
        &self,
        strategy: &str,
        ranges: &[ParamRange],
        data: &[SymbolSeries],
        observer: &dyn SweepObserver,
        cancel: &CancelToken,
    ) -> Result<Vec<CellOutcome>, RoboError> {
        let known = parameter_names_for(strategy)?;
        if let Some(unknown) = ranges.iter().find(|r| !known.contains(&r.name.as_str())) {
            return Err(RoboError::invalid(
                &format!("sweep.{}", strategy),
                &unknown.name,
                format!("not a parameter of {} (expected one of {})", strategy, known.join(", ")),
            ));
        }

        let combinations = parameter_combinations(ranges);
        for params in &combinations {
            if let Err(err) = create_strategy(strategy, params) {
                if matches!(err, RoboError::MissingParameter { .. }) {
                    return Err(err);
                }
            }
        }

        let cells: Vec<(usize, usize)> = (0..combinations.len())
            .flat_map(|p| (0..data.len()).map(move |s| (p, s)))
            .collect();
        let total = cells.len();
        observer.on_sweep_start(strategy, total);

        let completed = AtomicUsize::new(0);
        let outcomes: Vec<CellOutcome> = cells
            .par_iter()
            .map(|&(p, s)| {
                let params = &combinations[p];
                let series = &data[s];
                let result = if cancel.is_cancelled() {
                    Err(CellFailure::Cancelled)
                } else {
                    self.run_cell(strategy, params, series).map_err(CellFailure::Error)
                };

                let done = completed.fetch_add(1, AtomicOrdering::SeqCst) + 1;
                match &result {
                    Ok(backtest) => observer.on_cell_finished(backtest, done, total),
                    Err(failure) => observer.on_cell_failed(&series.symbol, params, failure, done, total),
                }

                CellOutcome {
                    strategy: strategy.to_string(),
                    symbol: series.symbol.clone(),
                    params: params.clone(),
                    result,
                }
            })
            .collect();

        let cancelled = outcomes
            .iter()
            .filter(|c| matches!(c.result, Err(CellFailure::Cancelled)))
            .count();
        let succeeded = outcomes.iter().filter(|c| c.is_success()).count();
        observer.on_sweep_finished(&SweepSummary {
            strategy: strategy.to_string(),
            total_cells: total,
            succeeded,
            failed: total - succeeded - cancelled,
            cancelled,
        });

        Ok(outcomes)
    }

    fn run_cell(
        &self,
        strategy: &str,
        params: &ParameterSet,
        series: &SymbolSeries,
    ) -> Result<BacktestResult, RoboError> {
        let strategy = create_strategy(strategy, params)?;
        run_backtest(strategy.as_ref(), series, &self.engine, &self.risk)
    }

    pub fn get_best_results(&self, n: usize, metric: Metric) -> Vec<&BacktestResult> {
        rank_results(&self.results, n, metric)
    }
}
