//! Result aggregation: grouped summaries, export rows and the text report.
//!
//! Everything here reads a slice of results and builds new values; the
//! input is never modified.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::backtest::BacktestResult;
use super::sweep::{rank_results, Metric};

/// Column order of the tabular export.
pub const RESULT_COLUMNS: [&str; 11] = [
    "strategy",
    "symbol",
    "params",
    "total_return",
    "total_trades",
    "winning_trades",
    "losing_trades",
    "win_rate",
    "max_drawdown",
    "sharpe_ratio",
    "final_capital",
];

/// One exported row. `params` is the `k=v, k=v` rendering of the parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub strategy: String,
    pub symbol: String,
    pub params: String,
    pub total_return: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub final_capital: f64,
}

impl BacktestResult {
    pub fn to_record(&self) -> ResultRecord {
        let m = &self.metrics;
        ResultRecord {
            strategy: self.strategy.clone(),
            symbol: self.symbol.clone(),
            params: self.params.to_string(),
            total_return: m.total_return,
            total_trades: m.total_trades,
            winning_trades: m.winning_trades,
            losing_trades: m.losing_trades,
            win_rate: m.win_rate,
            max_drawdown: m.max_drawdown,
            sharpe_ratio: m.sharpe_ratio,
            final_capital: m.final_capital,
        }
    }
}

/// mean/std/max/min of one column within a group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub mean: f64,
    /// Sample standard deviation; 0 for a single value.
    pub std: f64,
    pub max: f64,
    pub min: f64,
}

impl ColumnStats {
    fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return ColumnStats {
                mean: 0.0,
                std: 0.0,
                max: 0.0,
                min: 0.0,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if values.len() > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        ColumnStats {
            mean,
            std,
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub key: String,
    pub count: usize,
    pub total_return: ColumnStats,
    pub sharpe_ratio: ColumnStats,
    pub mean_win_rate: f64,
    pub mean_trades: f64,
}

fn summarize_by<F>(results: &[BacktestResult], key: F) -> Vec<GroupSummary>
where
    F: Fn(&BacktestResult) -> &str,
{
    let mut groups: BTreeMap<&str, Vec<&BacktestResult>> = BTreeMap::new();
    for result in results {
        groups.entry(key(result)).or_default().push(result);
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let returns: Vec<f64> = members.iter().map(|r| r.metrics.total_return).collect();
            let sharpes: Vec<f64> = members.iter().map(|r| r.metrics.sharpe_ratio).collect();
            let n = members.len() as f64;
            GroupSummary {
                key: key.to_string(),
                count: members.len(),
                total_return: ColumnStats::of(&returns),
                sharpe_ratio: ColumnStats::of(&sharpes),
                mean_win_rate: members.iter().map(|r| r.metrics.win_rate).sum::<f64>() / n,
                mean_trades: members.iter().map(|r| r.metrics.total_trades as f64).sum::<f64>() / n,
            }
        })
        .collect()
}

/// Groups sorted by strategy name.
pub fn summarize_by_strategy(results: &[BacktestResult]) -> Vec<GroupSummary> {
    summarize_by(results, |r| r.strategy.as_str())
}

/// Groups sorted by symbol.
pub fn summarize_by_symbol(results: &[BacktestResult]) -> Vec<GroupSummary> {
    summarize_by(results, |r| r.symbol.as_str())
}

fn write_ranking(out: &mut String, results: &[BacktestResult], top_n: usize, metric: Metric) {
    let _ = writeln!(out, "Top {} by {}:", top_n, metric);
    for (i, r) in rank_results(results, top_n, metric).iter().enumerate() {
        let _ = writeln!(
            out,
            "  {:>2}. {:<16} {:<8} return {:>8.2}%  sharpe {:>6.2}  win {:>5.1}%  trades {:>4}  [{}]",
            i + 1,
            r.strategy,
            r.symbol,
            r.metrics.total_return,
            r.metrics.sharpe_ratio,
            r.metrics.win_rate,
            r.metrics.total_trades,
            r.params
        );
    }
}

fn write_groups(out: &mut String, title: &str, groups: &[GroupSummary]) {
    let _ = writeln!(out, "{}:", title);
    let _ = writeln!(
        out,
        "  {:<16} {:>5} {:>10} {:>9} {:>10} {:>10} {:>8} {:>8} {:>7}",
        "", "runs", "avg_ret%", "std_ret", "max_ret%", "min_ret%", "sharpe", "win%", "trades"
    );
    for g in groups {
        let _ = writeln!(
            out,
            "  {:<16} {:>5} {:>10.2} {:>9.2} {:>10.2} {:>10.2} {:>8.2} {:>8.1} {:>7.1}",
            g.key,
            g.count,
            g.total_return.mean,
            g.total_return.std,
            g.total_return.max,
            g.total_return.min,
            g.sharpe_ratio.mean,
            g.mean_win_rate,
            g.mean_trades
        );
    }
}

/// A single "Top N by metric" table.
pub fn render_ranking(results: &[BacktestResult], top_n: usize, metric: Metric) -> String {
    let mut out = String::new();
    write_ranking(&mut out, results, top_n, metric);
    out
}

/// Plain-text summary of a finished sweep.
pub fn render_report(results: &[BacktestResult], top_n: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Sweep Summary ===");
    let _ = writeln!(out, "Total backtests: {}", results.len());
    if results.is_empty() {
        return out;
    }

    out.push('\n');
    write_ranking(&mut out, results, top_n, Metric::TotalReturn);
    out.push('\n');
    write_ranking(&mut out, results, top_n, Metric::SharpeRatio);
    out.push('\n');
    write_groups(&mut out, "By strategy", &summarize_by_strategy(results));
    out.push('\n');
    write_groups(&mut out, "By symbol", &summarize_by_symbol(results));
    out
}
