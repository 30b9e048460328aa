//! Performance metrics and statistics.

use super::position::Trade;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    /// Percent of initial capital.
    pub total_return: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent of trades with a positive price return.
    pub win_rate: f64,
    /// Deepest fall from a running peak, in percent; always <= 0.
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub final_capital: f64,
}

impl Metrics {
    pub fn compute(
        trades: &[Trade],
        equity: &[f64],
        initial_capital: f64,
        final_capital: f64,
        periods_per_year: f64,
    ) -> Self {
        let total_return = if initial_capital > 0.0 {
            (final_capital - initial_capital) / initial_capital * 100.0
        } else {
            0.0
        };

        let winning_trades = trades.iter().filter(|t| t.is_winner()).count();
        let total_trades = trades.len();

        Metrics {
            total_return,
            total_trades,
            winning_trades,
            losing_trades: total_trades - winning_trades,
            win_rate: win_rate(winning_trades, total_trades),
            max_drawdown: compute_max_drawdown(equity),
            sharpe_ratio: compute_sharpe(equity, periods_per_year),
            final_capital,
        }
    }
}

pub fn win_rate(winning_trades: usize, total_trades: usize) -> f64 {
    if total_trades > 0 {
        winning_trades as f64 / total_trades as f64 * 100.0
    } else {
        0.0
    }
}

/// min((equity - running_max) / running_max * 100), 0 for a curve that never dips.
pub fn compute_max_drawdown(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &value in equity {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            let dd = (value - peak) / peak * 100.0;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}

/// Consecutive percentage changes; a non-positive base contributes 0.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| {
            let prev = w[0];
            let curr = w[1];
            if prev > 0.0 {
                (curr - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

/// mean / sample std of period returns, scaled by sqrt(periods_per_year).
pub fn compute_sharpe(equity: &[f64], periods_per_year: f64) -> f64 {
    let returns = period_returns(equity);
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();

    if stddev > 0.0 && stddev.is_finite() {
        mean / stddev * periods_per_year.sqrt()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{Direction, ExitReason};
    use chrono::NaiveDate;

    fn trade(return_pct: f64) -> Trade {
        let t = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Trade {
            symbol: "BTC-USD".into(),
            direction: Direction::Long,
            size: 1.0,
            entry_price: 100.0,
            exit_price: 100.0 + return_pct,
            entry_time: t,
            exit_time: t,
            pnl: return_pct,
            return_pct,
            exit_reason: ExitReason::Signal,
        }
    }

    #[test]
    fn drawdown_of_rising_curve_is_zero() {
        assert_eq!(compute_max_drawdown(&[100.0, 101.0, 105.0, 105.0]), 0.0);
        assert_eq!(compute_max_drawdown(&[]), 0.0);
    }

    #[test]
    fn drawdown_is_negative_percent() {
        let dd = compute_max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]);
        assert!((dd + 25.0).abs() < 1e-9);
    }

    #[test]
    fn sharpe_zero_for_flat_or_short_curves() {
        assert_eq!(compute_sharpe(&[100.0, 100.0, 100.0], 252.0), 0.0);
        assert_eq!(compute_sharpe(&[100.0, 101.0], 252.0), 0.0);
        assert_eq!(compute_sharpe(&[100.0], 252.0), 0.0);
    }

    #[test]
    fn sharpe_uses_sample_std() {
        let equity = [100.0, 110.0, 99.0, 108.9];
        // returns: 0.1, -0.1, 0.1 ; mean 1/30 ; sample var = (3 * ...)/2
        let r = [0.1, -0.1, 0.1];
        let mean = r.iter().sum::<f64>() / 3.0;
        let var = r.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 2.0;
        let expected = mean / var.sqrt() * 252f64.sqrt();
        assert!((compute_sharpe(&equity, 252.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn metrics_compute_counts_trades() {
        let trades = vec![trade(5.0), trade(-2.0), trade(0.0), trade(1.0)];
        let m = Metrics::compute(&trades, &[10_000.0, 10_500.0], 10_000.0, 10_500.0, 252.0);

        assert_eq!(m.total_trades, 4);
        assert_eq!(m.winning_trades, 2);
        assert_eq!(m.losing_trades, 2);
        assert!((m.win_rate - 50.0).abs() < 1e-12);
        assert!((m.total_return - 5.0).abs() < 1e-12);
        assert!((m.final_capital - 10_500.0).abs() < 1e-12);
    }

    #[test]
    fn win_rate_without_trades_is_zero() {
        assert_eq!(win_rate(0, 0), 0.0);
        let m = Metrics::compute(&[], &[], 10_000.0, 10_000.0, 252.0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.total_return, 0.0);
    }
}
