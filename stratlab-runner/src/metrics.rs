//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! `PerformanceMetrics` is the reporting view of a simulator run; the fitness
//! function reuses the curve helpers but scores with its own raw ratios.

use serde::{Deserialize, Serialize};
use stratlab_core::domain::{TradeRecord, SECONDS_PER_DAY};
use stratlab_core::engine::RunResult;

/// Reported profit factor when there are gains and no losses.
pub const REPORTED_PROFIT_FACTOR_CAP: f64 = 100.0;

/// Aggregate performance metrics for a single simulator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Peak-to-trough decline as a positive fraction (0.15 = 15%).
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub avg_trade_return: f64,
    pub avg_bars_held: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_losing_streak: f64,
    /// Year with the largest realized P&L, if any trade was attributed.
    pub best_year: Option<(i32, f64)>,
    pub worst_year: Option<(i32, f64)>,
}

impl PerformanceMetrics {
    /// Compute all metrics from a simulator run.
    pub fn compute(run: &RunResult) -> Self {
        let curve = &run.equity_curve;
        let trades = &run.trades;
        let days = run_days(run);
        Self {
            total_return: total_return(curve),
            cagr: cagr(curve, days),
            sharpe: sharpe_ratio(curve),
            sortino: sortino_ratio(curve),
            calmar: calmar_ratio(curve, days),
            max_drawdown: max_drawdown(curve),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades, REPORTED_PROFIT_FACTOR_CAP),
            trade_count: trades.len(),
            avg_trade_return: mean_f64(&trades.iter().map(|t| t.return_pct()).collect::<Vec<_>>()),
            avg_bars_held: mean_f64(
                &trades.iter().map(|t| t.bars_held() as f64).collect::<Vec<_>>(),
            ),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            avg_losing_streak: avg_losing_streak(trades),
            best_year: run
                .yearly_pnl
                .iter()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(&y, &p)| (y, p)),
            worst_year: run
                .yearly_pnl
                .iter()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map(|(&y, &p)| (y, p)),
        }
    }
}

/// Elapsed calendar days between a run's first and last timestamps.
///
/// 0.0 when either end is missing, the span is not positive, or it overflows.
pub fn run_days(run: &RunResult) -> f64 {
    match (run.start_timestamp, run.end_timestamp) {
        (Some(start), Some(end)) => match end.checked_sub(start) {
            Some(secs) if secs > 0 => secs as f64 / SECONDS_PER_DAY as f64,
            _ => 0.0,
        },
        _ => 0.0,
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&final_eq)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (final_eq - initial) / initial
        }
        _ => 0.0,
    }
}

/// Annualized return over `days` elapsed calendar days:
/// `(final / initial)^(365 / days) - 1`.
///
/// Returns 0.0 for fewer than two points, a non-positive span or non-positive equity.
pub fn cagr(equity_curve: &[f64], days: f64) -> f64 {
    let (Some(&initial), Some(&final_eq)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || days <= 0.0 || initial <= 0.0 || final_eq <= 0.0 {
        return 0.0;
    }
    (final_eq / initial).powf(365.0 / days) - 1.0
}

/// Sharpe-like ratio: mean over population stdev of per-bar equity returns.
///
/// Not annualized. Returns 0.0 when the curve is flat or has fewer than 2 points.
pub fn sharpe_ratio(equity_curve: &[f64]) -> f64 {
    let returns = bar_returns(equity_curve);
    let std = population_std_dev(&returns);
    if std > 0.0 {
        mean_f64(&returns) / std
    } else {
        0.0
    }
}

/// Sortino ratio: mean over downside deviation of per-bar returns, not annualized.
pub fn sortino_ratio(equity_curve: &[f64]) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let downside_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    if downside_sq == 0.0 {
        return 0.0;
    }
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / downside_std
}

/// Calmar ratio: annualized return / max drawdown.
///
/// Returns 0.0 if max drawdown is zero or the annualized return is non-positive.
pub fn calmar_ratio(equity_curve: &[f64], days: f64) -> f64 {
    let c = cagr(equity_curve, days);
    let dd = max_drawdown(equity_curve);
    if dd <= 0.0 || c <= 0.0 {
        return 0.0;
    }
    c / dd
}

/// Maximum drawdown as a positive fraction of the running peak.
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd
}

/// Win rate: fraction of trades that were winners.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Profit factor: gross profits / gross losses, over trade P&L.
pub fn profit_factor(trades: &[TradeRecord], cap: f64) -> f64 {
    let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
    profit_factor_of(&pnls, cap)
}

/// Profit factor over raw outcomes (P&L or returns).
///
/// `cap` stands in for the undefined ratio when there are gains and no losses,
/// 0.0 when there is nothing to compare, otherwise the plain gains / losses.
pub fn profit_factor_of(outcomes: &[f64], cap: f64) -> f64 {
    let gross_profit: f64 = outcomes.iter().filter(|&&x| x > 0.0).sum();
    let gross_loss: f64 = outcomes.iter().filter(|&&x| x < 0.0).map(|x| x.abs()).sum();
    if gross_loss <= 0.0 {
        return if gross_profit > 0.0 { cap } else { 0.0 };
    }
    gross_profit / gross_loss
}

/// Maximum run of consecutive winners (`winners = true`) or losers.
pub fn max_consecutive(trades: &[TradeRecord], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

/// Average length of losing streaks.
pub fn avg_losing_streak(trades: &[TradeRecord]) -> f64 {
    let mut streaks: Vec<usize> = Vec::new();
    let mut current = 0;
    for trade in trades {
        if !trade.is_winner() {
            current += 1;
        } else {
            if current > 0 {
                streaks.push(current);
            }
            current = 0;
        }
    }
    if current > 0 {
        streaks.push(current);
    }
    if streaks.is_empty() {
        return 0.0;
    }
    streaks.iter().sum::<usize>() as f64 / streaks.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Per-bar returns of an equity curve; a non-positive prior point yields 0.
pub fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub(crate) fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(values);
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use stratlab_core::domain::ExitReason;

    fn make_trade(pnl: f64) -> TradeRecord {
        TradeRecord {
            entry_bar: 0,
            entry_timestamp: 1_704_153_600,
            entry_price: 100.0,
            entry_year: Some(2024),
            exit_bar: 5,
            exit_price: 100.0 + pnl,
            exit_reason: ExitReason::EndOfData,
            size: 1.0,
            pnl,
        }
    }

    fn make_run(curve: Vec<f64>, trades: Vec<TradeRecord>) -> RunResult {
        let initial = curve.first().copied().unwrap_or(0.0);
        let final_equity = curve.last().copied().unwrap_or(0.0);
        RunResult {
            equity_curve: curve,
            trades,
            yearly_pnl: BTreeMap::new(),
            initial_equity: initial,
            final_equity,
            max_open_positions: 0,
            signals_seen: 0,
            start_timestamp: Some(0),
            end_timestamp: Some(365 * SECONDS_PER_DAY),
        }
    }

    #[test]
    fn total_return_cases() {
        assert!((total_return(&[100.0, 110.0]) - 0.10).abs() < 1e-10);
        assert!((total_return(&[100.0, 90.0]) + 0.10).abs() < 1e-10);
        assert_eq!(total_return(&[100.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    #[test]
    fn cagr_one_year_equals_total_return() {
        let c = cagr(&[100.0, 105.0, 121.0], 365.0);
        assert!((c - 0.21).abs() < 1e-10);
        assert_eq!(cagr(&[100.0, 121.0], 0.0), 0.0);
    }

    #[test]
    fn cagr_compounds_over_calendar_days() {
        // 21% over two years of 365 days is 10% a year.
        let c = cagr(&[100.0, 121.0], 730.0);
        assert!((c - 0.10).abs() < 1e-10, "cagr = {c}");
        // Half a year at 10% annualizes to 21%.
        let c = cagr(&[100.0, 110.0], 182.5);
        assert!((c - 0.21).abs() < 1e-10, "cagr = {c}");
    }

    #[test]
    fn sharpe_constant_equity_is_zero() {
        assert_eq!(sharpe_ratio(&[100.0; 10]), 0.0);
        assert_eq!(sharpe_ratio(&[100.0]), 0.0);
    }

    #[test]
    fn sharpe_known_returns() {
        // Returns: +10%, -10% → mean 0 → Sharpe 0 (up to rounding).
        let s = sharpe_ratio(&[100.0, 110.0, 99.0]);
        assert!(s.abs() < 1e-10, "sharpe = {s}");
        let up = sharpe_ratio(&[100.0, 101.0, 103.0, 104.0]);
        assert!(up > 0.0);
    }

    #[test]
    fn sharpe_is_mean_over_population_stdev() {
        // Returns 0.1, -0.1, 0.2121..: mean / population stdev, no annualization.
        let curve = [100.0, 110.0, 99.0, 120.0];
        let r = [0.1, -0.1, 21.0 / 99.0];
        let mean = r.iter().sum::<f64>() / 3.0;
        let var = r.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 3.0;
        let expected = mean / var.sqrt();
        let s = sharpe_ratio(&curve);
        assert!((s - expected).abs() < 1e-12, "sharpe = {s}");
        assert!((s - 0.5477).abs() < 1e-3, "sharpe = {s}");
    }

    #[test]
    fn sortino_no_downside_is_zero() {
        assert_eq!(sortino_ratio(&[100.0, 101.0, 102.0]), 0.0);
        assert!(sortino_ratio(&[100.0, 95.0, 110.0, 112.0]) > 0.0);
    }

    #[test]
    fn max_drawdown_known() {
        let dd = max_drawdown(&[100.0, 120.0, 90.0, 130.0]);
        assert!((dd - 0.25).abs() < 1e-10);
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn calmar_requires_drawdown_and_growth() {
        let c = calmar_ratio(&[100.0, 120.0, 90.0, 130.0], 365.0);
        assert!((c - 0.30 / 0.25).abs() < 1e-10);
        assert_eq!(calmar_ratio(&[100.0, 110.0], 365.0), 0.0);
    }

    #[test]
    fn win_rate_and_profit_factor() {
        let trades = vec![make_trade(10.0), make_trade(-5.0), make_trade(20.0)];
        assert!((win_rate(&trades) - 2.0 / 3.0).abs() < 1e-10);
        assert!((profit_factor(&trades, 100.0) - 6.0).abs() < 1e-10);
        assert_eq!(win_rate(&[]), 0.0);
        assert_eq!(profit_factor(&[], 100.0), 0.0);
    }

    #[test]
    fn profit_factor_all_winners_hits_cap() {
        assert_eq!(profit_factor_of(&[0.1, 0.2], 1000.0), 1000.0);
        assert_eq!(profit_factor_of(&[-0.1], 1000.0), 0.0);
        assert_eq!(profit_factor_of(&[0.0], 1000.0), 0.0);
    }

    #[test]
    fn profit_factor_cap_only_replaces_the_no_loss_case() {
        // 500 / 0.1 = 5000 stays above a cap of 100.
        let pf = profit_factor_of(&[500.0, -0.1], 100.0);
        assert!((pf - 5000.0).abs() < 1e-6, "pf = {pf}");
        let trades = vec![make_trade(300.0), make_trade(-1.0)];
        assert!((profit_factor(&trades, REPORTED_PROFIT_FACTOR_CAP) - 300.0).abs() < 1e-10);
    }

    #[test]
    fn streaks() {
        let t: Vec<TradeRecord> = [1.0, 1.0, -1.0, -1.0, -1.0, 1.0, -1.0]
            .iter()
            .map(|&p| make_trade(p))
            .collect();
        assert_eq!(max_consecutive(&t, true), 2);
        assert_eq!(max_consecutive(&t, false), 3);
        assert!((avg_losing_streak(&t) - 2.0).abs() < 1e-10);
        assert_eq!(avg_losing_streak(&t[..2]), 0.0);
    }

    #[test]
    fn population_std() {
        assert!((population_std_dev(&[1.0, 3.0]) - 1.0).abs() < 1e-12);
        assert_eq!(population_std_dev(&[]), 0.0);
    }

    #[test]
    fn run_days_handles_missing_and_overflowing_spans() {
        let mut run = make_run(vec![100.0, 110.0], vec![]);
        assert!((run_days(&run) - 365.0).abs() < 1e-12);
        run.end_timestamp = None;
        assert_eq!(run_days(&run), 0.0);
        run.start_timestamp = Some(i64::MIN);
        run.end_timestamp = Some(1_000_000_000);
        assert_eq!(run_days(&run), 0.0);
    }

    #[test]
    fn compute_tolerates_extreme_timestamps() {
        let mut run = make_run(vec![100.0, 90.0, 120.0], vec![make_trade(20.0)]);
        run.start_timestamp = Some(i64::MIN);
        run.end_timestamp = Some(1_000_000_000);
        let m = PerformanceMetrics::compute(&run);
        assert_eq!(m.cagr, 0.0);
        assert_eq!(m.calmar, 0.0);
        assert!((m.total_return - 0.2).abs() < 1e-10);
        assert_eq!(m.trade_count, 1);
    }

    #[test]
    fn compute_annualizes_over_calendar_days() {
        let mut run = make_run(vec![100.0, 105.0, 121.0], vec![]);
        run.end_timestamp = Some(730 * SECONDS_PER_DAY);
        let m = PerformanceMetrics::compute(&run);
        assert!((m.cagr - 0.10).abs() < 1e-10, "cagr = {}", m.cagr);
    }

    #[test]
    fn compute_from_run() {
        let mut run = make_run(
            vec![1000.0, 1010.0, 990.0, 1030.0],
            vec![make_trade(10.0), make_trade(-20.0), make_trade(40.0)],
        );
        run.yearly_pnl.insert(2023, -20.0);
        run.yearly_pnl.insert(2024, 50.0);
        let m = PerformanceMetrics::compute(&run);
        assert_eq!(m.trade_count, 3);
        assert!((m.total_return - 0.03).abs() < 1e-10);
        assert!(m.max_drawdown > 0.0);
        assert_eq!(m.best_year, Some((2024, 50.0)));
        assert_eq!(m.worst_year, Some((2023, -20.0)));
        assert_eq!(m.max_consecutive_losses, 1);
    }

    #[test]
    fn compute_from_empty_run() {
        let run = make_run(vec![], vec![]);
        let m = PerformanceMetrics::compute(&run);
        assert_eq!(m.trade_count, 0);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.best_year, None);
    }
}
