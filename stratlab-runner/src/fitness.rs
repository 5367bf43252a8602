//! Fitness function: simulation-based composite score for strategy genes.
//!
//! Each evaluation replays the gene over the full series with the same
//! single-position state machine as `stratlab_core::engine::Simulator`
//! (stop, then target, then the gene's exit rule; terminal close at the last
//! bar) but compounds equity per trade:
//! `equity *= 1 + trade_return * position_size_pct`.

use serde::{Deserialize, Serialize};
use stratlab_core::domain::{Bar, ExitReason, ExitRule, OpenPosition};
use stratlab_core::gene::StrategyGene;

use crate::config::ConfigError;
use crate::metrics::{max_drawdown, profit_factor_of, sharpe_ratio};

/// Score given to a gene whose composite is not a finite number.
pub const WORST_SCORE: f64 = f64::MIN;

/// Weights of the composite score.
///
/// `score = sharpe*w + total_return*w + win_rate*w + profit_factor*w - max_drawdown*w`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    pub sharpe: f64,
    pub total_return: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub drawdown_penalty: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            sharpe: 0.4,
            total_return: 0.3,
            win_rate: 0.2,
            profit_factor: 0.1,
            drawdown_penalty: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    pub initial_equity: f64,
    /// Profit factor reported when a gene has gains and no losses.
    pub profit_factor_cap: f64,
    pub weights: FitnessWeights,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            initial_equity: 10_000.0,
            profit_factor_cap: 1000.0,
            weights: FitnessWeights::default(),
        }
    }
}

impl FitnessConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_equity.is_finite() && self.initial_equity > 0.0) {
            return Err(ConfigError::invalid(
                "fitness.initial_equity",
                format!("must be positive, got {}", self.initial_equity),
            ));
        }
        if !(self.profit_factor_cap.is_finite() && self.profit_factor_cap > 0.0) {
            return Err(ConfigError::invalid(
                "fitness.profit_factor_cap",
                format!("must be positive, got {}", self.profit_factor_cap),
            ));
        }
        let w = &self.weights;
        for (field, v) in [
            ("fitness.weights.sharpe", w.sharpe),
            ("fitness.weights.total_return", w.total_return),
            ("fitness.weights.win_rate", w.win_rate),
            ("fitness.weights.profit_factor", w.profit_factor),
            ("fitness.weights.drawdown_penalty", w.drawdown_penalty),
        ] {
            if !v.is_finite() {
                return Err(ConfigError::invalid(field, format!("must be finite, got {v}")));
            }
        }
        Ok(())
    }
}

/// Outcome of one fitness evaluation. Deterministic per (gene, bars, config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessResult {
    pub total_return: f64,
    /// Mean / population stdev of per-bar equity returns, not annualized.
    pub sharpe_ratio: f64,
    /// Positive fraction of the running peak.
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: usize,
    pub profit_factor: f64,
    pub calmar_ratio: f64,
    pub fitness_score: f64,
}

/// Equity path and closed trades of one fitness replay.
#[derive(Debug, Clone, PartialEq)]
pub struct FitnessTrace {
    /// Equity after each bar.
    pub equity_curve: Vec<f64>,
    /// `(entry_bar, exit_bar, return)` per closed trade.
    pub trades: Vec<(usize, usize, f64)>,
}

impl FitnessTrace {
    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve.last().copied()
    }
}

/// Scores genes against one bar series.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator<'a> {
    bars: &'a [Bar],
    config: FitnessConfig,
}

impl<'a> FitnessEvaluator<'a> {
    pub fn new(bars: &'a [Bar], config: FitnessConfig) -> Self {
        Self { bars, config }
    }

    pub fn bars(&self) -> &'a [Bar] {
        self.bars
    }

    pub fn config(&self) -> &FitnessConfig {
        &self.config
    }

    pub fn evaluate(&self, gene: &StrategyGene) -> FitnessResult {
        let trace = self.simulate(gene);
        self.score(&trace)
    }

    /// Replay `gene` over the series.
    pub fn simulate(&self, gene: &StrategyGene) -> FitnessTrace {
        let bars = self.bars;
        let (primary, secondary) = gene.indicator_series(bars);
        let warmup = gene.warmup();
        let exit = gene.exit_rule();

        let mut equity = self.config.initial_equity;
        let mut equity_curve = Vec::with_capacity(bars.len());
        let mut trades = Vec::new();
        let mut open: Option<OpenPosition> = None;

        for (i, bar) in bars.iter().enumerate() {
            let mut closed_this_bar = false;

            if let Some(mut pos) = open.take() {
                match exit_price(&pos, bar, i, || gene.exit_signal_at(&secondary, i)) {
                    Some((price, _)) => {
                        let ret = (price - pos.entry_price) / pos.entry_price;
                        equity *= 1.0 + ret * pos.size;
                        trades.push((pos.entry_bar, i, ret));
                        closed_this_bar = true;
                    }
                    None => {
                        pos.ratchet(bar.close);
                        open = Some(pos);
                    }
                }
            }

            if open.is_none()
                && !closed_this_bar
                && i >= warmup
                && gene.entry_at(&primary, &secondary, i)
            {
                let (stop, target) = gene.stop_and_target(bar.close);
                if stop < bar.close && bar.close < target {
                    open = Some(OpenPosition {
                        entry_bar: i,
                        entry_price: bar.close,
                        stop_price: stop,
                        target_price: target,
                        entry_timestamp: bar.timestamp,
                        entry_year: None,
                        size: gene.position_size_pct,
                        exit,
                        high_water_close: bar.close,
                    });
                }
            }

            equity_curve.push(equity);
        }

        if let (Some(pos), Some(last)) = (open, bars.last()) {
            let ret = (last.close - pos.entry_price) / pos.entry_price;
            equity *= 1.0 + ret * pos.size;
            trades.push((pos.entry_bar, bars.len() - 1, ret));
            if let Some(point) = equity_curve.last_mut() {
                *point = equity;
            }
        }

        FitnessTrace {
            equity_curve,
            trades,
        }
    }

    fn score(&self, trace: &FitnessTrace) -> FitnessResult {
        let initial = self.config.initial_equity;
        let final_equity = trace.final_equity().unwrap_or(initial);
        let total_return = (final_equity - initial) / initial;

        let sharpe_ratio = sharpe_ratio(&trace.equity_curve);

        let max_drawdown = max_drawdown(&trace.equity_curve);
        let outcomes: Vec<f64> = trace.trades.iter().map(|&(_, _, r)| r).collect();
        let total_trades = outcomes.len();
        let win_rate = if total_trades > 0 {
            outcomes.iter().filter(|&&r| r > 0.0).count() as f64 / total_trades as f64
        } else {
            0.0
        };
        let profit_factor = profit_factor_of(&outcomes, self.config.profit_factor_cap);
        let calmar_ratio = if max_drawdown > 0.0 {
            total_return / max_drawdown
        } else {
            0.0
        };

        let w = &self.config.weights;
        let composite = w.sharpe * sharpe_ratio
            + w.total_return * total_return
            + w.win_rate * win_rate
            + w.profit_factor * profit_factor
            - w.drawdown_penalty * max_drawdown;
        let fitness_score = if composite.is_finite() {
            composite
        } else {
            WORST_SCORE
        };

        FitnessResult {
            total_return,
            sharpe_ratio,
            max_drawdown,
            win_rate,
            total_trades,
            profit_factor,
            calmar_ratio,
            fitness_score,
        }
    }
}

/// Exit price and reason at bar `i`: stop, then target, then the exit rule.
fn exit_price(
    pos: &OpenPosition,
    bar: &Bar,
    i: usize,
    indicator_exit: impl FnOnce() -> bool,
) -> Option<(f64, ExitReason)> {
    if bar.low <= pos.stop_price {
        return Some((pos.stop_price, ExitReason::StopLoss));
    }
    if bar.high >= pos.target_price {
        return Some((pos.target_price, ExitReason::TakeProfit));
    }
    match pos.exit {
        ExitRule::TimeLimit { max_bars } if pos.bars_held(i) >= max_bars => {
            Some((bar.close, ExitReason::TimeLimit))
        }
        ExitRule::OnIndicator if indicator_exit() => Some((bar.close, ExitReason::IndicatorExit)),
        _ => None,
    }
}
