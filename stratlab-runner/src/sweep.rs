//! Parameter sweep over the fixed rule.
//!
//! Every grid point is simulated with its own `FixedRuleSignal`; all of them
//! share one `DualPathExecutor`, so batch buffers are recycled across points.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use stratlab_core::accel::DualPathExecutor;
use stratlab_core::components::{FixedRuleSignal, RuleParams};
use stratlab_core::domain::Bar;
use stratlab_core::engine::{Simulator, SimulatorConfig};
use tracing::info;

use crate::metrics::PerformanceMetrics;

/// Parameter grid specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub ma_periods: Vec<usize>,
    pub osc_periods: Vec<usize>,
    pub oversold_levels: Vec<f64>,
    pub risk_rewards: Vec<f64>,
}

impl Default for ParamGrid {
    /// MA 5..100, oscillator 7/14/21, oversold 20/30/40, risk-reward 1.5..5.
    fn default() -> Self {
        Self {
            ma_periods: vec![5, 10, 20, 50, 100],
            osc_periods: vec![7, 14, 21],
            oversold_levels: vec![20.0, 30.0, 40.0],
            risk_rewards: vec![1.5, 2.0, 3.0, 5.0],
        }
    }
}

impl ParamGrid {
    /// Total number of grid points.
    pub fn size(&self) -> usize {
        self.ma_periods.len()
            * self.osc_periods.len()
            * self.oversold_levels.len()
            * self.risk_rewards.len()
    }

    /// All grid points, `base` supplying the fields the grid does not vary.
    pub fn generate_params(&self, base: &RuleParams) -> Vec<RuleParams> {
        let mut out = Vec::with_capacity(self.size());
        for &ma_period in &self.ma_periods {
            for &osc_period in &self.osc_periods {
                for &oversold in &self.oversold_levels {
                    for &risk_reward in &self.risk_rewards {
                        out.push(RuleParams {
                            ma_period,
                            osc_period,
                            oversold,
                            risk_reward,
                            ..base.clone()
                        });
                    }
                }
            }
        }
        out
    }
}

/// Result of one grid point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepPoint {
    pub params: RuleParams,
    pub final_equity: f64,
    pub total_trades: usize,
    pub win_rate: f64,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResults {
    /// Points in grid order.
    pub points: Vec<SweepPoint>,
}

impl SweepResults {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point with the highest final equity; the first one wins ties.
    pub fn best_by_equity(&self) -> Option<&SweepPoint> {
        self.points.iter().fold(None, |best: Option<&SweepPoint>, p| match best {
            Some(b) if b.final_equity >= p.final_equity => Some(b),
            _ => Some(p),
        })
    }

    /// Points sorted by final equity, best first.
    pub fn ranked(&self) -> Vec<&SweepPoint> {
        let mut v: Vec<&SweepPoint> = self.points.iter().collect();
        v.sort_by(|a, b| b.final_equity.total_cmp(&a.final_equity));
        v
    }
}

/// Parameter sweep executor.
pub struct ParamSweep {
    executor: Arc<DualPathExecutor>,
    simulator: Simulator,
    base: RuleParams,
    parallel: bool,
}

impl ParamSweep {
    pub fn new(executor: Arc<DualPathExecutor>, simulator: SimulatorConfig) -> Self {
        Self {
            executor,
            simulator: Simulator::new(simulator),
            base: RuleParams::default(),
            parallel: true,
        }
    }

    /// Fields not varied by the grid (stop distance, gap threshold).
    pub fn with_base(mut self, base: RuleParams) -> Self {
        self.base = base;
        self
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn executor(&self) -> &Arc<DualPathExecutor> {
        &self.executor
    }

    pub fn sweep(&self, bars: &[Bar], grid: &ParamGrid) -> SweepResults {
        let params = grid.generate_params(&self.base);
        info!(points = params.len(), bars = bars.len(), parallel = self.parallel, "sweep started");

        let points: Vec<SweepPoint> = if self.parallel {
            params.into_par_iter().map(|p| self.run_point(bars, p)).collect()
        } else {
            params.into_iter().map(|p| self.run_point(bars, p)).collect()
        };

        let results = SweepResults { points };
        if let Some(best) = results.best_by_equity() {
            info!(
                ma = best.params.ma_period,
                osc = best.params.osc_period,
                oversold = best.params.oversold,
                risk_reward = best.params.risk_reward,
                final_equity = best.final_equity,
                trades = best.total_trades,
                "sweep finished"
            );
        }
        results
    }

    fn run_point(&self, bars: &[Bar], params: RuleParams) -> SweepPoint {
        let mut signal = FixedRuleSignal::with_executor(params.clone(), Arc::clone(&self.executor));
        let run = self.simulator.run(bars, &mut signal);
        let metrics = PerformanceMetrics::compute(&run);
        SweepPoint {
            params,
            final_equity: run.final_equity,
            total_trades: run.trade_count(),
            win_rate: metrics.win_rate,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_grid() -> ParamGrid {
        ParamGrid {
            ma_periods: vec![3, 5],
            osc_periods: vec![3],
            oversold_levels: vec![30.0, 40.0],
            risk_rewards: vec![2.0],
        }
    }

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.7).sin() * 6.0 + (i % 5) as f64;
                Bar {
                    timestamp: 1_704_153_600 + i as i64 * 86_400,
                    open: c,
                    high: c + 1.0,
                    low: c - 1.0,
                    close: c,
                    volume: 1.0,
                }
            })
            .collect()
    }

    #[test]
    fn default_grid_size() {
        let grid = ParamGrid::default();
        assert_eq!(grid.size(), 5 * 3 * 3 * 4);
        assert_eq!(grid.generate_params(&RuleParams::default()).len(), 180);
    }

    #[test]
    fn generated_params_keep_base_fields() {
        let base = RuleParams {
            base_stop_pct: 0.02,
            gap_threshold: 0.0,
            ..RuleParams::default()
        };
        let params = small_grid().generate_params(&base);
        assert_eq!(params.len(), 4);
        assert_eq!(params[0].ma_period, 3);
        assert_eq!(params[3].ma_period, 5);
        assert_eq!(params[1].oversold, 40.0);
        assert!(params.iter().all(|p| p.base_stop_pct == 0.02 && p.gap_threshold == 0.0));
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let bars = bars(80);
        let exec = Arc::new(DualPathExecutor::cpu_only());
        let seq = ParamSweep::new(Arc::clone(&exec), SimulatorConfig::default())
            .with_parallelism(false)
            .sweep(&bars, &small_grid());
        let par = ParamSweep::new(exec, SimulatorConfig::default()).sweep(&bars, &small_grid());
        assert_eq!(seq.len(), 4);
        for (a, b) in seq.points.iter().zip(&par.points) {
            assert_eq!(a.params, b.params);
            assert_eq!(a.final_equity, b.final_equity);
            assert_eq!(a.total_trades, b.total_trades);
        }
    }

    #[test]
    fn best_by_equity_and_ranking() {
        let bars = bars(60);
        let results = ParamSweep::new(
            Arc::new(DualPathExecutor::cpu_only()),
            SimulatorConfig::default(),
        )
        .sweep(&bars, &small_grid());
        let best = results.best_by_equity().unwrap();
        let ranked = results.ranked();
        assert_eq!(ranked[0].final_equity, best.final_equity);
        assert!(ranked.windows(2).all(|w| w[0].final_equity >= w[1].final_equity));
        assert!(SweepResults::default().best_by_equity().is_none());
    }

    #[test]
    fn executor_pool_is_reused_across_points() {
        let bars = bars(40);
        let exec = Arc::new(DualPathExecutor::cpu_only());
        ParamSweep::new(Arc::clone(&exec), SimulatorConfig::default())
            .with_parallelism(false)
            .sweep(&bars, &small_grid());
        assert!(exec.pool_stats().hits > 0);
    }
}
