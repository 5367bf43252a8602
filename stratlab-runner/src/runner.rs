//! Backtest runner: wires configuration, generators, simulator and search.
//!
//! Bars are supplied by the caller; nothing here reads market data files.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stratlab_core::accel::DualPathExecutor;
use stratlab_core::components::{
    DynamicPeriodSignal, EvolvedSignal, FixedRuleSignal, SignalGenerator,
};
use stratlab_core::domain::Bar;
use stratlab_core::engine::{RunResult, Simulator, SimulatorConfig};
use stratlab_core::gene::StrategyGene;
use tracing::info;

use crate::config::{OptimizerConfig, RunId};
use crate::genetic::{EvolutionOutcome, GeneticSearch};
use crate::metrics::PerformanceMetrics;

/// A simulator run together with its metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub generator: String,
    pub run: RunResult,
    pub metrics: PerformanceMetrics,
}

/// Everything produced by one optimization session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub run_id: RunId,
    pub config: OptimizerConfig,
    pub outcome: EvolutionOutcome,
    /// Best gene replayed through the simulator.
    pub best_backtest: BacktestReport,
    /// Fixed rule with the configured parameters, for comparison.
    pub fixed_rule: BacktestReport,
    /// Fixed rule with periods scaled to the series span.
    pub dynamic_rule: BacktestReport,
}

/// Simulate `generator` over `bars` and compute its metrics.
pub fn run_backtest(
    bars: &[Bar],
    generator: &mut dyn SignalGenerator,
    config: &SimulatorConfig,
) -> BacktestReport {
    let run = Simulator::new(config.clone()).run(bars, generator);
    let metrics = PerformanceMetrics::compute(&run);
    info!(
        generator = generator.name(),
        trades = run.trade_count(),
        final_equity = run.final_equity,
        "backtest finished"
    );
    BacktestReport {
        generator: generator.name().to_string(),
        run,
        metrics,
    }
}

/// Replay a gene through the simulator.
pub fn run_gene_backtest(
    bars: &[Bar],
    gene: &StrategyGene,
    config: &SimulatorConfig,
) -> BacktestReport {
    let mut signal = EvolvedSignal::new(gene.clone());
    run_backtest(bars, &mut signal, config)
}

/// Load the configuration at `path` and run a full optimization over `bars`.
pub fn run_optimization(path: impl AsRef<Path>, bars: &[Bar]) -> Result<OptimizationReport> {
    let path = path.as_ref();
    let config = OptimizerConfig::from_file(path)
        .with_context(|| format!("failed to load optimizer config {}", path.display()))?;
    run_optimization_with(config, bars)
}

/// Run a full optimization with an already loaded configuration.
pub fn run_optimization_with(config: OptimizerConfig, bars: &[Bar]) -> Result<OptimizationReport> {
    config.validate().context("invalid optimizer config")?;
    let run_id = config.run_id();
    info!(run_id = %run_id, bars = bars.len(), "optimization started");

    let mut search = GeneticSearch::new(bars, config.genetic.clone(), config.fitness.clone())
        .context("failed to set up genetic search")?
        .with_domain(config.domain.clone())
        .context("invalid gene domain")?;
    let outcome = search.evolve();

    let best_backtest = run_gene_backtest(bars, &outcome.best.gene, &config.backtest);

    let executor: Arc<DualPathExecutor> = Arc::new(config.executor());
    let mut fixed = FixedRuleSignal::with_executor(config.rule.clone(), Arc::clone(&executor));
    let fixed_rule = run_backtest(bars, &mut fixed, &config.backtest);
    let mut dynamic = DynamicPeriodSignal::with_executor(
        config.dynamic.clone(),
        config.rule.clone(),
        Arc::clone(&executor),
    );
    let dynamic_rule = run_backtest(bars, &mut dynamic, &config.backtest);

    info!(
        run_id = %run_id,
        best_fitness = outcome.best.result.fitness_score,
        best_trades = best_backtest.run.trade_count(),
        fixed_trades = fixed_rule.run.trade_count(),
        dynamic_trades = dynamic_rule.run.trade_count(),
        "optimization finished"
    );

    Ok(OptimizationReport {
        run_id,
        config,
        outcome,
        best_backtest,
        fixed_rule,
        dynamic_rule,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.15).sin() * 10.0;
                Bar {
                    timestamp: 1_704_153_600 + i as i64 * 86_400,
                    open: c,
                    high: c + 2.0,
                    low: c - 2.0,
                    close: c,
                    volume: 1.0,
                }
            })
            .collect()
    }

    fn quick_config() -> OptimizerConfig {
        let mut config = OptimizerConfig::default();
        config.genetic.population_size = 6;
        config.genetic.generations = 2;
        config.genetic.seed = Some(17);
        config.domain.period_max = 20;
        config.rule.ma_period = 10;
        config.rule.osc_period = 5;
        config
    }

    #[test]
    fn optimization_report_is_complete() {
        let bars = bars(120);
        let report = run_optimization_with(quick_config(), &bars).unwrap();
        assert_eq!(report.run_id, quick_config().run_id());
        assert_eq!(report.outcome.history.len(), 2);
        assert_eq!(report.best_backtest.run.equity_curve.len(), 120);
        assert_eq!(report.fixed_rule.generator, "fixed_rule_10_5");
        assert_eq!(report.dynamic_rule.run.equity_curve.len(), 120);
    }

    #[test]
    fn invalid_config_is_an_error() {
        let mut config = quick_config();
        config.genetic.generations = 0;
        assert!(run_optimization_with(config, &bars(30)).is_err());
    }

    #[test]
    fn empty_series_is_an_error() {
        let err = run_optimization_with(quick_config(), &[]).unwrap_err();
        assert!(format!("{err:#}").contains("empty bar series"));
    }
}
