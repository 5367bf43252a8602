//! StratLab Runner: optimization orchestration on top of `stratlab-core`.
//!
//! This crate provides:
//! - TOML optimizer configuration with validation and content-addressed run ids
//! - Performance metrics for simulator runs
//! - The simulation-based fitness function
//! - Genetic search over strategy genes
//! - Parameter grid sweeps of the fixed rule
//! - Backtest and optimization entry points
//! - Tracing subscriber setup

pub mod config;
pub mod fitness;
pub mod genetic;
pub mod logging;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use config::{AccelConfig, ConfigError, OptimizerConfig, RunId};
pub use fitness::{FitnessConfig, FitnessEvaluator, FitnessResult, FitnessTrace, FitnessWeights};
pub use genetic::{
    EvolutionOutcome, GenerationStats, GeneticConfig, GeneticSearch, ScoredGene, SearchError,
    SearchState,
};
pub use logging::init_tracing;
pub use metrics::PerformanceMetrics;
pub use runner::{
    run_backtest, run_gene_backtest, run_optimization, run_optimization_with, BacktestReport,
    OptimizationReport,
};
pub use sweep::{ParamGrid, ParamSweep, SweepPoint, SweepResults};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<OptimizerConfig>();
        assert_sync::<OptimizerConfig>();
        assert_send::<GeneticConfig>();
        assert_sync::<GeneticConfig>();
        assert_send::<FitnessConfig>();
        assert_sync::<FitnessConfig>();
    }

    #[test]
    fn fitness_evaluator_is_shareable_across_workers() {
        assert_send::<FitnessEvaluator<'static>>();
        assert_sync::<FitnessEvaluator<'static>>();
        assert_send::<FitnessResult>();
        assert_sync::<FitnessResult>();
    }

    #[test]
    fn search_types_are_send_sync() {
        assert_send::<GeneticSearch<'static>>();
        assert_sync::<GeneticSearch<'static>>();
        assert_send::<EvolutionOutcome>();
        assert_sync::<EvolutionOutcome>();
        assert_send::<GenerationStats>();
        assert_sync::<GenerationStats>();
    }

    #[test]
    fn report_types_are_send_sync() {
        assert_send::<PerformanceMetrics>();
        assert_sync::<PerformanceMetrics>();
        assert_send::<OptimizationReport>();
        assert_sync::<OptimizationReport>();
        assert_send::<ParamSweep>();
        assert_sync::<ParamSweep>();
    }
}
