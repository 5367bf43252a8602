//! StratLab Core: bars, indicators, signal generators, simulator, dual-path compute.
//!
//! This crate contains the evaluation engine:
//! - Domain types (bars, signals, open positions, trades)
//! - Indicator engine with a scalar reference path and a batch path
//! - Signal generators (fixed rule, dynamic period, evolved gene)
//! - Single-position backtesting simulator with exit rules
//! - Dual-path (CPU / accelerated) rule evaluation with buffer pooling
//! - Strategy genes and the deterministic RNG hierarchy used by the search

pub mod accel;
pub mod components;
pub mod domain;
pub mod engine;
pub mod gene;
pub mod indicators;
pub mod rng;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with worker threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Signal>();
        require_sync::<domain::Signal>();
        require_send::<domain::OpenPosition>();
        require_sync::<domain::OpenPosition>();
        require_send::<domain::TradeRecord>();
        require_sync::<domain::TradeRecord>();

        // Genes and search plumbing
        require_send::<gene::StrategyGene>();
        require_sync::<gene::StrategyGene>();
        require_send::<gene::GeneDomain>();
        require_sync::<gene::GeneDomain>();
        require_send::<rng::RngHierarchy>();
        require_sync::<rng::RngHierarchy>();

        // Engine and compute
        require_send::<engine::RunResult>();
        require_sync::<engine::RunResult>();
        require_send::<engine::Simulator>();
        require_sync::<engine::Simulator>();
        require_send::<accel::DualPathExecutor>();
        require_sync::<accel::DualPathExecutor>();
        require_send::<components::SignalBatch>();
        require_sync::<components::SignalBatch>();

        // Signal generators move between threads but are used by one at a time.
        require_send::<components::FixedRuleSignal>();
        require_send::<components::DynamicPeriodSignal>();
        require_send::<components::EvolvedSignal>();
    }

    /// The simulator only ever sees a generator through the trait object.
    #[test]
    fn generators_are_object_safe() {
        let gens: Vec<Box<dyn components::SignalGenerator>> = vec![
            Box::new(components::FixedRuleSignal::new(Default::default())),
            Box::new(components::DynamicPeriodSignal::new(
                Default::default(),
                Default::default(),
            )),
        ];
        assert_eq!(gens.len(), 2);
        assert_eq!(gens[0].warmup_bars(), 50);
    }
}
