//! Evolved-gene signal: entries and indicator exits described by a gene.

use super::{SeriesCache, SignalGenerator};
use crate::domain::{Bar, Signal};
use crate::gene::StrategyGene;

#[derive(Debug)]
pub struct EvolvedSignal {
    gene: StrategyGene,
    /// (primary, secondary) indicator series.
    cache: SeriesCache<(Vec<f64>, Vec<f64>)>,
    name: String,
}

impl EvolvedSignal {
    pub fn new(gene: StrategyGene) -> Self {
        let name = format!(
            "evolved_{:?}{}_{:?}{}",
            gene.primary_indicator,
            gene.primary_period,
            gene.secondary_indicator,
            gene.secondary_period
        )
        .to_lowercase();
        Self {
            gene,
            cache: SeriesCache::new(),
            name,
        }
    }

    pub fn gene(&self) -> &StrategyGene {
        &self.gene
    }
}

impl SignalGenerator for EvolvedSignal {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_bars(&self) -> usize {
        self.gene.warmup()
    }

    fn generate(&mut self, bars: &[Bar], index: usize) -> Signal {
        if index >= bars.len() {
            return Signal::none(index, "index out of range");
        }
        if index < self.gene.warmup() {
            return Signal::none(index, "warmup");
        }

        let gene = &self.gene;
        let (primary, secondary) =
            self.cache
                .get_or_compute(bars, || gene.indicator_series(bars), |_| {});
        if !gene.entry_at(primary, secondary, index) {
            return Signal::none(index, "no setup");
        }

        let close = bars[index].close;
        let (stop, target) = gene.stop_and_target(close);
        Signal::buy(
            index,
            stop,
            target,
            format!(
                "{:?} {:?}: {:.2} / {:.2}",
                gene.entry_condition, gene.primary_indicator, primary[index], secondary[index]
            ),
        )
        .with_exit(gene.exit_rule())
    }

    fn exit_triggered(&mut self, bars: &[Bar], index: usize) -> bool {
        if index >= bars.len() {
            return false;
        }
        let gene = &self.gene;
        let (_, secondary) = self
            .cache
            .get_or_compute(bars, || gene.indicator_series(bars), |_| {});
        gene.exit_signal_at(secondary, index)
    }
}
