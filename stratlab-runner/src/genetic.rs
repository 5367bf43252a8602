//! Genetic search over strategy genes.
//!
//! Per generation: evaluate → tournament selection → crossover on adjacent
//! pairs → mutation → elitism. The best gene seen in any generation is
//! reported when the fixed generation count is exhausted.
//!
//! All randomness is drawn from an `RngHierarchy` stream per stage and
//! generation, and evaluation writes only into each gene's own slot, so a
//! seeded search gives the same outcome sequentially and in parallel.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use stratlab_core::domain::Bar;
use stratlab_core::gene::{GeneDomain, StrategyGene};
use stratlab_core::rng::RngHierarchy;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::fitness::{FitnessConfig, FitnessEvaluator, FitnessResult, WORST_SCORE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    pub population_size: usize,
    pub generations: usize,
    /// Per-field resample probability.
    pub mutation_rate: f64,
    /// Probability that an adjacent pair is recombined.
    pub crossover_rate: f64,
    pub tournament_size: usize,
    /// Master seed; `None` draws one from entropy.
    pub seed: Option<u64>,
    /// Evaluate the population on the rayon pool.
    pub parallel: bool,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 100,
            mutation_rate: 0.1,
            crossover_rate: 0.8,
            tournament_size: 3,
            seed: None,
            parallel: true,
        }
    }
}

impl GeneticConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::invalid(
                "genetic.population_size",
                format!("must be >= 2, got {}", self.population_size),
            ));
        }
        if self.generations < 1 {
            return Err(ConfigError::invalid("genetic.generations", "must be >= 1"));
        }
        for (field, rate) in [
            ("genetic.mutation_rate", self.mutation_rate),
            ("genetic.crossover_rate", self.crossover_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be in [0, 1], got {rate}"),
                ));
            }
        }
        if self.tournament_size < 1 {
            return Err(ConfigError::invalid("genetic.tournament_size", "must be >= 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("cannot search over an empty bar series")]
    EmptySeries,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Where the search is in its generation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Initialized,
    Evaluating,
    Selecting,
    Crossing,
    Mutating,
    /// Elitism: the best-ever gene is written back into the population.
    Preserving,
    Terminated,
}

/// Summary of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// 1-based generation number.
    pub generation: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub best_ever_fitness: f64,
    /// Genes scored this generation; carried-over scores are not recomputed.
    pub evaluations: usize,
}

/// A gene with its re-evaluated fitness breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredGene {
    pub gene: StrategyGene,
    pub result: FitnessResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionOutcome {
    /// Best gene across all generations.
    pub best: ScoredGene,
    pub history: Vec<GenerationStats>,
    /// Final population, re-evaluated and sorted best first.
    pub final_population: Vec<ScoredGene>,
    pub master_seed: u64,
}

impl EvolutionOutcome {
    /// The `n` best genes of the final population.
    pub fn top(&self, n: usize) -> &[ScoredGene] {
        &self.final_population[..n.min(self.final_population.len())]
    }
}

pub struct GeneticSearch<'a> {
    config: GeneticConfig,
    domain: GeneDomain,
    evaluator: FitnessEvaluator<'a>,
    rng: RngHierarchy,
    population: Vec<StrategyGene>,
    best_ever: Option<StrategyGene>,
    state: SearchState,
}

impl<'a> GeneticSearch<'a> {
    pub fn new(
        bars: &'a [Bar],
        config: GeneticConfig,
        fitness: FitnessConfig,
    ) -> Result<Self, SearchError> {
        if bars.is_empty() {
            return Err(SearchError::EmptySeries);
        }
        config.validate()?;
        fitness.validate()?;
        let rng = RngHierarchy::from_optional(config.seed);
        Ok(Self {
            config,
            domain: GeneDomain::default(),
            evaluator: FitnessEvaluator::new(bars, fitness),
            rng,
            population: Vec::new(),
            best_ever: None,
            state: SearchState::Initialized,
        })
    }

    /// Replace the sampling domain.
    pub fn with_domain(mut self, domain: GeneDomain) -> Result<Self, SearchError> {
        domain
            .validate()
            .map_err(|e| ConfigError::invalid("domain", e.to_string()))?;
        self.domain = domain;
        Ok(self)
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn master_seed(&self) -> u64 {
        self.rng.master_seed()
    }

    pub fn population(&self) -> &[StrategyGene] {
        &self.population
    }

    pub fn evaluator(&self) -> &FitnessEvaluator<'a> {
        &self.evaluator
    }

    pub fn evolve(&mut self) -> EvolutionOutcome {
        self.evolve_with_progress(|_| {})
    }

    /// Run the search, calling `on_generation` after every generation.
    ///
    /// Each call starts from a fresh population drawn from the master seed.
    pub fn evolve_with_progress<F>(&mut self, mut on_generation: F) -> EvolutionOutcome
    where
        F: FnMut(&GenerationStats),
    {
        self.initialize();
        let mut history = Vec::with_capacity(self.config.generations);

        info!(
            population = self.config.population_size,
            generations = self.config.generations,
            seed = self.rng.master_seed(),
            bars = self.evaluator.bars().len(),
            "genetic search started"
        );

        for generation in 1..=self.config.generations {
            let g = generation as u64;

            self.state = SearchState::Evaluating;
            let evaluations = self.evaluate_population();
            let stats = self.record_generation(generation, evaluations);

            self.state = SearchState::Selecting;
            self.select(g);
            self.state = SearchState::Crossing;
            self.crossover(g);
            self.state = SearchState::Mutating;
            self.mutate(g);
            self.state = SearchState::Preserving;
            self.preserve_elite();

            info!(
                generation,
                best = stats.best_fitness,
                mean = stats.mean_fitness,
                best_ever = stats.best_ever_fitness,
                evaluations,
                "generation complete"
            );
            on_generation(&stats);
            history.push(stats);
        }

        self.state = SearchState::Terminated;
        let outcome = self.outcome(history);
        info!(
            fitness = outcome.best.result.fitness_score,
            trades = outcome.best.result.total_trades,
            gene = %outcome.best.gene,
            "genetic search finished"
        );
        outcome
    }

    fn initialize(&mut self) {
        let mut rng = self.rng.rng_for("init", 0);
        let domain = &self.domain;
        self.population = (0..self.config.population_size)
            .map(|_| StrategyGene::random(&mut rng, domain))
            .collect();
        self.best_ever = None;
        self.state = SearchState::Initialized;
    }

    /// Score every gene without a fitness. Returns how many were scored.
    fn evaluate_population(&mut self) -> usize {
        let evaluator = &self.evaluator;
        let score = |gene: &mut StrategyGene| {
            gene.fitness = Some(evaluator.evaluate(gene).fitness_score);
        };
        let pending = self.population.iter().filter(|g| g.fitness.is_none()).count();
        if self.config.parallel {
            self.population
                .par_iter_mut()
                .filter(|g| g.fitness.is_none())
                .for_each(score);
        } else {
            self.population
                .iter_mut()
                .filter(|g| g.fitness.is_none())
                .for_each(score);
        }
        pending
    }

    fn record_generation(&mut self, generation: usize, evaluations: usize) -> GenerationStats {
        let n = self.population.len() as f64;
        let mean_fitness: f64 = self.population.iter().map(|g| fitness_of(g) / n).sum();

        let best_fitness = match best_index(&self.population) {
            Some(i) => {
                let candidate = &self.population[i];
                let best = fitness_of(candidate);
                let improved = self
                    .best_ever
                    .as_ref()
                    .map_or(true, |b| best > fitness_of(b));
                if improved {
                    debug!(generation, fitness = best, gene = %candidate, "new best gene");
                    self.best_ever = Some(candidate.clone());
                }
                best
            }
            None => WORST_SCORE,
        };

        GenerationStats {
            generation,
            best_fitness,
            mean_fitness,
            best_ever_fitness: self.best_ever.as_ref().map_or(WORST_SCORE, fitness_of),
            evaluations,
        }
    }

    /// Tournament selection: each slot takes the fittest of `tournament_size` draws.
    fn select(&mut self, generation: u64) {
        let mut rng = self.rng.rng_for("select", generation);
        let n = self.population.len();
        let selected: Vec<StrategyGene> = (0..n)
            .map(|_| {
                let mut winner = rng.gen_range(0..n);
                for _ in 1..self.config.tournament_size {
                    let challenger = rng.gen_range(0..n);
                    let pop = &self.population;
                    if fitness_of(&pop[challenger]) > fitness_of(&pop[winner]) {
                        winner = challenger;
                    }
                }
                self.population[winner].clone()
            })
            .collect();
        self.population = selected;
    }

    fn crossover(&mut self, generation: u64) {
        let mut rng = self.rng.rng_for("crossover", generation);
        let rate = self.config.crossover_rate;
        for pair in self.population.chunks_exact_mut(2) {
            if rng.gen::<f64>() < rate {
                let (a, b) = pair[0].crossover(&pair[1], &mut rng);
                pair[0] = a;
                pair[1] = b;
            }
        }
    }

    fn mutate(&mut self, generation: u64) {
        let mut rng = self.rng.rng_for("mutate", generation);
        let rate = self.config.mutation_rate;
        for gene in &mut self.population {
            gene.mutate(&mut rng, rate, &self.domain);
        }
    }

    /// Overwrite the population's best with the best-ever gene when it is better.
    fn preserve_elite(&mut self) {
        let Some(elite) = &self.best_ever else {
            return;
        };
        if let Some(i) = best_index(&self.population) {
            if fitness_of(elite) > fitness_of(&self.population[i]) {
                self.population[i] = elite.clone();
            }
        }
    }

    fn outcome(&self, history: Vec<GenerationStats>) -> EvolutionOutcome {
        let score = |gene: &StrategyGene| {
            let result = self.evaluator.evaluate(gene);
            let mut gene = gene.clone();
            gene.fitness = Some(result.fitness_score);
            ScoredGene { gene, result }
        };

        let mut final_population: Vec<ScoredGene> = if self.config.parallel {
            self.population.par_iter().map(score).collect()
        } else {
            self.population.iter().map(score).collect()
        };
        final_population
            .sort_by(|a, b| b.result.fitness_score.total_cmp(&a.result.fitness_score));

        let best = match &self.best_ever {
            Some(gene) => score(gene),
            None => final_population[0].clone(),
        };

        EvolutionOutcome {
            best,
            history,
            final_population,
            master_seed: self.rng.master_seed(),
        }
    }
}

fn fitness_of(gene: &StrategyGene) -> f64 {
    gene.fitness.unwrap_or(WORST_SCORE)
}

/// Index of the first gene with the highest fitness.
fn best_index(population: &[StrategyGene]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, gene) in population.iter().enumerate() {
        if best.map_or(true, |b| fitness_of(gene) > fitness_of(&population[b])) {
            best = Some(i);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratlab_core::components::IndicatorKind;
    use stratlab_core::gene::{EntryCondition, ExitCondition};

    fn wavy_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.2).sin() * 8.0 + i as f64 * 0.05;
                Bar {
                    timestamp: 1_704_153_600 + i as i64 * 86_400,
                    open: c - 0.5,
                    high: c + 1.5,
                    low: c - 1.5,
                    close: c,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    fn small_config(seed: u64) -> GeneticConfig {
        GeneticConfig {
            population_size: 8,
            generations: 3,
            seed: Some(seed),
            parallel: false,
            ..GeneticConfig::default()
        }
    }

    fn narrow_domain() -> GeneDomain {
        GeneDomain {
            period_min: 3,
            period_max: 20,
            ..GeneDomain::default()
        }
    }

    fn gene_with_fitness(f: Option<f64>) -> StrategyGene {
        StrategyGene {
            primary_indicator: IndicatorKind::Rsi,
            secondary_indicator: IndicatorKind::Sma,
            primary_period: 5,
            secondary_period: 5,
            primary_threshold: 30.0,
            secondary_threshold: 0.0,
            entry_condition: EntryCondition::CrossAbove,
            exit_condition: ExitCondition::FixedRiskReward,
            risk_reward_ratio: 2.0,
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
            max_hold_bars: 10,
            position_size_pct: 0.1,
            fitness: f,
        }
    }

    #[test]
    fn empty_series_rejected() {
        let err = GeneticSearch::new(&[], GeneticConfig::default(), FitnessConfig::default());
        assert!(matches!(err, Err(SearchError::EmptySeries)));
    }

    #[test]
    fn invalid_config_rejected() {
        let bars = wavy_bars(10);
        let config = GeneticConfig {
            population_size: 1,
            ..GeneticConfig::default()
        };
        let err = GeneticSearch::new(&bars, config, FitnessConfig::default());
        assert!(matches!(err, Err(SearchError::Config(_))));
    }

    #[test]
    fn invalid_domain_rejected() {
        let bars = wavy_bars(10);
        let search =
            GeneticSearch::new(&bars, small_config(1), FitnessConfig::default()).unwrap();
        let bad = GeneDomain {
            period_min: 30,
            period_max: 10,
            ..GeneDomain::default()
        };
        assert!(matches!(search.with_domain(bad), Err(SearchError::Config(_))));
    }

    #[test]
    fn state_machine_terminates() {
        let bars = wavy_bars(120);
        let mut search = GeneticSearch::new(&bars, small_config(3), FitnessConfig::default())
            .unwrap()
            .with_domain(narrow_domain())
            .unwrap();
        assert_eq!(search.state(), SearchState::Initialized);
        let outcome = search.evolve();
        assert_eq!(search.state(), SearchState::Terminated);
        assert_eq!(outcome.history.len(), 3);
        assert_eq!(outcome.final_population.len(), 8);
        assert_eq!(outcome.master_seed, 3);
    }

    #[test]
    fn best_ever_never_decreases() {
        let bars = wavy_bars(150);
        let config = GeneticConfig {
            generations: 6,
            ..small_config(11)
        };
        let mut search = GeneticSearch::new(&bars, config, FitnessConfig::default())
            .unwrap()
            .with_domain(narrow_domain())
            .unwrap();
        let outcome = search.evolve();
        for w in outcome.history.windows(2) {
            assert!(w[1].best_ever_fitness >= w[0].best_ever_fitness);
        }
        for s in &outcome.history {
            assert!(s.best_ever_fitness >= s.best_fitness);
            assert!(s.best_fitness >= s.mean_fitness - 1e-9);
        }
        let last = outcome.history.last().unwrap();
        assert_eq!(outcome.best.result.fitness_score, last.best_ever_fitness);
    }

    #[test]
    fn progress_callback_sees_every_generation() {
        let bars = wavy_bars(100);
        let mut search = GeneticSearch::new(&bars, small_config(5), FitnessConfig::default())
            .unwrap()
            .with_domain(narrow_domain())
            .unwrap();
        let mut seen = Vec::new();
        search.evolve_with_progress(|s| seen.push(s.generation));
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn first_generation_scores_everyone() {
        let bars = wavy_bars(100);
        let mut search = GeneticSearch::new(&bars, small_config(9), FitnessConfig::default())
            .unwrap()
            .with_domain(narrow_domain())
            .unwrap();
        let outcome = search.evolve();
        assert_eq!(outcome.history[0].evaluations, 8);
        assert!(outcome.history.iter().all(|s| s.evaluations <= 8));
    }

    #[test]
    fn top_is_sorted_and_bounded() {
        let bars = wavy_bars(100);
        let mut search = GeneticSearch::new(&bars, small_config(21), FitnessConfig::default())
            .unwrap()
            .with_domain(narrow_domain())
            .unwrap();
        let outcome = search.evolve();
        let top = outcome.top(3);
        assert_eq!(top.len(), 3);
        assert!(top[0].result.fitness_score >= top[1].result.fitness_score);
        assert!(top[1].result.fitness_score >= top[2].result.fitness_score);
        assert_eq!(outcome.top(100).len(), 8);
        for s in top {
            assert_eq!(s.gene.fitness, Some(s.result.fitness_score));
        }
    }

    #[test]
    fn best_index_prefers_first_of_ties_and_scored_genes() {
        let pop = vec![
            gene_with_fitness(None),
            gene_with_fitness(Some(1.0)),
            gene_with_fitness(Some(1.0)),
        ];
        assert_eq!(best_index(&pop), Some(1));
        assert_eq!(best_index(&[]), None);
    }

    #[test]
    fn elitism_restores_best_ever() {
        let bars = wavy_bars(10);
        let mut search =
            GeneticSearch::new(&bars, small_config(1), FitnessConfig::default()).unwrap();
        search.population = vec![gene_with_fitness(Some(0.5)), gene_with_fitness(None)];
        let mut elite = gene_with_fitness(Some(2.0));
        elite.primary_period = 9;
        search.best_ever = Some(elite.clone());
        search.preserve_elite();
        assert_eq!(search.population[0], elite);

        // A population already at least as good is left alone.
        search.population = vec![gene_with_fitness(Some(3.0))];
        search.preserve_elite();
        assert_eq!(search.population[0].fitness, Some(3.0));
    }
}
