//! Strategy gene: one candidate parameterization for the genetic search.
//!
//! A gene picks two indicators, their periods and thresholds, an entry
//! condition over them, an exit rule and the risk parameters. Every numeric
//! field lives inside a `GeneDomain`; sampling, mutation and crossover keep it
//! there.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::indicator::IndicatorKind;
use crate::domain::{Bar, ExitRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryCondition {
    /// Primary crosses above its threshold.
    CrossAbove,
    /// Primary crosses below its threshold.
    CrossBelow,
    /// Both indicators above their thresholds.
    Above,
    /// Both indicators below their thresholds.
    Below,
}

impl EntryCondition {
    pub const ALL: [EntryCondition; 4] = [
        EntryCondition::CrossAbove,
        EntryCondition::CrossBelow,
        EntryCondition::Above,
        EntryCondition::Below,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitCondition {
    FixedRiskReward,
    TrailingStop,
    TimeBased,
    IndicatorSignal,
}

impl ExitCondition {
    pub const ALL: [ExitCondition; 4] = [
        ExitCondition::FixedRiskReward,
        ExitCondition::TrailingStop,
        ExitCondition::TimeBased,
        ExitCondition::IndicatorSignal,
    ];
}

#[derive(Debug, Error, PartialEq)]
pub enum GeneError {
    #[error("invalid gene domain: {field}: {reason}")]
    Domain { field: &'static str, reason: String },

    #[error("gene field {field} = {value} outside its domain")]
    OutOfDomain { field: &'static str, value: f64 },
}

/// Sampling bounds (inclusive) for every numeric gene field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneDomain {
    pub period_min: usize,
    pub period_max: usize,
    pub threshold_min: f64,
    pub threshold_max: f64,
    pub risk_reward_min: f64,
    pub risk_reward_max: f64,
    /// Bounds shared by stop-loss and take-profit fractions.
    pub pct_min: f64,
    pub pct_max: f64,
    pub hold_min: usize,
    pub hold_max: usize,
    pub size_min: f64,
    pub size_max: f64,
}

impl Default for GeneDomain {
    fn default() -> Self {
        Self {
            period_min: 5,
            period_max: 200,
            threshold_min: -50.0,
            threshold_max: 50.0,
            risk_reward_min: 1.0,
            risk_reward_max: 10.0,
            pct_min: 0.005,
            pct_max: 0.1,
            hold_min: 1,
            hold_max: 168,
            size_min: 0.01,
            size_max: 0.5,
        }
    }
}

impl GeneDomain {
    pub fn validate(&self) -> Result<(), GeneError> {
        fn ordered<T: PartialOrd + fmt::Display>(
            field: &'static str,
            lo: T,
            hi: T,
        ) -> Result<(), GeneError> {
            if lo <= hi {
                Ok(())
            } else {
                Err(GeneError::Domain {
                    field,
                    reason: format!("min {lo} > max {hi}"),
                })
            }
        }
        fn positive(field: &'static str, lo: f64) -> Result<(), GeneError> {
            if lo > 0.0 && lo.is_finite() {
                Ok(())
            } else {
                Err(GeneError::Domain {
                    field,
                    reason: format!("lower bound {lo} must be positive"),
                })
            }
        }

        if self.period_min < 1 {
            return Err(GeneError::Domain {
                field: "period_min",
                reason: "periods must be >= 1".into(),
            });
        }
        if self.hold_min < 1 {
            return Err(GeneError::Domain {
                field: "hold_min",
                reason: "max hold must be >= 1 bar".into(),
            });
        }
        ordered("period", self.period_min, self.period_max)?;
        ordered("threshold", self.threshold_min, self.threshold_max)?;
        ordered("risk_reward", self.risk_reward_min, self.risk_reward_max)?;
        ordered("pct", self.pct_min, self.pct_max)?;
        ordered("hold", self.hold_min, self.hold_max)?;
        ordered("size", self.size_min, self.size_max)?;
        positive("risk_reward_min", self.risk_reward_min)?;
        positive("pct_min", self.pct_min)?;
        positive("size_min", self.size_min)?;
        if self.pct_max >= 1.0 {
            return Err(GeneError::Domain {
                field: "pct_max",
                reason: "stop/target fractions must be < 1".into(),
            });
        }
        Ok(())
    }

    fn period<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.gen_range(self.period_min..=self.period_max)
    }

    fn threshold<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.gen_range(self.threshold_min..=self.threshold_max)
    }

    fn risk_reward<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.gen_range(self.risk_reward_min..=self.risk_reward_max)
    }

    fn pct<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.gen_range(self.pct_min..=self.pct_max)
    }

    fn hold<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.gen_range(self.hold_min..=self.hold_max)
    }

    fn size<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.gen_range(self.size_min..=self.size_max)
    }
}

fn pick<T: Copy, R: Rng + ?Sized>(rng: &mut R, options: &[T]) -> T {
    options[rng.gen_range(0..options.len())]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyGene {
    pub primary_indicator: IndicatorKind,
    pub secondary_indicator: IndicatorKind,
    pub primary_period: usize,
    pub secondary_period: usize,
    pub primary_threshold: f64,
    pub secondary_threshold: f64,
    pub entry_condition: EntryCondition,
    pub exit_condition: ExitCondition,
    /// Carried for reporting; stops and targets come from the percentages.
    pub risk_reward_ratio: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_hold_bars: usize,
    /// Fraction of equity committed per trade.
    pub position_size_pct: f64,
    /// Composite score from the last evaluation, if any.
    pub fitness: Option<f64>,
}

impl StrategyGene {
    /// Sample every field uniformly from `domain`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, domain: &GeneDomain) -> Self {
        Self {
            primary_indicator: pick(rng, &IndicatorKind::ALL),
            secondary_indicator: pick(rng, &IndicatorKind::ALL),
            primary_period: domain.period(rng),
            secondary_period: domain.period(rng),
            primary_threshold: domain.threshold(rng),
            secondary_threshold: domain.threshold(rng),
            entry_condition: pick(rng, &EntryCondition::ALL),
            exit_condition: pick(rng, &ExitCondition::ALL),
            risk_reward_ratio: domain.risk_reward(rng),
            stop_loss_pct: domain.pct(rng),
            take_profit_pct: domain.pct(rng),
            max_hold_bars: domain.hold(rng),
            position_size_pct: domain.size(rng),
            fitness: None,
        }
    }

    /// Resample each field independently with probability `rate`.
    /// Clears the fitness when anything changed.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R, rate: f64, domain: &GeneDomain) {
        let before = self.clone();
        let rate = rate.clamp(0.0, 1.0);

        if rng.gen_bool(rate) {
            self.primary_indicator = pick(rng, &IndicatorKind::ALL);
        }
        if rng.gen_bool(rate) {
            self.secondary_indicator = pick(rng, &IndicatorKind::ALL);
        }
        if rng.gen_bool(rate) {
            self.primary_period = domain.period(rng);
        }
        if rng.gen_bool(rate) {
            self.secondary_period = domain.period(rng);
        }
        if rng.gen_bool(rate) {
            self.primary_threshold = domain.threshold(rng);
        }
        if rng.gen_bool(rate) {
            self.secondary_threshold = domain.threshold(rng);
        }
        if rng.gen_bool(rate) {
            self.entry_condition = pick(rng, &EntryCondition::ALL);
        }
        if rng.gen_bool(rate) {
            self.exit_condition = pick(rng, &ExitCondition::ALL);
        }
        if rng.gen_bool(rate) {
            self.risk_reward_ratio = domain.risk_reward(rng);
        }
        if rng.gen_bool(rate) {
            self.stop_loss_pct = domain.pct(rng);
        }
        if rng.gen_bool(rate) {
            self.take_profit_pct = domain.pct(rng);
        }
        if rng.gen_bool(rate) {
            self.max_hold_bars = domain.hold(rng);
        }
        if rng.gen_bool(rate) {
            self.position_size_pct = domain.size(rng);
        }

        let mut unscored = self.clone();
        unscored.fitness = before.fitness;
        if unscored != before {
            self.fitness = None;
        }
    }

    /// Uniform crossover: each field is swapped between the children with
    /// probability 0.5. Children carry no fitness.
    pub fn crossover<R: Rng + ?Sized>(&self, other: &Self, rng: &mut R) -> (Self, Self) {
        let mut a = self.clone();
        let mut b = other.clone();

        macro_rules! swap_fields {
            ($($field:ident),* $(,)?) => {
                $(
                    if rng.gen_bool(0.5) {
                        std::mem::swap(&mut a.$field, &mut b.$field);
                    }
                )*
            };
        }
        swap_fields!(
            primary_indicator,
            secondary_indicator,
            primary_period,
            secondary_period,
            primary_threshold,
            secondary_threshold,
            entry_condition,
            exit_condition,
            risk_reward_ratio,
            stop_loss_pct,
            take_profit_pct,
            max_hold_bars,
            position_size_pct,
        );

        a.fitness = None;
        b.fitness = None;
        (a, b)
    }

    /// Check every numeric field against `domain`.
    pub fn validate(&self, domain: &GeneDomain) -> Result<(), GeneError> {
        fn within(field: &'static str, v: f64, lo: f64, hi: f64) -> Result<(), GeneError> {
            if v.is_finite() && v >= lo && v <= hi {
                Ok(())
            } else {
                Err(GeneError::OutOfDomain { field, value: v })
            }
        }
        let (pmin, pmax) = (domain.period_min as f64, domain.period_max as f64);
        within("primary_period", self.primary_period as f64, pmin, pmax)?;
        within("secondary_period", self.secondary_period as f64, pmin, pmax)?;
        let (tmin, tmax) = (domain.threshold_min, domain.threshold_max);
        within("primary_threshold", self.primary_threshold, tmin, tmax)?;
        within("secondary_threshold", self.secondary_threshold, tmin, tmax)?;
        within(
            "risk_reward_ratio",
            self.risk_reward_ratio,
            domain.risk_reward_min,
            domain.risk_reward_max,
        )?;
        within("stop_loss_pct", self.stop_loss_pct, domain.pct_min, domain.pct_max)?;
        within("take_profit_pct", self.take_profit_pct, domain.pct_min, domain.pct_max)?;
        within(
            "max_hold_bars",
            self.max_hold_bars as f64,
            domain.hold_min as f64,
            domain.hold_max as f64,
        )?;
        within("position_size_pct", self.position_size_pct, domain.size_min, domain.size_max)?;
        Ok(())
    }

    /// Bars before the gene can emit an entry.
    pub fn warmup(&self) -> usize {
        self.primary_period.max(self.secondary_period)
    }

    /// Position management implied by the exit condition.
    pub fn exit_rule(&self) -> ExitRule {
        match self.exit_condition {
            ExitCondition::FixedRiskReward => ExitRule::Bracket,
            ExitCondition::TrailingStop => ExitRule::TrailingStop {
                pct: self.stop_loss_pct,
            },
            ExitCondition::TimeBased => ExitRule::TimeLimit {
                max_bars: self.max_hold_bars,
            },
            ExitCondition::IndicatorSignal => ExitRule::OnIndicator,
        }
    }

    /// Primary and secondary indicator series over `bars`.
    pub fn indicator_series(&self, bars: &[Bar]) -> (Vec<f64>, Vec<f64>) {
        (
            self.primary_indicator.series(bars, self.primary_period),
            self.secondary_indicator.series(bars, self.secondary_period),
        )
    }

    /// Entry condition at `index`, ignoring warmup.
    pub fn entry_at(&self, primary: &[f64], secondary: &[f64], index: usize) -> bool {
        let (Some(&p), Some(&s)) = (primary.get(index), secondary.get(index)) else {
            return false;
        };
        let (tp, ts) = (self.primary_threshold, self.secondary_threshold);
        match self.entry_condition {
            EntryCondition::CrossAbove => index >= 1 && p > tp && primary[index - 1] <= tp,
            EntryCondition::CrossBelow => index >= 1 && p < tp && primary[index - 1] >= tp,
            EntryCondition::Above => p > tp && s > ts,
            EntryCondition::Below => p < tp && s < ts,
        }
    }

    /// Indicator-driven exit at `index`: secondary below its threshold.
    pub fn exit_signal_at(&self, secondary: &[f64], index: usize) -> bool {
        self.exit_condition == ExitCondition::IndicatorSignal
            && secondary.get(index).is_some_and(|&s| s < self.secondary_threshold)
    }

    /// Stop and target for an entry at `close`.
    pub fn stop_and_target(&self, close: f64) -> (f64, f64) {
        (
            close * (1.0 - self.stop_loss_pct),
            close * (1.0 + self.take_profit_pct),
        )
    }
}

impl fmt::Display for StrategyGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}({}) {:?} {:.2} / {:?}({}) {:.2}, exit {:?}, sl {:.3} tp {:.3} hold {} size {:.2}",
            self.primary_indicator,
            self.primary_period,
            self.entry_condition,
            self.primary_threshold,
            self.secondary_indicator,
            self.secondary_period,
            self.secondary_threshold,
            self.exit_condition,
            self.stop_loss_pct,
            self.take_profit_pct,
            self.max_hold_bars,
            self.position_size_pct,
        )
    }
}

/// Fixed gene for tests: RSI(5) crossing above 30, SMA(5) secondary.
#[cfg(test)]
pub(crate) fn sample_gene() -> StrategyGene {
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
        fitness: None,
    }
}
