//! Component traits and their concrete implementations.
//!
//! - Indicator: pure numeric series over bar history
//! - Signal generator: maps a bar index to "no action" or an entry with
//!   stop, target and exit rule

pub mod indicator;
pub mod signal;

pub use indicator::{Indicator, IndicatorKind};
pub use signal::{
    DynamicPeriodRule, DynamicPeriodSignal, EvolvedSignal, FixedRuleSignal, RuleParams,
    SeriesCache, SeriesKey, SignalBatch, SignalGenerator,
};
