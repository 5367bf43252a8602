//! Signal generation.
//!
//! A generator is asked for a verdict at one bar index at a time. Indicator
//! arrays are computed once per bar series and memoized; every later query
//! against the same series is answered from the memo.

pub mod dynamic_period;
pub mod evolved;
pub mod fixed_rule;
pub mod rule;

pub use dynamic_period::{DynamicPeriodRule, DynamicPeriodSignal};
pub use evolved::EvolvedSignal;
pub use fixed_rule::FixedRuleSignal;
pub use rule::{RuleParams, SeriesInput, SignalBatch};

use crate::domain::{Bar, Signal};

/// Trait for signal generators.
///
/// Generators see only bar history, never simulator state, and must only use
/// `bars[0..=index]` when deciding. `&mut self` exists for the memo.
pub trait SignalGenerator: Send {
    /// Human-readable name (e.g., "fixed_rule_50_14").
    fn name(&self) -> &str;

    /// Number of bars before the generator can emit an entry.
    fn warmup_bars(&self) -> usize;

    /// Verdict at `index`. An index outside the series yields no signal.
    fn generate(&mut self, bars: &[Bar], index: usize) -> Signal;

    /// Whether an indicator-driven exit fires at `index`.
    fn exit_triggered(&mut self, _bars: &[Bar], _index: usize) -> bool {
        false
    }
}

/// Identity of a bar series for memoization: length plus endpoint timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub len: usize,
    pub first_ts: i64,
    pub last_ts: i64,
}

impl SeriesKey {
    pub fn of(bars: &[Bar]) -> Self {
        Self {
            len: bars.len(),
            first_ts: bars.first().map_or(0, |b| b.timestamp),
            last_ts: bars.last().map_or(0, |b| b.timestamp),
        }
    }
}

/// Single-slot memo keyed by `SeriesKey`.
#[derive(Debug, Clone)]
pub struct SeriesCache<T> {
    slot: Option<(SeriesKey, T)>,
}

impl<T> Default for SeriesCache<T> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<T> SeriesCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cached(&self, bars: &[Bar]) -> bool {
        matches!(&self.slot, Some((key, _)) if *key == SeriesKey::of(bars))
    }

    /// Cached value for `bars`, computing it on a miss. Whatever was cached
    /// for a different series is handed to `evict` first.
    pub fn get_or_compute(
        &mut self,
        bars: &[Bar],
        compute: impl FnOnce() -> T,
        evict: impl FnOnce(T),
    ) -> &T {
        let key = SeriesKey::of(bars);
        if !matches!(&self.slot, Some((k, _)) if *k == key) {
            if let Some((_, old)) = self.slot.take() {
                evict(old);
            }
        }
        &self.slot.get_or_insert_with(|| (key, compute())).1
    }

    /// Drop the memo (e.g. after a parameter change).
    pub fn invalidate(&mut self) -> Option<T> {
        self.slot.take().map(|(_, v)| v)
    }
}
