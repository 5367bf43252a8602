//! Momentum oscillator (RSI-style).
//!
//! Sums gains and losses over the trailing `period` close-to-close changes:
//! RSI = 100 - 100 / (1 + gain / loss)
//! Lookback: period (needs period changes, i.e. period+1 closes).
//! Edge cases: no movement at all → 50; loss == 0 → loss floored to
//! `OSCILLATOR_EPSILON`, so a pure-gain window saturates just below 100.

use crate::components::indicator::Indicator;
use crate::domain::Bar;

/// Neutral reading, also the insufficient-data sentinel.
pub const NEUTRAL_OSCILLATOR: f64 = 50.0;

/// Floor applied to the loss sum before dividing.
pub const OSCILLATOR_EPSILON: f64 = 1e-10;

/// Oscillator at `index` using only bars `0..=index`.
pub fn oscillator_at(bars: &[Bar], index: usize, period: usize) -> f64 {
    if index >= bars.len() {
        return NEUTRAL_OSCILLATOR;
    }
    oscillator_window(bars, index, period, |b| b.close)
}

/// Oscillator for every index of a close series. Per-index, same logic as
/// `oscillator_at`.
pub fn oscillator_series(closes: &[f64], period: usize) -> Vec<f64> {
    (0..closes.len())
        .map(|i| oscillator_window(closes, i, period, |c| *c))
        .collect()
}

/// Shared window evaluation over any indexable price source.
pub(crate) fn oscillator_window<T>(
    series: &[T],
    index: usize,
    period: usize,
    price: impl Fn(&T) -> f64,
) -> f64 {
    if period == 0 || index < period || index >= series.len() {
        return NEUTRAL_OSCILLATOR;
    }

    let mut gain = 0.0;
    let mut loss = 0.0;
    for i in (index + 1 - period)..=index {
        let change = price(&series[i]) - price(&series[i - 1]);
        if change > 0.0 {
            gain += change;
        } else {
            loss -= change;
        }
    }

    if gain + loss == 0.0 {
        return NEUTRAL_OSCILLATOR;
    }
    let rs = gain / loss.max(OSCILLATOR_EPSILON);
    100.0 - 100.0 / (1.0 + rs)
}

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn insufficient_value(&self) -> f64 {
        NEUTRAL_OSCILLATOR
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        (0..bars.len())
            .map(|i| oscillator_at(bars, i, self.period))
            .collect()
    }
}
