//! MACD line: fast EMA minus slow EMA.
//!
//! The classic 12/26 pairing is kept as a ratio: the period argument is the
//! fast leg and the slow leg is `round(fast * 26 / 12)`, at least fast + 1.
//! Lookback: slow - 1. Sentinel: 0.0.

use crate::components::indicator::Indicator;
use crate::domain::Bar;
use crate::indicators::ema::ema_of_series;
use crate::indicators::sma::MA_SENTINEL;

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    name: String,
}

impl Macd {
    pub fn new(fast: usize) -> Self {
        assert!(fast >= 1, "MACD fast period must be >= 1");
        let slow = ((fast as f64 * 26.0 / 12.0).round() as usize).max(fast + 1);
        Self::with_periods(fast, slow)
    }

    pub fn with_periods(fast: usize, slow: usize) -> Self {
        assert!(fast >= 1 && slow > fast, "MACD requires 1 <= fast < slow");
        Self {
            fast,
            slow,
            name: format!("macd_{fast}_{slow}"),
        }
    }

    pub fn slow_period(&self) -> usize {
        self.slow
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.slow - 1
    }

    fn insufficient_value(&self) -> f64 {
        MA_SENTINEL
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let fast = ema_of_series(&closes, self.fast);
        let slow = ema_of_series(&closes, self.slow);
        let lookback = self.lookback();
        fast.iter()
            .zip(&slow)
            .enumerate()
            .map(|(i, (f, s))| if i < lookback { MA_SENTINEL } else { f - s })
            .collect()
    }
}
