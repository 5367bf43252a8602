//! Stochastic %K.
//!
//! %K = 100 * (close - lowest_low) / (highest_high - lowest_low) over the
//! trailing `period` bars. A zero range reads 50.
//! Lookback: period - 1. Sentinel: 50.0.

use crate::components::indicator::Indicator;
use crate::domain::Bar;
use crate::indicators::rsi::NEUTRAL_OSCILLATOR;

#[derive(Debug, Clone)]
pub struct Stochastic {
    period: usize,
    name: String,
}

impl Stochastic {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Stochastic period must be >= 1");
        Self {
            period,
            name: format!("stoch_k_{period}"),
        }
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn insufficient_value(&self) -> f64 {
        NEUTRAL_OSCILLATOR
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![NEUTRAL_OSCILLATOR; n];
        if n < self.period {
            return result;
        }

        for i in (self.period - 1)..n {
            let window = &bars[i + 1 - self.period..=i];
            let hh = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            let ll = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            let range = hh - ll;
            if range > 0.0 {
                result[i] = 100.0 * (bars[i].close - ll) / range;
            }
        }
        result
    }
}
