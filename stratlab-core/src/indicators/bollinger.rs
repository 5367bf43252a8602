//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! One band per indicator instance:
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//! - PercentB: 100 * (close - lower) / (upper - lower), 50 for a zero-width band
//!
//! Uses population stddev (divide by N).
//! Lookback: period - 1. Sentinel: 0.0 for the bands, 50.0 for %B.

use crate::components::indicator::Indicator;
use crate::domain::Bar;
use crate::indicators::rsi::NEUTRAL_OSCILLATOR;
use crate::indicators::sma::MA_SENTINEL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
    PercentB,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(band: BollingerBand, period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        let tag = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
            BollingerBand::PercentB => "pctb",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{tag}_{period}_{multiplier}"),
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::Upper, period, multiplier)
    }

    pub fn middle(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::Middle, period, multiplier)
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::Lower, period, multiplier)
    }

    pub fn percent_b(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::PercentB, period, multiplier)
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn insufficient_value(&self) -> f64 {
        match self.band {
            BollingerBand::PercentB => NEUTRAL_OSCILLATOR,
            _ => MA_SENTINEL,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![self.insufficient_value(); n];
        if n < self.period {
            return result;
        }

        for i in (self.period - 1)..n {
            let window = &bars[i + 1 - self.period..=i];
            let mean = window.iter().map(|b| b.close).sum::<f64>() / self.period as f64;
            let variance = window
                .iter()
                .map(|b| {
                    let diff = b.close - mean;
                    diff * diff
                })
                .sum::<f64>()
                / self.period as f64;
            let width = self.multiplier * variance.sqrt();

            result[i] = match self.band {
                BollingerBand::Middle => mean,
                BollingerBand::Upper => mean + width,
                BollingerBand::Lower => mean - width,
                BollingerBand::PercentB => {
                    if width == 0.0 {
                        NEUTRAL_OSCILLATOR
                    } else {
                        100.0 * (bars[i].close - (mean - width)) / (2.0 * width)
                    }
                }
            };
        }
        result
    }
}
