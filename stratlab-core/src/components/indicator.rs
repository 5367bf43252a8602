//! Indicator trait and the closed set of gene-selectable indicator kinds.
//!
//! Indicators are pure functions: bar history in, numeric series out.
//! They are precomputed once per bar series and queried by index afterwards.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::indicators::{Adx, Atr, Bollinger, Ema, Macd, Rsi, Sma, Stochastic};

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. Until `lookback()` bars are available the output holds
/// `insufficient_value()`, an explicit "not enough data" sentinel rather than
/// an error.
///
/// # Look-ahead contamination guard
/// No indicator value at bar t may depend on price data from bar t+1 or later.
/// Every indicator must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Index of the first bar with a real (non-sentinel) value.
    fn lookback(&self) -> usize;

    /// Sentinel emitted while data is insufficient.
    fn insufficient_value(&self) -> f64;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Indicator families a strategy gene can choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorKind {
    /// Moving average.
    Sma,
    /// Exponential average.
    Ema,
    /// Momentum oscillator.
    Rsi,
    /// MACD-like fast/slow EMA spread.
    Macd,
    /// Bollinger band position (%B).
    Bollinger,
    /// Volatility range.
    Atr,
    /// Stochastic %K.
    Stochastic,
    /// Trend strength.
    Adx,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 8] = [
        IndicatorKind::Sma,
        IndicatorKind::Ema,
        IndicatorKind::Rsi,
        IndicatorKind::Macd,
        IndicatorKind::Bollinger,
        IndicatorKind::Atr,
        IndicatorKind::Stochastic,
        IndicatorKind::Adx,
    ];

    /// Build a concrete indicator of this kind.
    pub fn build(self, period: usize) -> Box<dyn Indicator> {
        let period = period.max(1);
        match self {
            Self::Sma => Box::new(Sma::new(period)),
            Self::Ema => Box::new(Ema::new(period)),
            Self::Rsi => Box::new(Rsi::new(period)),
            Self::Macd => Box::new(Macd::new(period)),
            Self::Bollinger => Box::new(Bollinger::percent_b(period, 2.0)),
            Self::Atr => Box::new(Atr::new(period)),
            Self::Stochastic => Box::new(Stochastic::new(period)),
            Self::Adx => Box::new(Adx::new(period)),
        }
    }

    /// Compute this indicator's series over `bars`.
    pub fn series(self, bars: &[Bar], period: usize) -> Vec<f64> {
        self.build(period).compute(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn every_kind_builds_full_length_series() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let bars = make_bars(&closes);
        for kind in IndicatorKind::ALL {
            let series = kind.series(&bars, 10);
            assert_eq!(series.len(), bars.len(), "{kind:?}");
            assert!(series.iter().all(|v| v.is_finite()), "{kind:?} produced non-finite values");
        }
    }

    #[test]
    fn warmup_holds_sentinel() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        for kind in IndicatorKind::ALL {
            let ind = kind.build(20);
            let series = ind.compute(&bars);
            assert!(
                series.iter().all(|&v| v == ind.insufficient_value()),
                "{kind:?} did not hold its sentinel during warmup"
            );
        }
    }

    #[test]
    fn zero_period_is_clamped() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let series = IndicatorKind::Sma.series(&bars, 0);
        assert_eq!(series, vec![10.0, 11.0, 12.0]);
    }
}
