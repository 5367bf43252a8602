//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (alpha = 1/period) seeded from TR[1..=period].
//! Lookback: period. Sentinel: 0.0.

use crate::components::indicator::Indicator;
use crate::domain::Bar;
use crate::indicators::sma::MA_SENTINEL;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// True Range series.
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let range = bar.high - bar.low;
            if i == 0 {
                return range;
            }
            let pc = bars[i - 1].close;
            range.max((bar.high - pc).abs()).max((bar.low - pc).abs())
        })
        .collect()
}

/// Wilder smoothing of `values[start..]`.
///
/// The seed is the mean of `values[start..start + period]`, placed at
/// `start + period - 1`; every earlier slot holds `fill`.
pub fn wilder_smooth(values: &[f64], start: usize, period: usize, fill: f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![fill; n];
    if period == 0 || start + period > n {
        return result;
    }

    let seed_end = start + period;
    let mut prev = values[start..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = prev;

    let alpha = 1.0 / period as f64;
    for i in seed_end..n {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn insufficient_value(&self) -> f64 {
        MA_SENTINEL
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        // TR[0] is not a proper true range; seed from TR[1].
        wilder_smooth(&true_range(bars), 1, self.period, MA_SENTINEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars, DEFAULT_EPSILON};

    #[test]
    fn true_range_basic() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 10
            (102.0, 108.0, 100.0, 106.0), // TR = max(8, 6, 2) = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = max(9, 1, 8) = 9
        ]);
        let tr = true_range(&bars);
        assert_approx(tr[0], 10.0, DEFAULT_EPSILON);
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bars = make_ohlc_bars(&[
            (98.0, 102.0, 97.0, 100.0),
            (110.0, 115.0, 108.0, 112.0), // TR = max(7, 15, 8) = 15
        ]);
        assert_approx(true_range(&bars)[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_period_2() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 10 (ignored)
            (102.0, 108.0, 100.0, 106.0), // TR = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = 9
            (99.0, 103.0, 97.0, 101.0),   // TR = max(6, 4, 2) = 6
        ]);
        let atr = Atr::new(2).compute(&bars);
        assert_eq!(atr[0], MA_SENTINEL);
        assert_eq!(atr[1], MA_SENTINEL);
        assert_approx(atr[2], 8.5, DEFAULT_EPSILON);
        assert_approx(atr[3], 0.5 * 6.0 + 0.5 * 8.5, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_smooth_short_input() {
        let out = wilder_smooth(&[1.0, 2.0], 1, 3, -1.0);
        assert_eq!(out, vec![-1.0, -1.0]);
    }
}
