//! Simple Moving Average (SMA).
//!
//! Rolling mean of close prices over a trailing window.
//! Lookback: period - 1 (first real value at index period-1).
//! Sentinel: `MA_SENTINEL` (0.0) while fewer than `period` closes exist.

use crate::components::indicator::Indicator;
use crate::domain::Bar;

/// Value reported while a moving average has too little history.
pub const MA_SENTINEL: f64 = 0.0;

/// Mean close over the `period` bars ending at `index`.
///
/// Returns `MA_SENTINEL` when `index + 1 < period`, when `period == 0`, or
/// when `index` is beyond the series.
pub fn sma_at(bars: &[Bar], index: usize, period: usize) -> f64 {
    if period == 0 || index >= bars.len() || index + 1 < period {
        return MA_SENTINEL;
    }
    let sum: f64 = bars[index + 1 - period..=index].iter().map(|b| b.close).sum();
    sum / period as f64
}

/// Same statistic as `sma_at` over a raw close slice, recomputed from the
/// window. Used by per-lane kernels that cannot share a running sum.
pub(crate) fn window_mean(closes: &[f64], index: usize, period: usize) -> f64 {
    if period == 0 || index >= closes.len() || index + 1 < period {
        return MA_SENTINEL;
    }
    closes[index + 1 - period..=index].iter().sum::<f64>() / period as f64
}

/// Moving average for every index, O(1) per step via a running sum.
pub fn sma_series(closes: &[f64], period: usize) -> Vec<f64> {
    let mut result = Vec::with_capacity(closes.len());
    sma_series_into(closes, period, &mut result);
    result
}

/// `sma_series` writing into a caller-owned buffer, which is cleared first.
pub fn sma_series_into(closes: &[f64], period: usize, out: &mut Vec<f64>) {
    let n = closes.len();
    out.clear();
    out.resize(n, MA_SENTINEL);
    if period == 0 || n < period {
        return;
    }

    let mut sum: f64 = closes[..period].iter().sum();
    out[period - 1] = sum / period as f64;

    for i in period..n {
        sum += closes[i] - closes[i - period];
        out[i] = sum / period as f64;
    }
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn insufficient_value(&self) -> f64 {
        MA_SENTINEL
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        sma_series(&closes, self.period)
    }
}
