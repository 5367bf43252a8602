//! Gap detector.
//!
//! A bar gaps up when its low clears the previous high by more than the
//! threshold fraction, and gaps down when its high sits below the previous
//! low by more than the threshold fraction. The first bar never gaps.

use crate::domain::Bar;

pub const DEFAULT_GAP_THRESHOLD: f64 = 0.01;

/// Gap test on raw high/low pairs.
#[inline]
pub fn is_gap(prev_high: f64, prev_low: f64, high: f64, low: f64, threshold: f64) -> bool {
    let gap_up = low > prev_high * (1.0 + threshold);
    let gap_down = high < prev_low * (1.0 - threshold);
    gap_up || gap_down
}

/// Gap at `index`; `false` for the first bar or an index beyond the series.
pub fn gap_at(bars: &[Bar], index: usize, threshold: f64) -> bool {
    if index < 1 || index >= bars.len() {
        return false;
    }
    let prev = &bars[index - 1];
    let cur = &bars[index];
    is_gap(prev.high, prev.low, cur.high, cur.low, threshold)
}

pub fn gap_series(bars: &[Bar], threshold: f64) -> Vec<bool> {
    (0..bars.len()).map(|i| gap_at(bars, i, threshold)).collect()
}
