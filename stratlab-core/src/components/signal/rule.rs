//! The fixed entry rule and its batch evaluation.
//!
//! Buy iff close > MA, oscillator < oversold, and the bar gaps. The batch form
//! evaluates the rule at every index into a `SignalBatch`; the CPU path here
//! and the lane kernel in `accel` must agree on every value.

use serde::{Deserialize, Serialize};

use crate::indicators::gap::is_gap;
use crate::indicators::rsi::oscillator_window;
use crate::indicators::sma::{sma_series_into, MA_SENTINEL};
use crate::indicators::{DEFAULT_GAP_THRESHOLD, NEUTRAL_OSCILLATOR};

/// Parameters of the fixed rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleParams {
    pub ma_period: usize,
    pub osc_period: usize,
    /// Oscillator level below which the market counts as oversold.
    pub oversold: f64,
    pub risk_reward: f64,
    /// Stop distance before scaling by `risk_reward`.
    pub base_stop_pct: f64,
    pub gap_threshold: f64,
}

impl Default for RuleParams {
    fn default() -> Self {
        Self {
            ma_period: 50,
            osc_period: 14,
            oversold: 30.0,
            risk_reward: 3.0,
            base_stop_pct: 0.005,
            gap_threshold: DEFAULT_GAP_THRESHOLD,
        }
    }
}

impl RuleParams {
    /// First index at which the rule may fire.
    pub fn warmup(&self) -> usize {
        self.ma_period.max(self.osc_period)
    }

    /// Stop and target for an entry at `entry`.
    ///
    /// stop = entry * (1 - base_stop_pct / risk_reward)
    /// target = entry + (entry - stop) * risk_reward
    pub fn stop_and_target(&self, entry: f64) -> (f64, f64) {
        let stop = entry * (1.0 - self.base_stop_pct / self.risk_reward);
        let target = entry + (entry - stop) * self.risk_reward;
        (stop, target)
    }

    #[inline]
    pub fn fires(&self, close: f64, ma: f64, osc: f64, gap: bool) -> bool {
        close > ma && osc < self.oversold && gap
    }
}

/// Column view of a bar series, as staged for either compute path.
#[derive(Debug, Clone, Copy)]
pub struct SeriesInput<'a> {
    pub close: &'a [f64],
    pub high: &'a [f64],
    pub low: &'a [f64],
}

impl SeriesInput<'_> {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }
}

/// Per-index rule evaluation: indicator values and the entry flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalBatch {
    pub ma: Vec<f64>,
    pub osc: Vec<f64>,
    pub gap: Vec<bool>,
    pub entry: Vec<bool>,
}

impl SignalBatch {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            ma: Vec::with_capacity(n),
            osc: Vec::with_capacity(n),
            gap: Vec::with_capacity(n),
            entry: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.entry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }

    /// Number of indices where the rule fires.
    pub fn signal_count(&self) -> usize {
        self.entry.iter().filter(|&&e| e).count()
    }

    /// Size every column to `n`, filled with sentinels. Capacity is kept.
    pub fn reset(&mut self, n: usize) {
        self.ma.clear();
        self.ma.resize(n, MA_SENTINEL);
        self.osc.clear();
        self.osc.resize(n, NEUTRAL_OSCILLATOR);
        self.gap.clear();
        self.gap.resize(n, false);
        self.entry.clear();
        self.entry.resize(n, false);
    }
}

/// Gap at `index` over column input.
#[inline]
pub(crate) fn gap_in(input: &SeriesInput<'_>, index: usize, threshold: f64) -> bool {
    index >= 1
        && is_gap(
            input.high[index - 1],
            input.low[index - 1],
            input.high[index],
            input.low[index],
            threshold,
        )
}

#[inline]
pub(crate) fn osc_in(input: &SeriesInput<'_>, index: usize, period: usize) -> f64 {
    oscillator_window(input.close, index, period, |c| *c)
}

/// Scalar-reference batch evaluation into `out`.
pub fn compute_cpu(input: &SeriesInput<'_>, params: &RuleParams, out: &mut SignalBatch) {
    let n = input.len();
    out.reset(n);
    sma_series_into(input.close, params.ma_period, &mut out.ma);

    let warmup = params.warmup();
    for i in 0..n {
        out.osc[i] = osc_in(input, i, params.osc_period);
        out.gap[i] = gap_in(input, i, params.gap_threshold);
        out.entry[i] =
            i >= warmup && params.fires(input.close[i], out.ma[i], out.osc[i], out.gap[i]);
    }
}

/// Five bars on which the rule with `firing_params()` fires at index 3 only.
#[cfg(test)]
pub(crate) fn firing_series() -> Vec<crate::domain::Bar> {
    crate::indicators::make_ohlc_bars(&[
        (100.0, 101.0, 99.0, 100.0),
        (99.0, 100.0, 89.0, 90.0),
        (80.5, 81.0, 79.0, 80.0),
        (85.0, 88.0, 82.0, 87.0),
        (87.0, 87.5, 86.0, 86.5),
    ])
}

#[cfg(test)]
pub(crate) fn firing_params() -> RuleParams {
    RuleParams {
        ma_period: 3,
        osc_period: 3,
        ..RuleParams::default()
    }
}
