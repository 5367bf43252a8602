//! Dynamic-period signal: the fixed rule with periods scaled to the series.
//!
//! Periods are resolved from the calendar span of each new series, then the
//! evaluation is delegated to a `FixedRuleSignal`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::fixed_rule::FixedRuleSignal;
use super::rule::RuleParams;
use super::{SeriesKey, SignalGenerator};
use crate::accel::DualPathExecutor;
use crate::domain::{span_days, Bar, Signal};

/// Maps a series span in days to indicator periods:
/// `period = clamp(round(span_days * scale), min, max)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicPeriodRule {
    pub ma_days_scale: f64,
    pub ma_min: usize,
    pub ma_max: usize,
    pub osc_days_scale: f64,
    pub osc_min: usize,
    pub osc_max: usize,
}

impl Default for DynamicPeriodRule {
    fn default() -> Self {
        Self {
            ma_days_scale: 0.05,
            ma_min: 20,
            ma_max: 200,
            osc_days_scale: 0.014,
            osc_min: 7,
            osc_max: 50,
        }
    }
}

impl DynamicPeriodRule {
    /// `(ma_period, osc_period)` for a series spanning `days`.
    pub fn periods(&self, days: i64) -> (usize, usize) {
        (
            scale(days, self.ma_days_scale, self.ma_min, self.ma_max),
            scale(days, self.osc_days_scale, self.osc_min, self.osc_max),
        )
    }

    /// Warmup for a series whose span is not known yet: the larger upper bound.
    pub fn max_warmup(&self) -> usize {
        self.ma_max.max(self.ma_min).max(self.osc_max.max(self.osc_min))
    }
}

fn scale(days: i64, factor: f64, min: usize, max: usize) -> usize {
    let raw = (days.max(0) as f64 * factor).round();
    (raw as usize).clamp(min, max.max(min))
}

#[derive(Debug)]
pub struct DynamicPeriodSignal {
    rule: DynamicPeriodRule,
    base: RuleParams,
    inner: FixedRuleSignal,
    resolved_for: Option<SeriesKey>,
}

impl DynamicPeriodSignal {
    /// `base` supplies everything except the two periods.
    pub fn new(rule: DynamicPeriodRule, base: RuleParams) -> Self {
        Self::with_executor(rule, base, Arc::new(DualPathExecutor::auto()))
    }

    pub fn with_executor(
        rule: DynamicPeriodRule,
        base: RuleParams,
        executor: Arc<DualPathExecutor>,
    ) -> Self {
        Self {
            inner: FixedRuleSignal::with_executor(base.clone(), executor),
            rule,
            base,
            resolved_for: None,
        }
    }

    /// Parameters currently in effect (resolved for the last series seen).
    pub fn resolved_params(&self) -> &RuleParams {
        self.inner.params()
    }

    fn resolve(&mut self, bars: &[Bar]) {
        let key = SeriesKey::of(bars);
        if self.resolved_for == Some(key) {
            return;
        }
        let (ma_period, osc_period) = self.rule.periods(span_days(bars));
        self.inner.set_params(RuleParams {
            ma_period,
            osc_period,
            ..self.base.clone()
        });
        self.resolved_for = Some(key);
    }
}

impl SignalGenerator for DynamicPeriodSignal {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn warmup_bars(&self) -> usize {
        match self.resolved_for {
            Some(_) => self.inner.warmup_bars(),
            None => self.rule.max_warmup(),
        }
    }

    fn generate(&mut self, bars: &[Bar], index: usize) -> Signal {
        if index >= bars.len() {
            return Signal::none(index, "index out of range");
        }
        self.resolve(bars);
        self.inner.generate(bars, index)
    }
}
