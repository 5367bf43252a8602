//! Fixed-rule signal: trend filter + oversold oscillator + gap.
//!
//! The whole series is evaluated once through the dual-path executor and
//! cached; each `generate` call is a lookup.

use std::sync::Arc;

use super::rule::{RuleParams, SignalBatch};
use super::{SeriesCache, SignalGenerator};
use crate::accel::{ComputeReport, DualPathExecutor};
use crate::domain::{Bar, Signal};

#[derive(Debug)]
pub struct FixedRuleSignal {
    params: RuleParams,
    executor: Arc<DualPathExecutor>,
    cache: SeriesCache<SignalBatch>,
    last_report: Option<ComputeReport>,
    name: String,
}

impl FixedRuleSignal {
    pub fn new(params: RuleParams) -> Self {
        Self::with_executor(params, Arc::new(DualPathExecutor::auto()))
    }

    pub fn with_executor(params: RuleParams, executor: Arc<DualPathExecutor>) -> Self {
        let name = format!("fixed_rule_{}_{}", params.ma_period, params.osc_period);
        Self {
            params,
            executor,
            cache: SeriesCache::new(),
            last_report: None,
            name,
        }
    }

    pub fn params(&self) -> &RuleParams {
        &self.params
    }

    /// Replace the parameters and drop the memo.
    pub fn set_params(&mut self, params: RuleParams) {
        self.name = format!("fixed_rule_{}_{}", params.ma_period, params.osc_period);
        self.params = params;
        if let Some(old) = self.cache.invalidate() {
            self.executor.recycle(old);
        }
    }

    /// Report of the most recent batch computation.
    pub fn last_report(&self) -> Option<ComputeReport> {
        self.last_report
    }

    fn batch(&mut self, bars: &[Bar]) -> &SignalBatch {
        let executor = &self.executor;
        let params = &self.params;
        let report = &mut self.last_report;
        self.cache.get_or_compute(
            bars,
            || {
                let (batch, r) = executor.compute(bars, params);
                *report = Some(r);
                batch
            },
            |old| executor.recycle(old),
        )
    }
}

impl SignalGenerator for FixedRuleSignal {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_bars(&self) -> usize {
        self.params.warmup()
    }

    fn generate(&mut self, bars: &[Bar], index: usize) -> Signal {
        if index >= bars.len() {
            return Signal::none(index, "index out of range");
        }
        if index < self.params.warmup() {
            return Signal::none(index, "warmup");
        }

        let batch = self.batch(bars);
        if !batch.entry[index] {
            return Signal::none(index, "no setup");
        }
        let (ma, osc) = (batch.ma[index], batch.osc[index]);

        let close = bars[index].close;
        let (stop, target) = self.params.stop_and_target(close);
        Signal::buy(
            index,
            stop,
            target,
            format!("close {close:.2} > ma {ma:.2}, osc {osc:.1} oversold, gap"),
        )
    }
}

impl Drop for FixedRuleSignal {
    fn drop(&mut self) {
        if let Some(batch) = self.cache.invalidate() {
            self.executor.recycle(batch);
        }
    }
}
