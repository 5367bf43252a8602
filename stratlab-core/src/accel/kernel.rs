//! Data-parallel lane kernel.
//!
//! One lane per bar index. Each lane recomputes its moving-average window,
//! its oscillator window and its gap from the staged columns, then applies
//! the entry rule. Lanes share no mutable state.

use rayon::prelude::*;

use super::AcceleratedBackend;
use crate::components::signal::rule::{gap_in, osc_in, RuleParams, SeriesInput, SignalBatch};
use crate::indicators::sma::window_mean;

#[derive(Debug, Clone, Copy, Default)]
pub struct LaneKernel;

impl LaneKernel {
    pub fn new() -> Self {
        Self
    }
}

impl AcceleratedBackend for LaneKernel {
    fn name(&self) -> &str {
        "rayon_lanes"
    }

    fn is_available(&self) -> bool {
        rayon::current_num_threads() > 0
    }

    fn compute(&self, input: &SeriesInput<'_>, params: &RuleParams, out: &mut SignalBatch) {
        out.reset(input.len());
        let warmup = params.warmup();

        (
            out.ma.par_iter_mut(),
            out.osc.par_iter_mut(),
            out.gap.par_iter_mut(),
            out.entry.par_iter_mut(),
        )
            .into_par_iter()
            .enumerate()
            .for_each(|(i, (ma, osc, gap, entry))| {
                *ma = window_mean(input.close, i, params.ma_period);
                *osc = osc_in(input, i, params.osc_period);
                *gap = gap_in(input, i, params.gap_threshold);
                *entry = i >= warmup && params.fires(input.close[i], *ma, *osc, *gap);
            });
    }
}
