//! ADX: Average Directional Index (Wilder).
//!
//! Steps:
//! 1. Compute +DM and -DM from consecutive bars
//! 2. Smooth +DM, -DM, and TR using Wilder smoothing (alpha = 1/period)
//! 3. +DI = 100 * smoothed(+DM) / smoothed(TR)
//! 4. -DI = 100 * smoothed(-DM) / smoothed(TR)
//! 5. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 6. ADX = Wilder-smoothed DX
//!
//! Lookback: 2 * period - 1. Sentinel: 0.0 (no measured trend).

use crate::components::indicator::Indicator;
use crate::domain::Bar;
use crate::indicators::atr::{true_range, wilder_smooth};

const NO_TREND: f64 = 0.0;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: format!("adx_{period}"),
        }
    }
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period - 1
    }

    fn insufficient_value(&self) -> f64 {
        NO_TREND
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let p = self.period;
        if n < 2 {
            return vec![NO_TREND; n];
        }

        let mut plus_dm = vec![0.0; n];
        let mut minus_dm = vec![0.0; n];
        for i in 1..n {
            let up = bars[i].high - bars[i - 1].high;
            let down = bars[i - 1].low - bars[i].low;
            if up > down && up > 0.0 {
                plus_dm[i] = up;
            }
            if down > up && down > 0.0 {
                minus_dm[i] = down;
            }
        }

        // All three smoothed series become valid at index `p`.
        let tr = true_range(bars);
        let smooth_tr = wilder_smooth(&tr, 1, p, 0.0);
        let smooth_plus = wilder_smooth(&plus_dm, 1, p, 0.0);
        let smooth_minus = wilder_smooth(&minus_dm, 1, p, 0.0);

        let mut dx = vec![0.0; n];
        for i in p..n {
            if smooth_tr[i] == 0.0 {
                continue;
            }
            let plus_di = 100.0 * smooth_plus[i] / smooth_tr[i];
            let minus_di = 100.0 * smooth_minus[i] / smooth_tr[i];
            let di_sum = plus_di + minus_di;
            if di_sum > 0.0 {
                dx[i] = 100.0 * (plus_di - minus_di).abs() / di_sum;
            }
        }

        wilder_smooth(&dx, p, p, NO_TREND)
    }
}
