//! Concrete indicator implementations.
//!
//! Two layers live here:
//! - the rule primitives used by the fixed-rule and dynamic-period signals
//!   (`sma_at`, `oscillator_at`, `gap_at` and their batch forms), and
//! - the gene-selectable family implementing the `Indicator` trait.
//!
//! Insufficient history never errors. Price-scaled indicators report `0.0`,
//! bounded oscillators report `50.0`.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod gap;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stochastic;

pub use adx::Adx;
pub use atr::Atr;
pub use bollinger::{Bollinger, BollingerBand};
pub use ema::Ema;
pub use gap::{gap_at, gap_series, is_gap, DEFAULT_GAP_THRESHOLD};
pub use macd::Macd;
pub use rsi::{oscillator_at, oscillator_series, Rsi, NEUTRAL_OSCILLATOR, OSCILLATOR_EPSILON};
pub use sma::{sma_at, sma_series, sma_series_into, Sma, MA_SENTINEL};
pub use stochastic::Stochastic;

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
/// Bars are one day apart starting 2024-01-02.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::{Bar, SECONDS_PER_DAY};
    const BASE_TS: i64 = 1_704_153_600; // 2024-01-02T00:00:00Z
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: BASE_TS + i as i64 * SECONDS_PER_DAY,
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Create bars from explicit (open, high, low, close) tuples.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<crate::domain::Bar> {
    use crate::domain::{Bar, SECONDS_PER_DAY};
    const BASE_TS: i64 = 1_704_153_600;
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            timestamp: BASE_TS + i as i64 * SECONDS_PER_DAY,
            open,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
