//! Bar: the fundamental market data unit.

use chrono::{DateTime, Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Seconds in one calendar day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// OHLCV bar for a single time interval.
///
/// `timestamp` is Unix seconds (UTC). Bars are owned by the caller and borrowed
/// by every component as `&[Bar]`; nothing in the engine copies a series wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Calendar time of the bar, or `None` when the timestamp is outside the
    /// representable calendar range (a malformed timestamp).
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        DateTime::from_timestamp(self.timestamp, 0).map(|dt| dt.naive_utc())
    }

    /// Calendar year of the bar, if the timestamp is well formed.
    pub fn year(&self) -> Option<i32> {
        self.datetime().map(|dt| dt.year())
    }

    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}

/// Calendar days between the first and last bar.
///
/// Returns 0 for fewer than two bars or when either endpoint carries a
/// malformed timestamp.
pub fn span_days(bars: &[Bar]) -> i64 {
    match (bars.first(), bars.last()) {
        (Some(first), Some(last)) if bars.len() >= 2 => {
            match (first.datetime(), last.datetime()) {
                (Some(a), Some(b)) => (b - a).num_days().max(0),
                _ => 0,
            }
        }
        _ => 0,
    }
}

/// Extract the close column.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}
