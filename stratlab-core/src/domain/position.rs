//! Open position: transient simulator-owned state between an accepted entry
//! and its close event.

use serde::{Deserialize, Serialize};

use super::signal::ExitRule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub entry_bar: usize,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub entry_timestamp: i64,
    /// Calendar year of entry, `None` if the entry bar's timestamp was malformed.
    pub entry_year: Option<i32>,
    pub size: f64,
    pub exit: ExitRule,
    /// Highest close seen since entry (drives trailing stops).
    pub high_water_close: f64,
}

impl OpenPosition {
    pub fn bars_held(&self, bar_index: usize) -> usize {
        bar_index.saturating_sub(self.entry_bar)
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.size
    }

    /// Raise the trailing stop after a bar closes at `close`.
    ///
    /// Ratchet invariant: the stop may only tighten, never loosen.
    pub fn ratchet(&mut self, close: f64) {
        if close > self.high_water_close {
            self.high_water_close = close;
        }
        if let ExitRule::TrailingStop { pct } = self.exit {
            let candidate = self.high_water_close * (1.0 - pct);
            if candidate > self.stop_price {
                self.stop_price = candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(exit: ExitRule) -> OpenPosition {
        OpenPosition {
            entry_bar: 10,
            entry_price: 100.0,
            stop_price: 95.0,
            target_price: 120.0,
            entry_timestamp: 0,
            entry_year: Some(1970),
            size: 2.0,
            exit,
            high_water_close: 100.0,
        }
    }

    #[test]
    fn bars_held_counts_from_entry() {
        let p = position(ExitRule::Bracket);
        assert_eq!(p.bars_held(10), 0);
        assert_eq!(p.bars_held(13), 3);
    }

    #[test]
    fn unrealized_pnl_scales_with_size() {
        let p = position(ExitRule::Bracket);
        assert!((p.unrealized_pnl(103.0) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn trailing_stop_only_tightens() {
        let mut p = position(ExitRule::TrailingStop { pct: 0.02 });
        p.ratchet(110.0);
        assert!((p.stop_price - 107.8).abs() < 1e-9);
        p.ratchet(104.0);
        assert!((p.stop_price - 107.8).abs() < 1e-9);
    }

    #[test]
    fn bracket_stop_never_moves() {
        let mut p = position(ExitRule::Bracket);
        p.ratchet(150.0);
        assert_eq!(p.stop_price, 95.0);
        assert_eq!(p.high_water_close, 150.0);
    }
}
