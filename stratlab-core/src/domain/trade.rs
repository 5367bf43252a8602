//! TradeRecord: a completed round-trip trade.

use serde::{Deserialize, Serialize};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TimeLimit,
    IndicatorExit,
    EndOfData,
}

/// A complete round-trip trade record: entry → exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    // ── Entry ──
    pub entry_bar: usize,
    pub entry_timestamp: i64,
    pub entry_price: f64,
    pub entry_year: Option<i32>,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── Size & PnL ──
    pub size: f64,
    pub pnl: f64,
}

impl TradeRecord {
    /// Return on the trade as a fraction of entry price.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        (self.exit_price - self.entry_price) / self.entry_price
    }

    pub fn bars_held(&self) -> usize {
        self.exit_bar.saturating_sub(self.entry_bar)
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}
