//! Signal: a generator's verdict at one bar.
//!
//! A signal is either "no action" or an entry carrying its protective stop,
//! its profit target and the exit rule that manages the position afterwards.
//! Signals are consumed exactly once by the simulator that requested them.

use serde::{Deserialize, Serialize};

/// What the generator wants to do at a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    None,
    Buy,
    Sell,
}

/// How an open position is managed besides its stop and target.
///
/// Stop and target touches are always checked first; the rule only adds
/// further ways for a position to close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExitRule {
    /// Stop and target only.
    Bracket,
    /// Stop ratchets up to `high_water_close * (1 - pct)` and never loosens.
    TrailingStop { pct: f64 },
    /// Close at the bar's close once the position has been held `max_bars` bars.
    TimeLimit { max_bars: usize },
    /// Close at the bar's close when the generator reports an exit condition.
    OnIndicator,
}

impl Default for ExitRule {
    fn default() -> Self {
        Self::Bracket
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub bar_index: usize,
    pub stop_price: f64,
    pub target_price: f64,
    /// Short human-readable reason, for logging and analysis.
    pub rationale: String,
    pub exit: ExitRule,
}

impl Signal {
    pub fn none(bar_index: usize, rationale: impl Into<String>) -> Self {
        Self {
            kind: SignalKind::None,
            bar_index,
            stop_price: 0.0,
            target_price: 0.0,
            rationale: rationale.into(),
            exit: ExitRule::Bracket,
        }
    }

    pub fn buy(
        bar_index: usize,
        stop_price: f64,
        target_price: f64,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            kind: SignalKind::Buy,
            bar_index,
            stop_price,
            target_price,
            rationale: rationale.into(),
            exit: ExitRule::Bracket,
        }
    }

    pub fn with_exit(mut self, exit: ExitRule) -> Self {
        self.exit = exit;
        self
    }

    pub fn is_entry(&self) -> bool {
        !matches!(self.kind, SignalKind::None)
    }

    /// True when stop and target bracket `entry` consistently with the
    /// signal's direction: `stop < entry < target` for a buy,
    /// `target < entry < stop` for a sell.
    pub fn brackets(&self, entry: f64) -> bool {
        match self.kind {
            SignalKind::Buy => self.stop_price < entry && entry < self.target_price,
            SignalKind::Sell => self.target_price < entry && entry < self.stop_price,
            SignalKind::None => false,
        }
    }
}
