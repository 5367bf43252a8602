//! Domain types for StratLab

pub mod bar;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::{closes, span_days, Bar, SECONDS_PER_DAY};
pub use position::OpenPosition;
pub use signal::{ExitRule, Signal, SignalKind};
pub use trade::{ExitReason, TradeRecord};
