//! Backtesting engine: single-position, bar-by-bar simulation.
//!
//! Per bar:
//! 1. If a position is open: stop, then target, then the exit rule
//! 2. If flat and nothing closed this bar: ask the generator for a signal
//! 3. Append the realized equity
//!
//! A position still open after the last bar is closed at the last close.

pub mod simulator;

pub use simulator::{RunResult, Simulator, SimulatorConfig};
