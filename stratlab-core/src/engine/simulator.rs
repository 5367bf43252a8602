use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::signal::SignalGenerator;
use crate::domain::{Bar, ExitReason, ExitRule, OpenPosition, SignalKind, TradeRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub initial_equity: f64,
    /// Units bought per entry.
    pub position_size: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_equity: 1000.0,
            position_size: 1.0,
        }
    }
}

/// Output of a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Realized equity after each bar; one entry per bar.
    pub equity_curve: Vec<f64>,
    pub trades: Vec<TradeRecord>,
    /// Realized P&L by entry year.
    pub yearly_pnl: BTreeMap<i32, f64>,
    pub initial_equity: f64,
    pub final_equity: f64,
    /// Never exceeds 1.
    pub max_open_positions: usize,
    /// Entry signals emitted by the generator (accepted or not).
    pub signals_seen: usize,
    pub start_timestamp: Option<i64>,
    pub end_timestamp: Option<i64>,
}

impl RunResult {
    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }
}

/// Single-position backtester. Each `run` owns fresh state.
#[derive(Debug, Clone, Default)]
pub struct Simulator {
    config: SimulatorConfig,
}

struct RunState {
    equity: f64,
    position: Option<OpenPosition>,
    trades: Vec<TradeRecord>,
    yearly_pnl: BTreeMap<i32, f64>,
    max_open: usize,
}

impl RunState {
    fn close(&mut self, pos: OpenPosition, bar_index: usize, price: f64, reason: ExitReason) {
        let pnl = (price - pos.entry_price) * pos.size;
        self.equity += pnl;
        match pos.entry_year {
            Some(year) => *self.yearly_pnl.entry(year).or_insert(0.0) += pnl,
            None => debug!(
                entry_bar = pos.entry_bar,
                ts = pos.entry_timestamp,
                "malformed entry timestamp; skipping year attribution"
            ),
        }
        self.trades.push(TradeRecord {
            entry_bar: pos.entry_bar,
            entry_timestamp: pos.entry_timestamp,
            entry_price: pos.entry_price,
            entry_year: pos.entry_year,
            exit_bar: bar_index,
            exit_price: price,
            exit_reason: reason,
            size: pos.size,
            pnl,
        });
    }
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn run(&self, bars: &[Bar], generator: &mut dyn SignalGenerator) -> RunResult {
        let mut state = RunState {
            equity: self.config.initial_equity,
            position: None,
            trades: Vec::new(),
            yearly_pnl: BTreeMap::new(),
            max_open: 0,
        };
        let mut equity_curve = Vec::with_capacity(bars.len());
        let mut signals_seen = 0;

        for (i, bar) in bars.iter().enumerate() {
            let mut closed_this_bar = false;

            if let Some(mut pos) = state.position.take() {
                match exit_for(&pos, bar, bars, i, generator) {
                    Some((price, reason)) => {
                        state.close(pos, i, price, reason);
                        closed_this_bar = true;
                    }
                    None => {
                        pos.ratchet(bar.close);
                        state.position = Some(pos);
                    }
                }
            }

            if state.position.is_none() && !closed_this_bar {
                let signal = generator.generate(bars, i);
                if signal.is_entry() {
                    signals_seen += 1;
                }
                if signal.bar_index != i {
                    debug!(
                        bar = i,
                        signal_bar = signal.bar_index,
                        "signal index mismatch; ignored"
                    );
                } else {
                    match signal.kind {
                        SignalKind::Buy if signal.brackets(bar.close) => {
                            state.position = Some(OpenPosition {
                                entry_bar: i,
                                entry_price: bar.close,
                                stop_price: signal.stop_price,
                                target_price: signal.target_price,
                                entry_timestamp: bar.timestamp,
                                entry_year: bar.year(),
                                size: self.config.position_size,
                                exit: signal.exit,
                                high_water_close: bar.close,
                            });
                            state.max_open = 1;
                        }
                        SignalKind::Buy => debug!(
                            bar = i,
                            close = bar.close,
                            stop = signal.stop_price,
                            target = signal.target_price,
                            "buy rejected: stop/target do not bracket entry"
                        ),
                        SignalKind::Sell => debug!(bar = i, "sell ignored: long-only book"),
                        SignalKind::None => {}
                    }
                }
            }

            equity_curve.push(state.equity);
        }

        if let (Some(pos), Some(last)) = (state.position.take(), bars.last()) {
            let last_index = bars.len() - 1;
            state.close(pos, last_index, last.close, ExitReason::EndOfData);
            if let Some(point) = equity_curve.last_mut() {
                *point = state.equity;
            }
        }

        debug!(
            generator = generator.name(),
            bars = bars.len(),
            trades = state.trades.len(),
            final_equity = state.equity,
            "simulation finished"
        );

        RunResult {
            equity_curve,
            trades: state.trades,
            yearly_pnl: state.yearly_pnl,
            initial_equity: self.config.initial_equity,
            final_equity: state.equity,
            max_open_positions: state.max_open,
            signals_seen,
            start_timestamp: bars.first().map(|b| b.timestamp),
            end_timestamp: bars.last().map(|b| b.timestamp),
        }
    }
}

/// Exit price and reason for an open position at bar `i`, if it closes.
///
/// Stop first (exit at stop), then target (exit at target), then the
/// position's exit rule (exit at close).
fn exit_for(
    pos: &OpenPosition,
    bar: &Bar,
    bars: &[Bar],
    i: usize,
    generator: &mut dyn SignalGenerator,
) -> Option<(f64, ExitReason)> {
    if bar.low <= pos.stop_price {
        return Some((pos.stop_price, ExitReason::StopLoss));
    }
    if bar.high >= pos.target_price {
        return Some((pos.target_price, ExitReason::TakeProfit));
    }
    match pos.exit {
        ExitRule::TimeLimit { max_bars } if pos.bars_held(i) >= max_bars => {
            Some((bar.close, ExitReason::TimeLimit))
        }
        ExitRule::OnIndicator if generator.exit_triggered(bars, i) => {
            Some((bar.close, ExitReason::IndicatorExit))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Signal;
    use crate::indicators::{assert_approx, make_bars, make_ohlc_bars};

    /// Emits a scripted signal at chosen bars.
    struct Scripted {
        at: Vec<(usize, Signal)>,
        exit_at: Vec<usize>,
    }

    impl Scripted {
        fn new(at: Vec<(usize, Signal)>) -> Self {
            Self { at, exit_at: Vec::new() }
        }
    }

    impl SignalGenerator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }
        fn warmup_bars(&self) -> usize {
            0
        }
        fn generate(&mut self, _bars: &[Bar], index: usize) -> Signal {
            self.at
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, s)| s.clone())
                .unwrap_or_else(|| Signal::none(index, "scripted none"))
        }
        fn exit_triggered(&mut self, _bars: &[Bar], index: usize) -> bool {
            self.exit_at.contains(&index)
        }
    }

    #[test]
    fn stop_hit_closes_at_stop() {
        // Second bar enters at close 100 (stop 98, target 106); the third bar
        // trades 97..99 and closes the position at the stop level.
        let bars = make_ohlc_bars(&[
            (101.0, 102.0, 100.0, 101.0),
            (100.5, 101.0, 99.5, 100.0),
            (99.0, 99.0, 97.0, 98.5),
        ]);
        let mut gen = Scripted::new(vec![(1, Signal::buy(1, 98.0, 106.0, "test"))]);
        let sim = Simulator::new(SimulatorConfig {
            initial_equity: 1000.0,
            position_size: 10.0,
        });
        let result = sim.run(&bars, &mut gen);

        assert_eq!(result.trades.len(), 1);
        let t = &result.trades[0];
        assert_eq!(t.entry_bar, 1);
        assert_approx(t.entry_price, 100.0, 1e-12);
        assert_eq!(t.exit_reason, ExitReason::StopLoss);
        assert_eq!(t.exit_bar, 2);
        assert_approx(t.exit_price, 98.0, 1e-12);
        assert_approx(t.pnl, (98.0 - 100.0) * 10.0, 1e-12);
        assert_eq!(result.equity_curve, vec![1000.0, 1000.0, 980.0]);
        assert_approx(result.final_equity, 980.0, 1e-12);
        assert_eq!(result.yearly_pnl.get(&2024), Some(&-20.0));
    }

    #[test]
    fn stop_checked_before_target() {
        // bar 1 touches both stop and target
        let bars = make_ohlc_bars(&[(100.0, 101.0, 99.0, 100.0), (100.0, 110.0, 90.0, 100.0)]);
        let mut gen = Scripted::new(vec![(0, Signal::buy(0, 95.0, 105.0, "test"))]);
        let result = Simulator::default().run(&bars, &mut gen);
        assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
    }

    #[test]
    fn target_hit_closes_at_target() {
        let bars = make_ohlc_bars(&[(100.0, 101.0, 99.0, 100.0), (101.0, 107.0, 100.5, 106.5)]);
        let mut gen = Scripted::new(vec![(0, Signal::buy(0, 98.0, 106.0, "test"))]);
        let result = Simulator::default().run(&bars, &mut gen);
        let t = &result.trades[0];
        assert_eq!(t.exit_reason, ExitReason::TakeProfit);
        assert_approx(t.pnl, 6.0, 1e-12);
    }

    #[test]
    fn open_position_force_closed_at_last_close() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let mut gen = Scripted::new(vec![(0, Signal::buy(0, 50.0, 200.0, "test"))]);
        let result = Simulator::default().run(&bars, &mut gen);
        assert_eq!(result.trades.len(), 1);
        let t = &result.trades[0];
        assert_eq!(t.exit_reason, ExitReason::EndOfData);
        assert_eq!(t.exit_bar, 2);
        assert_approx(t.pnl, 2.0, 1e-12);
        assert_eq!(result.equity_curve.len(), 3);
        assert_approx(*result.equity_curve.last().unwrap(), 1002.0, 1e-12);
        assert_approx(result.final_equity, result.initial_equity + result.total_pnl(), 1e-12);
    }

    #[test]
    fn non_bracketing_buy_rejected() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let mut gen = Scripted::new(vec![(0, Signal::buy(0, 101.0, 106.0, "bad stop"))]);
        let result = Simulator::default().run(&bars, &mut gen);
        assert!(result.trades.is_empty());
        assert_eq!(result.signals_seen, 1);
        assert_eq!(result.max_open_positions, 0);
    }

    #[test]
    fn sell_and_mismatched_index_ignored() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let sell = Signal {
            kind: SignalKind::Sell,
            ..Signal::buy(0, 105.0, 95.0, "short")
        };
        let wrong_index = Signal::buy(7, 90.0, 110.0, "stale");
        let mut gen = Scripted::new(vec![(0, sell), (1, wrong_index)]);
        let result = Simulator::default().run(&bars, &mut gen);
        assert!(result.trades.is_empty());
        assert_eq!(result.equity_curve, vec![1000.0; 3]);
    }

    #[test]
    fn one_action_per_bar() {
        // exit at bar 1; entry signal at bar 1 must be skipped
        let bars = make_ohlc_bars(&[
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 97.0, 98.5),
            (98.5, 99.0, 98.0, 98.5),
        ]);
        let mut gen = Scripted::new(vec![
            (0, Signal::buy(0, 98.0, 106.0, "first")),
            (1, Signal::buy(1, 90.0, 110.0, "same bar")),
        ]);
        let result = Simulator::default().run(&bars, &mut gen);
        assert_eq!(result.trades.len(), 1);
    }

    #[test]
    fn time_limit_closes_after_max_bars() {
        let bars = make_bars(&[100.0, 100.5, 101.0, 101.5, 102.0, 102.5]);
        let signal =
            Signal::buy(0, 50.0, 200.0, "timed").with_exit(ExitRule::TimeLimit { max_bars: 2 });
        let mut gen = Scripted::new(vec![(0, signal)]);
        let result = Simulator::default().run(&bars, &mut gen);
        let t = &result.trades[0];
        assert_eq!(t.exit_reason, ExitReason::TimeLimit);
        assert_eq!(t.bars_held(), 2);
        assert_approx(t.exit_price, 101.0, 1e-12);
    }

    #[test]
    fn trailing_stop_ratchets_and_exits() {
        // rally to 110 then drop; 5% trail → stop 104.5
        let bars = make_ohlc_bars(&[
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 105.5, 99.8, 105.0),
            (105.0, 110.5, 104.9, 110.0),
            (110.0, 110.2, 103.0, 104.0),
        ]);
        let signal =
            Signal::buy(0, 95.0, 200.0, "trail").with_exit(ExitRule::TrailingStop { pct: 0.05 });
        let mut gen = Scripted::new(vec![(0, signal)]);
        let result = Simulator::default().run(&bars, &mut gen);
        let t = &result.trades[0];
        assert_eq!(t.exit_reason, ExitReason::StopLoss);
        assert_approx(t.exit_price, 110.0 * 0.95, 1e-9);
        assert!(t.pnl > 0.0);
    }

    #[test]
    fn indicator_exit_closes_at_close() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0]);
        let signal = Signal::buy(0, 50.0, 200.0, "ind").with_exit(ExitRule::OnIndicator);
        let mut gen = Scripted::new(vec![(0, signal)]);
        gen.exit_at = vec![2];
        let result = Simulator::default().run(&bars, &mut gen);
        let t = &result.trades[0];
        assert_eq!(t.exit_reason, ExitReason::IndicatorExit);
        assert_eq!(t.exit_bar, 2);
        assert_approx(t.exit_price, 102.0, 1e-12);
    }

    #[test]
    fn malformed_timestamp_skips_year_but_realizes_trade() {
        let mut bars = make_bars(&[100.0, 101.0, 102.0]);
        bars[0].timestamp = i64::MAX;
        let mut gen = Scripted::new(vec![(0, Signal::buy(0, 50.0, 200.0, "x"))]);
        let result = Simulator::default().run(&bars, &mut gen);
        assert_eq!(result.trades.len(), 1);
        assert!(result.yearly_pnl.is_empty());
        assert_approx(result.final_equity, 1002.0, 1e-12);
    }

    #[test]
    fn empty_series() {
        let mut gen = Scripted::new(vec![]);
        let result = Simulator::default().run(&[], &mut gen);
        assert!(result.equity_curve.is_empty());
        assert_eq!(result.final_equity, 1000.0);
        assert_eq!(result.start_timestamp, None);
    }
}
