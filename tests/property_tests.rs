//! Property tests for the alarm decision rules and the call script.
//!
//! Runs on the host only.

#![cfg(not(target_os = "espidf"))]

mod common;

use common::MockBoard;
use esp32alarm::*;
use proptest::prelude::*;

#[derive(Default)]
struct Recorder(Vec<String>);

impl Modem for Recorder {
    fn send_line(&mut self, text: &str) {
        self.0.push(text.to_string());
    }
    fn send_raw(&mut self, byte: u8) {
        self.0.push(format!("<{byte:#04x}>"));
    }
}

fn monitor(settings: Settings) -> Monitor {
    Monitor::new(settings, ALERT_LIMIT, Sequencer::new("+100", "hot"))
}

proptest! {
    /// Temperatures that never reach the limit never lead to a call.
    #[test]
    fn below_limit_never_arms(temps in proptest::collection::vec(-40.0f32..32.99, 1..80)) {
        let mut store = MemStore::new();
        let mut board = MockBoard::default();
        let mut m = monitor(Settings::default());

        for (i, t) in temps.iter().enumerate() {
            board.celsius = *t;
            let base = i as u64 * SAMPLE_PERIOD_MS;
            for now in (base..base + SAMPLE_PERIOD_MS).step_by(TICK_MS as usize) {
                m.tick(now, &mut board, &mut store, None);
            }
            prop_assert_eq!(m.episode(), Episode::Normal);
        }
        prop_assert!(board.modem.is_empty());
        prop_assert!(board.indicators.iter().all(|i| *i == Indicator::Safe));
        prop_assert_eq!(m.settings().alerts, 0);
    }

    /// However often the evaluator runs, a held overheat arms exactly once,
    /// and never before the hold time.
    #[test]
    fn held_overheat_arms_once(steps in proptest::collection::vec(1u64..700, 10..200)) {
        let mut ev = AlertEvaluator::new();
        let mut now = 0;
        let mut armed_at = Vec::new();
        ev.evaluate(34.0, ALERT_LIMIT, HOLD_REAL_MS, now, false);
        for step in steps {
            now += step;
            if ev.evaluate(34.0, ALERT_LIMIT, HOLD_REAL_MS, now, false).arm {
                armed_at.push(now);
            }
        }
        if now >= HOLD_REAL_MS {
            prop_assert_eq!(armed_at.len(), 1);
            prop_assert!(armed_at[0] >= HOLD_REAL_MS);
        } else {
            prop_assert!(armed_at.is_empty());
        }
    }

    /// A cancel in any step returns to idle on the next tick and nothing
    /// more goes to the modem.
    #[test]
    fn cancel_in_any_step_goes_silent(cancel_at in 0u64..30_000, demo in any::<bool>()) {
        let hold = if demo { HOLD_DEMO_MS } else { HOLD_REAL_MS };
        let mut seq = Sequencer::new("+100", "hot");
        let mut modem = Recorder::default();
        seq.arm(0);

        let mut now = 0;
        while now < cancel_at {
            seq.advance(now, hold, &mut modem);
            now += TICK_MS;
        }
        prop_assume!(seq.is_active());
        let sent = modem.0.len();

        seq.request_cancel();
        seq.advance(now + TICK_MS, hold, &mut modem);
        prop_assert_eq!(seq.step(), Step::Idle);
        for t in (now + 2 * TICK_MS..now + 60_000).step_by(100) {
            seq.advance(t, hold, &mut modem);
        }
        prop_assert_eq!(modem.0.len(), sent);
    }

    /// The simulated ramp never passes five degrees above the limit.
    #[test]
    fn demo_ramp_is_capped(
        start in 28.0f32..38.0,
        gaps in proptest::collection::vec(0.0f32..30.0, 1..100),
    ) {
        let mut t = start;
        for gap in gaps {
            let next = demo_ramp(t, gap, ALERT_LIMIT);
            prop_assert!(next >= t);
            prop_assert!(next <= ALERT_LIMIT + DEMO_MARGIN);
            t = next;
        }
    }

    /// Toggling demo always restarts from the safe baseline and survives a reboot.
    #[test]
    fn toggle_resets_and_persists(
        temp in 20.0f32..60.0,
        ticks in 0u64..2000,
        toggles in 1usize..5,
    ) {
        let mut store = MemStore::new();
        let mut board = MockBoard::at(temp);
        let mut m = monitor(Settings::default());

        let mut now = 0;
        for _ in 0..ticks {
            m.tick(now, &mut board, &mut store, None);
            now += TICK_MS;
        }
        for _ in 0..toggles {
            m.handle(Command::ToggleDemo, now, &mut store);
            prop_assert_eq!(m.temperature(), ALERT_LIMIT - DEMO_MARGIN);
            prop_assert_eq!(m.episode(), Episode::Normal);
            prop_assert_eq!(m.call_step(), Step::Idle);
        }

        let expected = if toggles % 2 == 1 { Mode::Demo } else { Mode::Real };
        prop_assert_eq!(m.settings().mode, expected);
        prop_assert_eq!(Settings::load(&mut store).mode, expected);
    }
}
