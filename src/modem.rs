// modem.rs
//
// Non-blocking SMS + voice call script for a SIM800-style GSM modem.
// Every step waits out its dwell time across scheduler ticks, so the rest
// of the firmware keeps running while a call is being placed.

use crate::*;

pub const ALERT_RECIPIENT: &str = env!("ALERT_RECIPIENT");

pub const CTRL_Z: u8 = 0x1a;
pub const DIAL_MS: u64 = 15_000;

/// Fire-and-forget byte sink towards the modem.
pub trait Modem {
    fn send_line(&mut self, text: &str);
    fn send_raw(&mut self, byte: u8);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Step {
    #[default]
    Idle,
    Init,
    SetTextMode,
    AddressRecipient,
    SendPayload,
    Terminate,
    Dial,
}

impl Step {
    /// Minimum time to stay in this step before moving on.
    fn dwell_ms(self, dial_hold_ms: u64) -> Option<u64> {
        match self {
            Step::Idle => None,
            Step::Init | Step::SetTextMode | Step::AddressRecipient => Some(500),
            Step::SendPayload => Some(300),
            Step::Terminate => Some(dial_hold_ms),
            Step::Dial => Some(DIAL_MS),
        }
    }

    fn next(self) -> Step {
        match self {
            Step::Idle | Step::Dial => Step::Idle,
            Step::Init => Step::SetTextMode,
            Step::SetTextMode => Step::AddressRecipient,
            Step::AddressRecipient => Step::SendPayload,
            Step::SendPayload => Step::Terminate,
            Step::Terminate => Step::Dial,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transition {
    Stay,
    Enter(Step),
    HangUp,
    Abort,
}

fn transition(step: Step, elapsed_ms: u64, dial_hold_ms: u64, cancel: bool) -> Transition {
    if cancel {
        return Transition::Abort;
    }
    match step.dwell_ms(dial_hold_ms) {
        Some(dwell) if elapsed_ms >= dwell => match step.next() {
            Step::Idle => Transition::HangUp,
            next => Transition::Enter(next),
        },
        _ => Transition::Stay,
    }
}

#[derive(Debug)]
pub struct Sequencer {
    step: Step,
    entered_at: u64,
    cancel: bool,
    recipient: String,
    message: String,
}

impl Sequencer {
    pub fn new(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Sequencer {
            step: Step::Idle,
            entered_at: 0,
            cancel: false,
            recipient: recipient.into(),
            message: message.into(),
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn is_active(&self) -> bool {
        self.step != Step::Idle
    }

    pub fn cancel_pending(&self) -> bool {
        self.cancel
    }

    /// Start a call. A call already in progress is left alone.
    pub fn arm(&mut self, now: u64) -> bool {
        if self.is_active() {
            info!("Call already in progress ({:?}), not arming", self.step);
            return false;
        }
        info!("Call sequence armed for {}", self.recipient);
        self.step = Step::Init;
        self.entered_at = now;
        self.cancel = false;
        true
    }

    /// Consumed on the next advance.
    pub fn request_cancel(&mut self) {
        self.cancel = true;
    }

    /// Drop back to idle without a hang-up.
    pub fn stand_down(&mut self) {
        if self.is_active() {
            info!("Call sequence stood down in {:?}", self.step);
        }
        self.step = Step::Idle;
        self.cancel = false;
    }

    /// Run one scheduler tick. Sends at most one command.
    pub fn advance<M>(&mut self, now: u64, dial_hold_ms: u64, modem: &mut M)
    where
        M: Modem + ?Sized,
    {
        let elapsed = now.saturating_sub(self.entered_at);
        match transition(self.step, elapsed, dial_hold_ms, self.cancel) {
            Transition::Stay => {}
            Transition::Abort => {
                if self.is_active() {
                    warn!("Call sequence canceled in {:?}", self.step);
                }
                self.step = Step::Idle;
                self.cancel = false;
            }
            Transition::Enter(next) => {
                info!("Modem step {:?} -> {next:?}", self.step);
                self.enter(next, modem);
                self.step = next;
                self.entered_at = now;
            }
            Transition::HangUp => {
                info!("Call finished, hanging up");
                modem.send_line("ATH");
                self.step = Step::Idle;
            }
        }
    }

    fn enter<M>(&self, step: Step, modem: &mut M)
    where
        M: Modem + ?Sized,
    {
        match step {
            Step::Idle | Step::Init => {}
            Step::SetTextMode => modem.send_line("AT+CMGF=1"),
            Step::AddressRecipient => modem.send_line(&format!("AT+CMGS=\"{}\"", self.recipient)),
            Step::SendPayload => modem.send_line(&self.message),
            Step::Terminate => modem.send_raw(CTRL_Z),
            Step::Dial => modem.send_line(&format!("ATD{};", self.recipient)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn run(seq: &mut Sequencer, modem: &mut Recorder, from: u64, to: u64, hold: u64) {
        for now in (from..=to).step_by(10) {
            seq.advance(now, hold, modem);
        }
    }

    #[test]
    fn idle_sequencer_sends_nothing() {
        let mut seq = Sequencer::new("+123", "hot");
        let mut modem = Recorder::default();
        run(&mut seq, &mut modem, 0, 60_000, HOLD_REAL_MS);
        assert!(modem.0.is_empty());
    }

    #[test]
    fn full_script_with_dwell_times() {
        let mut seq = Sequencer::new("+123", "hot");
        let mut modem = Recorder::default();
        assert!(seq.arm(0));

        run(&mut seq, &mut modem, 0, 490, HOLD_REAL_MS);
        assert!(modem.0.is_empty());
        seq.advance(500, HOLD_REAL_MS, &mut modem);
        assert_eq!(seq.step(), Step::SetTextMode);

        run(&mut seq, &mut modem, 510, 1800, HOLD_REAL_MS);
        assert_eq!(seq.step(), Step::Terminate);
        assert_eq!(modem.0, ["AT+CMGF=1", "AT+CMGS=\"+123\"", "hot", "<0x1a>"]);
        // entered Terminate at 1800, dial after the real-mode hold
        run(&mut seq, &mut modem, 1810, 6790, HOLD_REAL_MS);
        assert_eq!(seq.step(), Step::Terminate);
        seq.advance(6800, HOLD_REAL_MS, &mut modem);
        assert_eq!(seq.step(), Step::Dial);
        assert_eq!(modem.0.last().unwrap(), "ATD+123;");

        run(&mut seq, &mut modem, 6810, 21_790, HOLD_REAL_MS);
        assert!(seq.is_active());
        seq.advance(21_800, HOLD_REAL_MS, &mut modem);
        assert!(!seq.is_active());
        assert_eq!(modem.0.last().unwrap(), "ATH");
        assert_eq!(modem.0.len(), 6);
    }

    #[test]
    fn demo_mode_waits_longer_before_dialing() {
        let mut seq = Sequencer::new("+123", "hot");
        let mut modem = Recorder::default();
        seq.arm(0);
        run(&mut seq, &mut modem, 0, 11_790, HOLD_DEMO_MS);
        assert_eq!(seq.step(), Step::Terminate);
        seq.advance(11_800, HOLD_DEMO_MS, &mut modem);
        assert_eq!(seq.step(), Step::Dial);
    }

    #[test]
    fn cancel_during_dial_skips_hang_up() {
        let mut seq = Sequencer::new("+123", "hot");
        let mut modem = Recorder::default();
        seq.arm(0);
        run(&mut seq, &mut modem, 0, 6800, HOLD_REAL_MS);
        assert_eq!(seq.step(), Step::Dial);
        let sent = modem.0.len();

        run(&mut seq, &mut modem, 6810, 18_800, HOLD_REAL_MS);
        seq.request_cancel();
        assert!(!seq.arm(18_805));
        seq.advance(18_810, HOLD_REAL_MS, &mut modem);
        assert_eq!(seq.step(), Step::Idle);
        assert!(!seq.cancel_pending());

        run(&mut seq, &mut modem, 18_820, 40_000, HOLD_REAL_MS);
        assert_eq!(modem.0.len(), sent);
    }

    #[test]
    fn cancel_on_idle_is_consumed_harmlessly() {
        let mut seq = Sequencer::new("+123", "hot");
        let mut modem = Recorder::default();
        seq.request_cancel();
        seq.advance(0, HOLD_REAL_MS, &mut modem);
        assert!(!seq.cancel_pending());
        assert!(seq.arm(10));
    }

    #[test]
    fn transition_table() {
        assert_eq!(transition(Step::Idle, 99_999, 5000, false), Transition::Stay);
        assert_eq!(transition(Step::Init, 499, 5000, false), Transition::Stay);
        assert_eq!(
            transition(Step::Init, 500, 5000, false),
            Transition::Enter(Step::SetTextMode)
        );
        assert_eq!(
            transition(Step::SendPayload, 300, 5000, false),
            Transition::Enter(Step::Terminate)
        );
        assert_eq!(transition(Step::Dial, DIAL_MS, 5000, false), Transition::HangUp);
        assert_eq!(transition(Step::Dial, 0, 5000, true), Transition::Abort);
    }
}

// EOF
