// alert.rs

use crate::*;

pub const ALERT_LIMIT: f32 = 33.0;
pub const HOLD_REAL_MS: u64 = 5000;
pub const HOLD_DEMO_MS: u64 = 10_000;
pub const SAMPLE_PERIOD_MS: u64 = 500;

pub fn hold_ms(mode: Mode) -> u64 {
    match mode {
        Mode::Real => HOLD_REAL_MS,
        Mode::Demo => HOLD_DEMO_MS,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Indicator {
    Safe,
    Overheat,
    Dispatched,
}

pub trait Indicators {
    fn set_indicator(&mut self, state: Indicator);
}

/// Where the current overheat episode stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Episode {
    #[default]
    Normal,
    Exceeding {
        since: u64,
    },
    Dispatching,
    // canceled by the operator, quiet until the temperature drops
    Suppressed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub indicator: Indicator,
    pub arm: bool,
}

#[derive(Debug, Default)]
pub struct AlertEvaluator {
    episode: Episode,
}

impl AlertEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn episode(&self) -> Episode {
        self.episode
    }

    pub fn dispatched(&self) -> bool {
        self.episode == Episode::Dispatching
    }

    /// Judge one reading. `call_busy` is true while a call is in flight or a
    /// cancellation has not been consumed yet; no arming happens then.
    pub fn evaluate(
        &mut self,
        reading: f32,
        threshold: f32,
        hold_ms: u64,
        now: u64,
        call_busy: bool,
    ) -> Verdict {
        if reading < threshold {
            if self.episode != Episode::Normal {
                info!("Temperature {reading:.1} back below {threshold:.1}");
            }
            self.episode = Episode::Normal;
            return Verdict {
                indicator: Indicator::Safe,
                arm: false,
            };
        }

        if self.episode == Episode::Normal {
            warn!("Temperature {reading:.1} reached limit {threshold:.1}");
            self.episode = Episode::Exceeding { since: now };
        }

        let mut arm = false;
        if let Episode::Exceeding { since } = self.episode {
            if now.saturating_sub(since) >= hold_ms && !call_busy {
                self.episode = Episode::Dispatching;
                arm = true;
            }
        }

        let indicator = if self.dispatched() {
            Indicator::Dispatched
        } else {
            Indicator::Overheat
        };
        Verdict { indicator, arm }
    }

    /// Operator cancel. Returns true if an episode was running.
    pub fn cancel(&mut self) -> bool {
        match self.episode {
            Episode::Exceeding { .. } | Episode::Dispatching => {
                self.episode = Episode::Suppressed;
                true
            }
            Episode::Normal | Episode::Suppressed => false,
        }
    }

    pub fn reset(&mut self) {
        self.episode = Episode::Normal;
    }

    /// Whole seconds left before dispatch, 0 when not counting down.
    pub fn countdown_secs(&self, hold_ms: u64, now: u64) -> u64 {
        match self.episode {
            Episode::Exceeding { since } => {
                hold_ms.saturating_sub(now.saturating_sub(since)) / 1000
            }
            _ => 0,
        }
    }
}


// EOF
