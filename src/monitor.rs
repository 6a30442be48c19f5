// monitor.rs

use crate::*;

/// Fast scheduler tick driving the call sequencer and request handling.
pub const TICK_MS: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    ToggleDemo,
    CancelCall,
    Reset,
    Status,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Mode(Mode),
    Canceled,
    Restarting,
    Status(Status),
}

impl Reply {
    pub fn text(&self) -> String {
        match self {
            Reply::Mode(Mode::Demo) => "DEMO_ON".into(),
            Reply::Mode(Mode::Real) => "DEMO_OFF".into(),
            Reply::Canceled => "CALL_CANCELED".into(),
            Reply::Restarting => "RESTARTING".into(),
            Reply::Status(s) => serde_json::to_string(s).unwrap_or_else(|_| "{}".to_string()),
        }
    }
}

#[derive(Debug)]
pub struct Request {
    pub command: Command,
    pub reply: oneshot::Sender<Reply>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Status {
    pub temperature: String,
    pub mode: &'static str,
    pub demo: bool,
    pub state: &'static str,
    pub limit: String,
    pub countdown: u64,
    pub alerts: u32,
    pub step: Step,
}

/// All mutable device state, owned by the control loop.
#[derive(Debug)]
pub struct Monitor {
    threshold: f32,
    temperature: f32,
    settings: Settings,
    evaluator: AlertEvaluator,
    sequencer: Sequencer,
    last_sample: Option<u64>,
}

impl Monitor {
    pub fn new(settings: Settings, threshold: f32, sequencer: Sequencer) -> Self {
        Monitor {
            threshold,
            temperature: demo_baseline(threshold),
            settings,
            evaluator: AlertEvaluator::new(),
            sequencer,
            last_sample: None,
        }
    }

    pub fn boot(store: &mut dyn Store, location: &str) -> Self {
        let message = format!(
            "{location}: emergency, temperature has crossed the safe limit of {ALERT_LIMIT:.1} C!"
        );
        Self::new(
            Settings::load(store),
            ALERT_LIMIT,
            Sequencer::new(ALERT_RECIPIENT, message),
        )
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn episode(&self) -> Episode {
        self.evaluator.episode()
    }

    pub fn call_step(&self) -> Step {
        self.sequencer.step()
    }

    pub fn hold_ms(&self) -> u64 {
        hold_ms(self.settings.mode)
    }

    /// One pass of the scheduler: call script, one request, then the slow sample.
    pub fn tick<B>(
        &mut self,
        now: u64,
        board: &mut B,
        store: &mut dyn Store,
        command: Option<Command>,
    ) -> Option<Reply>
    where
        B: Thermometer + Indicators + Modem,
    {
        self.advance_call(now, board);
        let reply = command.map(|c| self.handle(c, now, &mut *store));
        if self.sample_due(now) {
            self.sample_and_evaluate(now, board, store);
        }
        reply
    }

    fn advance_call<M>(&mut self, now: u64, modem: &mut M)
    where
        M: Modem + ?Sized,
    {
        self.sequencer.advance(now, self.hold_ms(), modem);
    }

    fn sample_due(&self, now: u64) -> bool {
        match self.last_sample {
            None => true,
            Some(t) => now.saturating_sub(t) >= SAMPLE_PERIOD_MS,
        }
    }

    fn sample_and_evaluate<B>(&mut self, now: u64, board: &mut B, store: &mut dyn Store)
    where
        B: Thermometer + Indicators + ?Sized,
    {
        self.last_sample = Some(now);
        // the ramp follows the nominal sample period, not the measured gap
        let elapsed_secs = SAMPLE_PERIOD_MS as f32 / 1000.0;
        self.temperature = sample(
            self.settings.mode,
            self.temperature,
            elapsed_secs,
            self.threshold,
            board,
        );

        let busy = self.sequencer.is_active() || self.sequencer.cancel_pending();
        let verdict = self
            .evaluator
            .evaluate(self.temperature, self.threshold, self.hold_ms(), now, busy);

        if verdict.indicator == Indicator::Safe {
            self.sequencer.stand_down();
        }
        if verdict.arm && self.sequencer.arm(now) {
            self.settings.count_alert(store);
            warn!(
                "Alert #{n} dispatched at {t:.1} C",
                n = self.settings.alerts,
                t = self.temperature
            );
        }
        board.set_indicator(verdict.indicator);
    }

    pub fn handle(&mut self, command: Command, now: u64, store: &mut dyn Store) -> Reply {
        info!("Handling {command:?}");
        match command {
            Command::ToggleDemo => {
                let mode = self.settings.mode.toggled();
                self.settings.set_mode(store, mode);
                self.evaluator.reset();
                self.sequencer.stand_down();
                self.temperature = demo_baseline(self.threshold);
                info!("Mode is now {}", mode.label());
                Reply::Mode(mode)
            }
            Command::CancelCall => {
                if self.evaluator.cancel() {
                    warn!("Alert episode canceled by operator");
                }
                self.sequencer.request_cancel();
                Reply::Canceled
            }
            Command::Reset => {
                warn!("Restart requested");
                Reply::Restarting
            }
            Command::Status => Reply::Status(self.status(now)),
        }
    }

    pub fn status(&self, now: u64) -> Status {
        let calling = self.sequencer.is_active() || self.evaluator.dispatched();
        let (state, countdown) = if calling {
            ("CALLING", 0)
        } else if self.temperature >= self.threshold {
            ("ALARM", self.evaluator.countdown_secs(self.hold_ms(), now))
        } else {
            ("NORMAL", 0)
        };

        Status {
            temperature: format!("{:.1}", self.temperature),
            mode: self.settings.mode.label(),
            demo: self.settings.mode == Mode::Demo,
            state,
            limit: format!("{:.1}", self.threshold),
            countdown,
            alerts: self.settings.alerts,
            step: self.sequencer.step(),
        }
    }
}

/// Cooperative control loop. Owns the monitor and the board; talks to the
/// rest of the firmware through the request channel and the published status.
pub async fn run_monitor<B>(
    state: Arc<Pin<Box<MyState>>>,
    mut monitor: Monitor,
    mut board: B,
    mut requests: mpsc::Receiver<Request>,
) -> anyhow::Result<()>
where
    B: Thermometer + Indicators + Modem,
{
    let start = tokio::time::Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_MS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!("Monitor running, limit {ALERT_LIMIT:.1} C");

    loop {
        ticker.tick().await;
        let now = start.elapsed().as_millis() as u64;

        let request = requests.try_recv().ok();
        let reply = {
            let mut store = state.store.lock().await;
            monitor.tick(now, &mut board, &mut **store, request.as_ref().map(|r| r.command))
        };

        let mut restart = false;
        if let (Some(Request { command, reply: tx }), Some(reply)) = (request, reply) {
            restart = reply == Reply::Restarting;
            if tx.send(reply).is_err() {
                warn!("Requester went away before {command:?} was answered");
            }
        }

        *state.status.write().await = monitor.status(now);
        if restart {
            *state.reset.write().await = true;
        }
    }
}

// EOF
