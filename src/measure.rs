// measure.rs

use crate::*;

// LM35 on the ADC: 10 mV per degree
pub const ADC_VREF: f32 = 3.3;
pub const ADC_STEPS: f32 = 4096.0;
pub const LM35_SCALE: f32 = 100.0;

/// Simulated heating rate in demo mode, degrees per second.
pub const RAMP_RATE: f32 = 0.5;
pub const DEMO_MARGIN: f32 = 5.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Real,
    Demo,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Real => "REAL",
            Mode::Demo => "DEMO",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Mode::Real => Mode::Demo,
            Mode::Demo => Mode::Real,
        }
    }
}

pub trait Thermometer {
    fn read_celsius(&mut self) -> anyhow::Result<f32>;
}

/// Linear conversion from raw ADC counts, deliberately unclamped.
pub fn counts_to_celsius(raw: u16) -> f32 {
    raw as f32 * (ADC_VREF / ADC_STEPS) * LM35_SCALE
}

pub fn demo_baseline(threshold: f32) -> f32 {
    threshold - DEMO_MARGIN
}

pub fn demo_ramp(previous: f32, elapsed_secs: f32, threshold: f32) -> f32 {
    (previous + RAMP_RATE * elapsed_secs).min(threshold + DEMO_MARGIN)
}

/// Produce the next reading. A failed sensor transaction keeps the previous value.
pub fn sample<T>(
    mode: Mode,
    previous: f32,
    elapsed_secs: f32,
    threshold: f32,
    sensor: &mut T,
) -> f32
where
    T: Thermometer + ?Sized,
{
    match mode {
        Mode::Demo => demo_ramp(previous, elapsed_secs, threshold),
        Mode::Real => match sensor.read_celsius() {
            Ok(t) => t,
            Err(e) => {
                error!("Temperature read failed: {e:?}");
                previous
            }
        },
    }
}


// EOF
