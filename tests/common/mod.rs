//! Recording stand-in for the device board.

use esp32alarm::{Indicator, Indicators, Modem, Thermometer};

#[derive(Debug, Default)]
pub struct MockBoard {
    pub celsius: f32,
    pub reads: usize,
    pub indicators: Vec<Indicator>,
    pub modem: Vec<String>,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn at(celsius: f32) -> Self {
        MockBoard {
            celsius,
            ..Default::default()
        }
    }

    pub fn indicator(&self) -> Option<Indicator> {
        self.indicators.last().copied()
    }
}

impl Thermometer for MockBoard {
    fn read_celsius(&mut self) -> anyhow::Result<f32> {
        self.reads += 1;
        Ok(self.celsius)
    }
}

impl Indicators for MockBoard {
    fn set_indicator(&mut self, state: Indicator) {
        self.indicators.push(state);
    }
}

impl Modem for MockBoard {
    fn send_line(&mut self, text: &str) {
        self.modem.push(text.to_string());
    }

    fn send_raw(&mut self, byte: u8) {
        self.modem.push(format!("<{byte:#04x}>"));
    }
}
