// board.rs

use esp_idf_hal::{
    adc::{
        ADC1,
        attenuation::DB_11,
        oneshot::{AdcChannelDriver, AdcDriver, config::AdcChannelConfig},
    },
    gpio::{AnyOutputPin, Output, PinDriver},
    uart::UartDriver,
};

use crate::*;

#[cfg(feature = "esp32c3")]
pub type SensorPin = esp_idf_hal::gpio::Gpio2;
#[cfg(feature = "esp32s")]
pub type SensorPin = esp_idf_hal::gpio::Gpio34;

pub const MODEM_BAUD: u32 = 9600;

/// Everything the monitor touches on the real device.
pub struct Board<'d> {
    sensor: AdcChannelDriver<'d, SensorPin, AdcDriver<'d, ADC1>>,
    green: PinDriver<'d, AnyOutputPin, Output>,
    red: PinDriver<'d, AnyOutputPin, Output>,
    blue: PinDriver<'d, AnyOutputPin, Output>,
    buzzer: PinDriver<'d, AnyOutputPin, Output>,
    uart: UartDriver<'d>,
}

impl<'d> Board<'d> {
    pub fn new(
        adc: ADC1,
        sensor_pin: SensorPin,
        leds: [AnyOutputPin; 3],
        buzzer: AnyOutputPin,
        uart: UartDriver<'d>,
    ) -> anyhow::Result<Self> {
        let adc = AdcDriver::new(adc)?;
        let config = AdcChannelConfig {
            attenuation: DB_11,
            ..Default::default()
        };
        let sensor = AdcChannelDriver::new(adc, sensor_pin, &config)?;
        let [green, red, blue] = leds;

        let mut board = Board {
            sensor,
            green: PinDriver::output(green)?,
            red: PinDriver::output(red)?,
            blue: PinDriver::output(blue)?,
            buzzer: PinDriver::output(buzzer)?,
            uart,
        };
        board.all_off()?;
        Ok(board)
    }

    fn all_off(&mut self) -> anyhow::Result<()> {
        self.green.set_low()?;
        self.red.set_low()?;
        self.blue.set_low()?;
        self.buzzer.set_low()?;
        Ok(())
    }

    fn show(&mut self, green: bool, red: bool, blue: bool, buzzer: bool) -> anyhow::Result<()> {
        self.green.set_level(green.into())?;
        self.red.set_level(red.into())?;
        self.blue.set_level(blue.into())?;
        self.buzzer.set_level(buzzer.into())?;
        Ok(())
    }
}

impl Thermometer for Board<'_> {
    fn read_celsius(&mut self) -> anyhow::Result<f32> {
        let raw = self.sensor.read_raw()?;
        Ok(counts_to_celsius(raw))
    }
}

impl Indicators for Board<'_> {
    fn set_indicator(&mut self, state: Indicator) {
        let res = match state {
            Indicator::Safe => self.show(true, false, false, false),
            Indicator::Overheat => self.show(false, true, false, true),
            Indicator::Dispatched => self.show(false, false, true, false),
        };
        if let Err(e) = res {
            error!("Cannot set indicator {state:?}: {e:?}");
        }
    }
}

impl Modem for Board<'_> {
    fn send_line(&mut self, text: &str) {
        info!("Modem <- {text}");
        for chunk in [text.as_bytes(), b"\r\n"] {
            if let Err(e) = self.uart.write(chunk) {
                warn!("Modem write failed: {e:?}");
            }
        }
    }

    fn send_raw(&mut self, byte: u8) {
        info!("Modem <- {byte:#04x}");
        if let Err(e) = self.uart.write(&[byte]) {
            warn!("Modem write failed: {e:?}");
        }
    }
}

// EOF
