//! Push-to-talk button on a Raspberry Pi GPIO line

use crate::button::ButtonSource;
use crate::error::SensorError;
use rppal::gpio::{Gpio, InputPin};
use std::sync::Mutex;
use tracing::info;

pub struct GpioButton {
    pin: Mutex<InputPin>,
    active_low: bool,
}

impl GpioButton {
    /// Claims `pin` as an input. Active-low buttons get the internal pull-up,
    /// active-high ones the pull-down.
    pub fn open(pin: u8, active_low: bool) -> Result<Self, SensorError> {
        let gpio = Gpio::new().map_err(|e| SensorError::Unavailable(e.to_string()))?;
        let line = gpio
            .get(pin)
            .map_err(|e| SensorError::Unavailable(format!("GPIO {}: {}", pin, e)))?;
        let input = if active_low {
            line.into_input_pullup()
        } else {
            line.into_input_pulldown()
        };
        info!(
            "Button on GPIO {} ({})",
            pin,
            if active_low { "active low" } else { "active high" }
        );
        Ok(Self {
            pin: Mutex::new(input),
            active_low,
        })
    }
}

impl ButtonSource for GpioButton {
    fn is_pressed(&self) -> bool {
        let pin = self.pin.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pin.is_low() == self.active_low
    }
}
