//! ADS1115 16-bit ADC on the Raspberry Pi I2C bus
//!
//! Each read triggers a single-shot conversion on one single-ended input and
//! waits for it to finish. The bus handle is opened lazily and dropped after
//! any bus error so the next read starts from a fresh file descriptor.

use crate::config::{AdcGain, JoystickConfig};
use crate::error::SensorError;
use crate::joystick::AxisSource;
use rppal::i2c::I2c;
use std::time::Duration;
use tracing::{debug, info};

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

const OS_SINGLE: u16 = 0x8000;
const MUX_SINGLE_0: u16 = 0x4000;
const MODE_SINGLE: u16 = 0x0100;
const DR_128SPS: u16 = 0x0080;
const COMP_DISABLE: u16 = 0x0003;

/// One conversion at 128 SPS plus margin
const CONVERSION_TIME: Duration = Duration::from_micros(8_000);

const CHANNELS: u8 = 4;

fn gain_bits(gain: AdcGain) -> u16 {
    match gain {
        AdcGain::TwoThirds => 0x0000,
        AdcGain::One => 0x0200,
        AdcGain::Two => 0x0400,
        AdcGain::Four => 0x0600,
        AdcGain::Eight => 0x0800,
        AdcGain::Sixteen => 0x0A00,
    }
}

/// Config register value starting a single-shot read of `channel`
pub fn single_shot_config(channel: u8, gain: AdcGain) -> Result<u16, SensorError> {
    if channel >= CHANNELS {
        return Err(SensorError::InvalidChannel(channel));
    }
    Ok(OS_SINGLE
        | (MUX_SINGLE_0 + (u16::from(channel) << 12))
        | gain_bits(gain)
        | MODE_SINGLE
        | DR_128SPS
        | COMP_DISABLE)
}

fn bus_error(e: rppal::i2c::Error) -> SensorError {
    SensorError::Bus(e.to_string())
}

pub struct Ads1115 {
    bus: u8,
    address: u16,
    gain: AdcGain,
    i2c: Option<I2c>,
}

impl Ads1115 {
    pub fn new(bus: u8, address: u16, gain: AdcGain) -> Self {
        Self {
            bus,
            address,
            gain,
            i2c: None,
        }
    }

    pub fn from_config(config: &JoystickConfig) -> Self {
        Self::new(config.i2c_bus, config.address, config.gain)
    }

    /// Opens the bus now instead of on the first read
    pub fn open(&mut self) -> Result<(), SensorError> {
        self.handle().map(|_| ())
    }

    fn handle(&mut self) -> Result<&mut I2c, SensorError> {
        if self.i2c.is_none() {
            let mut i2c = I2c::with_bus(self.bus).map_err(|e| {
                SensorError::Unavailable(format!("I2C bus {}: {}", self.bus, e))
            })?;
            i2c.set_slave_address(self.address).map_err(bus_error)?;
            info!(
                "ADS1115 opened on I2C bus {} at {:#04x}",
                self.bus, self.address
            );
            self.i2c = Some(i2c);
        }
        self.i2c
            .as_mut()
            .ok_or_else(|| SensorError::Unavailable("I2C bus not open".to_string()))
    }

    async fn convert(&mut self, config: u16) -> Result<i32, SensorError> {
        let i2c = self.handle()?;
        let [hi, lo] = config.to_be_bytes();
        i2c.write(&[REG_CONFIG, hi, lo]).map_err(bus_error)?;

        tokio::time::sleep(CONVERSION_TIME).await;

        let mut raw = [0u8; 2];
        i2c.write_read(&[REG_CONVERSION], &mut raw)
            .map_err(bus_error)?;
        Ok(i32::from(i16::from_be_bytes(raw)))
    }
}

impl AxisSource for Ads1115 {
    async fn read_axis(&mut self, channel: u8) -> Result<i32, SensorError> {
        let config = single_shot_config(channel, self.gain)?;
        let result = self.convert(config).await;
        if result.is_err() && self.i2c.take().is_some() {
            debug!("Dropped I2C handle after failed read, reopening on next read");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_word_selects_channel_and_gain() {
        assert_eq!(single_shot_config(0, AdcGain::One).unwrap(), 0xC383);
        assert_eq!(single_shot_config(1, AdcGain::One).unwrap(), 0xD383);
        assert_eq!(single_shot_config(3, AdcGain::TwoThirds).unwrap(), 0xF183);
        assert_eq!(single_shot_config(2, AdcGain::Sixteen).unwrap(), 0xEB83);
    }

    #[test]
    fn rejects_differential_channel_numbers() {
        assert!(matches!(
            single_shot_config(4, AdcGain::One),
            Err(SensorError::InvalidChannel(4))
        ));
    }

    #[tokio::test]
    async fn missing_bus_is_reported_as_sensor_error() {
        let mut adc = Ads1115::new(250, 0x48, AdcGain::One);
        assert!(adc.read_axis(0).await.is_err());
        assert!(adc.i2c.is_none());
    }
}
