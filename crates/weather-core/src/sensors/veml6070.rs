//! VEML6070 UV light sensor
//!
//! The device answers on two I2C addresses: commands and the low data byte at
//! `0x38`, the high data byte at `0x39`.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::{error, info};
use serde::{Deserialize, Serialize};

use super::{Sensor, SensorError, UvSensor};

pub const VEML6070_COMMAND_ADDRESS: u8 = 0x38;
pub const VEML6070_LSB_ADDRESS: u8 = 0x38;
pub const VEML6070_MSB_ADDRESS: u8 = 0x39;

const COMMAND_RESERVED: u8 = 0x02;
const SETTLE_MS: u32 = 100;
const BASELINE_SAMPLES: u32 = 10;

/// Integration time relative to the `T` set by the external resistor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrationTime {
    HalfT,
    #[default]
    OneT,
    TwoT,
    FourT,
}

impl IntegrationTime {
    /// `IT` bits of the command register
    pub const fn code(self) -> u8 {
        match self {
            IntegrationTime::HalfT => 0x00,
            IntegrationTime::OneT => 0x01,
            IntegrationTime::TwoT => 0x02,
            IntegrationTime::FourT => 0x03,
        }
    }

    /// Raw counts are divided by this before risk classification.
    ///
    /// Zero for `HalfT`, where no risk table exists.
    pub const fn divisor(self) -> u8 {
        match self {
            IntegrationTime::HalfT => 0,
            IntegrationTime::OneT => 1,
            IntegrationTime::TwoT => 2,
            IntegrationTime::FourT => 4,
        }
    }
}

/// Raw UV intensity; `None` when the adapter had nothing to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UvReadings {
    pub raw: Option<u16>,
}

pub struct Veml6070<I, D> {
    i2c: I,
    delay: D,
    integration_time: IntegrationTime,
    ack: bool,
    initialized: bool,
}

impl<I: I2c, D: DelayNs> Veml6070<I, D> {
    pub fn new(i2c: I, delay: D, integration_time: IntegrationTime) -> Self {
        Self {
            i2c,
            delay,
            integration_time,
            ack: false,
            initialized: false,
        }
    }

    pub const fn integration_time(&self) -> IntegrationTime {
        self.integration_time
    }

    pub const fn command_byte(&self) -> u8 {
        ((self.ack as u8) << 5) | (self.integration_time.code() << 2) | COMMAND_RESERVED
    }

    pub async fn initialize(&mut self) -> Result<(), SensorError> {
        let command = self.command_byte();
        self.i2c
            .write(VEML6070_COMMAND_ADDRESS, &[command])
            .await
            .map_err(|e| {
                error!("VEML6070 command write failed: {:?}", e);
                SensorError::InitializationFailed {
                    sensor: "VEML6070",
                    details: "failed to write command register",
                }
            })?;
        self.delay.delay_ms(SETTLE_MS).await;
        self.initialized = true;
        Ok(())
    }

    async fn read_byte(&mut self, address: u8) -> Result<u8, SensorError> {
        let mut byte = [0u8; 1];
        self.i2c.read(address, &mut byte).await.map_err(|e| {
            error!("VEML6070 read from 0x{:02x} failed: {:?}", address, e);
            SensorError::ReadFailed {
                sensor: "VEML6070",
                operation: "read UV data",
                details: "I2C communication error",
            }
        })?;
        Ok(byte[0])
    }

    pub async fn read_raw(&mut self) -> Result<u16, SensorError> {
        if !self.initialized {
            self.initialize().await?;
        }
        let msb = self.read_byte(VEML6070_MSB_ADDRESS).await?;
        let lsb = self.read_byte(VEML6070_LSB_ADDRESS).await?;
        Ok(u16::from_be_bytes([msb, lsb]))
    }

    /// Average of ten raw reads, for checking the dark baseline at install time.
    pub async fn baseline(&mut self) -> Result<u16, SensorError> {
        let mut sum = 0u32;
        for _ in 0..BASELINE_SAMPLES {
            sum += u32::from(self.read_raw().await?);
        }
        let baseline = (sum / BASELINE_SAMPLES) as u16;
        info!("VEML6070: baseline {}", baseline);
        Ok(baseline)
    }
}

impl<I: I2c, D: DelayNs> Sensor for Veml6070<I, D> {
    type Readings = UvReadings;
    const NAME: &'static str = "VEML6070";

    async fn read(&mut self) -> Result<UvReadings, SensorError> {
        let raw = self.read_raw().await?;
        Ok(UvReadings { raw: Some(raw) })
    }
}

impl<I: I2c, D: DelayNs> UvSensor for Veml6070<I, D> {
    fn integration_divisor(&self) -> u8 {
        self.integration_time.divisor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::mock::{MockI2c, NoopDelay};
    use embassy_futures::block_on;

    fn mock_device() -> MockI2c {
        MockI2c::new()
            .with_plain_read(VEML6070_MSB_ADDRESS, &[0x02])
            .with_plain_read(VEML6070_LSB_ADDRESS, &[0x58])
    }

    #[test]
    fn test_integration_time_table() {
        let divisors: [u8; 4] = [
            IntegrationTime::HalfT.divisor(),
            IntegrationTime::OneT.divisor(),
            IntegrationTime::TwoT.divisor(),
            IntegrationTime::FourT.divisor(),
        ];
        assert_eq!(divisors, [0, 1, 2, 4]);
        assert_eq!(IntegrationTime::default(), IntegrationTime::OneT);
    }

    #[test]
    fn test_command_byte() {
        let sensor = Veml6070::new(MockI2c::new(), NoopDelay, IntegrationTime::OneT);
        assert_eq!(sensor.command_byte(), 0x06);

        let sensor = Veml6070::new(MockI2c::new(), NoopDelay, IntegrationTime::FourT);
        assert_eq!(sensor.command_byte(), 0x0E);
    }

    #[test]
    fn test_read_combines_both_addresses() {
        let mut sensor = Veml6070::new(mock_device(), NoopDelay, IntegrationTime::OneT);
        let readings = block_on(sensor.read()).unwrap();

        assert_eq!(readings.raw, Some(600));
        assert!(sensor.i2c.wrote(VEML6070_COMMAND_ADDRESS, &[0x06]));
        assert_eq!(sensor.integration_divisor(), 1);
    }

    #[test]
    fn test_baseline_average() {
        let mut sensor = Veml6070::new(mock_device(), NoopDelay, IntegrationTime::TwoT);
        assert_eq!(block_on(sensor.baseline()).unwrap(), 600);
    }

    #[test]
    fn test_bus_failure() {
        let mut device = mock_device();
        device.fail = true;
        let mut sensor = Veml6070::new(device, NoopDelay, IntegrationTime::OneT);

        assert!(matches!(
            block_on(sensor.read()),
            Err(SensorError::InitializationFailed { sensor: "VEML6070", .. })
        ));
    }
}
