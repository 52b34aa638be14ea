//! BH1750 ambient light sensor

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::{debug, error};

use super::{LightSensor, Sensor, SensorError};

pub const BH1750_DEFAULT_ADDRESS: u8 = 0x23;

pub const MEASUREMENT_TIME_DEFAULT: u8 = 69;
pub const MEASUREMENT_TIME_MIN: u8 = 31;
pub const MEASUREMENT_TIME_MAX: u8 = 254;

/// Photodiode area in mm² (0.25 mm × 0.3 mm)
pub const PHOTODIODE_AREA_MM2: f32 = 0.25 * 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementMode {
    Continuous = 1,
    OneTime = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 1 lx steps
    High = 0,
    /// 0.5 lx steps
    High2 = 1,
    /// 4 lx steps
    Low = 2,
}

impl Resolution {
    /// Worst-case conversion time at the default measurement time.
    const fn max_conversion_ms(self) -> u32 {
        match self {
            Resolution::Low => 24,
            Resolution::High | Resolution::High2 => 180,
        }
    }
}

/// Convert a raw count to lux for the given measurement time register.
pub fn raw_to_lux(raw: u16, measurement_time: u8, resolution: Resolution) -> f32 {
    let scale = f32::from(MEASUREMENT_TIME_DEFAULT) / f32::from(measurement_time);
    let lux = f32::from(raw) / (1.2 * scale);
    match resolution {
        Resolution::High2 => lux / 2.0,
        Resolution::High | Resolution::Low => lux,
    }
}

/// Luminous flux over the photodiode area; negative input has no meaning.
pub fn lux_to_lumens(lux: f32) -> Option<f32> {
    let lumens = lux * PHOTODIODE_AREA_MM2;
    (lumens >= 0.0).then_some(lumens)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightReadings {
    pub lux: f32,
    pub lumens: Option<f32>,
}

pub struct Bh1750<I, D> {
    i2c: I,
    delay: D,
    address: u8,
    mode: MeasurementMode,
    resolution: Resolution,
    measurement_time: u8,
    configured: bool,
}

impl<I: I2c, D: DelayNs> Bh1750<I, D> {
    /// One-time, high resolution measurements at the default measurement time
    pub fn new(i2c: I, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            mode: MeasurementMode::OneTime,
            resolution: Resolution::High,
            measurement_time: MEASUREMENT_TIME_DEFAULT,
            configured: false,
        }
    }

    /// Change mode, resolution and measurement time. Applied on the next read.
    pub fn configure(
        &mut self,
        mode: MeasurementMode,
        resolution: Resolution,
        measurement_time: u8,
    ) -> Result<(), SensorError> {
        if !(MEASUREMENT_TIME_MIN..=MEASUREMENT_TIME_MAX).contains(&measurement_time) {
            return Err(SensorError::InvalidData {
                sensor: "BH1750",
                details: "measurement time must be within 31..=254",
            });
        }
        self.mode = mode;
        self.resolution = resolution;
        self.measurement_time = measurement_time;
        self.configured = false;
        Ok(())
    }

    async fn send(&mut self, command: u8, operation: &'static str) -> Result<(), SensorError> {
        self.i2c.write(self.address, &[command]).await.map_err(|e| {
            error!("BH1750 {} failed: {:?}", operation, e);
            SensorError::ReadFailed {
                sensor: "BH1750",
                operation,
                details: "I2C communication error",
            }
        })
    }

    async fn write_measurement_time(&mut self) -> Result<(), SensorError> {
        let high = (0b01 << 6) | (self.measurement_time >> 5);
        let low = (0b011 << 5) | (self.measurement_time & 0x1F);
        self.send(high, "write measurement time (high)").await?;
        self.send(low, "write measurement time (low)").await
    }

    async fn write_measurement_mode(&mut self) -> Result<(), SensorError> {
        let command = ((self.mode as u8) << 4) | self.resolution as u8;
        self.send(command, "write measurement mode").await?;

        let wait = (self.resolution.max_conversion_ms() * u32::from(self.measurement_time))
            .div_ceil(u32::from(MEASUREMENT_TIME_DEFAULT));
        self.delay.delay_ms(wait).await;
        Ok(())
    }

    pub async fn read_lux(&mut self) -> Result<f32, SensorError> {
        if !self.configured {
            self.write_measurement_time().await?;
            self.write_measurement_mode().await?;
            self.configured = true;
        } else if self.mode == MeasurementMode::OneTime {
            self.write_measurement_mode().await?;
        }

        let mut raw = [0u8; 2];
        self.i2c.read(self.address, &mut raw).await.map_err(|e| {
            error!("BH1750 measurement read failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: "BH1750",
                operation: "read measurement",
                details: "I2C communication error",
            }
        })?;

        let lux = raw_to_lux(u16::from_be_bytes(raw), self.measurement_time, self.resolution);
        debug!("BH1750: {} lx", lux);
        Ok(lux)
    }
}

impl<I: I2c, D: DelayNs> Sensor for Bh1750<I, D> {
    type Readings = LightReadings;
    const NAME: &'static str = "BH1750";

    async fn read(&mut self) -> Result<LightReadings, SensorError> {
        let lux = self.read_lux().await?;
        Ok(LightReadings {
            lux,
            lumens: lux_to_lumens(lux),
        })
    }
}

impl<I: I2c, D: DelayNs> LightSensor for Bh1750<I, D> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::mock::{MockI2c, NoopDelay};
    use embassy_futures::block_on;

    fn sensor(raw: [u8; 2]) -> Bh1750<MockI2c, NoopDelay> {
        let device = MockI2c::new().with_plain_read(BH1750_DEFAULT_ADDRESS, &raw);
        Bh1750::new(device, NoopDelay, BH1750_DEFAULT_ADDRESS)
    }

    #[test]
    fn test_lux_conversion() {
        let high = raw_to_lux(1200, MEASUREMENT_TIME_DEFAULT, Resolution::High);
        let high2 = raw_to_lux(1200, MEASUREMENT_TIME_DEFAULT, Resolution::High2);
        assert!((high - 1000.0).abs() < 0.01);
        assert!((high2 - 500.0).abs() < 0.01);
        assert!((raw_to_lux(1200, 138, Resolution::High) - 2000.0).abs() < 0.01);
    }

    #[test]
    fn test_lumens() {
        assert_eq!(lux_to_lumens(0.0), Some(0.0));
        assert!((lux_to_lumens(1000.0).unwrap() - 75.0).abs() < 1e-4);
        assert_eq!(lux_to_lumens(-1.0), None);
    }

    #[test]
    fn test_first_read_configures_device() {
        let mut sensor = sensor([0x04, 0xB0]);
        let readings = block_on(sensor.read()).unwrap();

        assert!((readings.lux - 1000.0).abs() < 0.01);
        assert!((readings.lumens.unwrap() - 75.0).abs() < 1e-3);
        assert!(sensor.i2c.wrote(BH1750_DEFAULT_ADDRESS, &[0x42]));
        assert!(sensor.i2c.wrote(BH1750_DEFAULT_ADDRESS, &[0x65]));
        assert!(sensor.i2c.wrote(BH1750_DEFAULT_ADDRESS, &[0x20]));
    }

    #[test]
    fn test_one_time_mode_retriggers_each_read() {
        let mut sensor = sensor([0x00, 0x10]);
        block_on(sensor.read()).unwrap();
        block_on(sensor.read()).unwrap();

        let triggers = sensor
            .i2c
            .writes
            .iter()
            .filter(|(_, bytes)| bytes.as_slice() == [0x20])
            .count();
        assert_eq!(triggers, 2);
    }

    #[test]
    fn test_configure_rejects_measurement_time() {
        let mut sensor = sensor([0, 0]);
        assert!(sensor.configure(MeasurementMode::Continuous, Resolution::Low, 30).is_err());
        assert!(sensor.configure(MeasurementMode::Continuous, Resolution::Low, 255).is_err());
        assert!(sensor.configure(MeasurementMode::Continuous, Resolution::High2, 254).is_ok());
    }
}
