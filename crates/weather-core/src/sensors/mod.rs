//! Sensor capability traits and device adapters
//!
//! Every physical sensor is wrapped in an adapter implementing [`Sensor`],
//! which returns typed, physically calibrated readings. The read orchestrator
//! only talks to these traits, so adapters can be real drivers or simulated
//! devices.

pub mod bh1750;
pub mod bme680;
pub mod bus;
pub mod calibration;
pub mod ccs811;
pub mod sonometer;
pub mod veml6070;

#[cfg(test)]
pub(crate) mod mock;

use embassy_time::Instant;
use thiserror_no_std::Error;

pub use bh1750::{Bh1750, LightReadings};
pub use bme680::{Bme680, EnvironmentalReadings};
pub use bus::{I2cRegisterBus, RegisterBus, SpiRegisterBus};
pub use calibration::{CalibrationState, WarmUpGate};
pub use ccs811::{Ccs811, GasQualityReadings};
pub use sonometer::{AnalogInput, Sonometer, SoundReadings};
pub use veml6070::{IntegrationTime, UvReadings, Veml6070};

/// Transient sensor failures. None of these abort a read cycle.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: {operation} failed ({details})")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: initialization failed ({details})")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: timed out during {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor}: not ready")]
    NotReady { sensor: &'static str },
    #[error("{sensor}: invalid data ({details})")]
    InvalidData {
        sensor: &'static str,
        details: &'static str,
    },
}

/// Trait for sensors that produce typed readings.
pub trait Sensor {
    /// The type of readings this sensor produces.
    type Readings;

    /// Short name used in logs and reports
    const NAME: &'static str;

    /// Read the sensor and return typed readings.
    fn read(&mut self) -> impl Future<Output = Result<Self::Readings, SensorError>>;
}

/// Temperature, humidity, pressure and gas resistance in one transaction.
pub trait EnvironmentalSensor: Sensor<Readings = EnvironmentalReadings> {
    /// Whether the gas heater has stabilized.
    ///
    /// The warm-up window starts at the first call.
    fn is_gas_ready(&mut self, now: Instant) -> bool;
}

/// CO2/TVOC device that accepts environmental compensation data.
pub trait GasQualitySensor: Sensor<Readings = GasQualityReadings> {
    /// Data available and the device-internal warm-up has elapsed
    fn is_ready(&mut self, now: Instant) -> impl Future<Output = Result<bool, SensorError>>;

    /// Whether enough time passed since the last compensation write
    fn compensation_due(&self, now: Instant) -> bool;

    /// Push temperature (°C) and relative humidity (%) to the device
    fn compensate(
        &mut self,
        now: Instant,
        temperature: f32,
        humidity: f32,
    ) -> impl Future<Output = Result<(), SensorError>>;
}

/// Raw UV intensity sensor
pub trait UvSensor: Sensor<Readings = UvReadings> {
    /// Divisor of the configured integration time; zero when the UV index
    /// is undefined for it.
    fn integration_divisor(&self) -> u8;
}

/// Ambient light sensor
pub trait LightSensor: Sensor<Readings = LightReadings> {}

/// Sound pressure level sensor
pub trait SoundSensor: Sensor<Readings = SoundReadings> {}
