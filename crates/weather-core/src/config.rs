//! Station configuration
//!
//! Every tunable of the station lives in [`StationConfig`]. Firmware keeps it
//! in a flash sector as a postcard blob; the simulator builds it from
//! defaults or loads the same blob from disk.

use alloc::vec::Vec;

use embassy_time::Duration;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::sensors::bme680::{AirQualityWindow, Bme680Settings};
use crate::sensors::ccs811::Ccs811Settings;
use crate::sensors::sonometer::SonometerConfig;
use crate::sensors::veml6070::IntegrationTime;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
    #[error("failed to decode configuration blob")]
    Decode,
    #[error("failed to encode configuration blob")]
    Encode,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct StationConfig {
    /// Identifier sent with every upload
    pub hardware_device_id: u32,
    /// Added to the BME680 temperature, °C
    pub temperature_offset: f32,
    pub gas_warm_up_secs: u32,
    pub co2_warm_up_secs: u32,
    pub co2_compensation_interval_secs: u32,
    pub air_quality: AirQualityWindow,
    pub uv_integration_time: IntegrationTime,
    pub sonometer: SonometerConfig,
    pub read_interval_secs: u32,
    pub upload_interval_secs: u32,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            hardware_device_id: 1,
            temperature_offset: -1.0,
            gas_warm_up_secs: 300,
            co2_warm_up_secs: 1200,
            co2_compensation_interval_secs: 300,
            air_quality: AirQualityWindow::default(),
            uv_integration_time: IntegrationTime::OneT,
            sonometer: SonometerConfig::default(),
            read_interval_secs: 10,
            upload_interval_secs: 60,
        }
    }
}

const fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

impl StationConfig {
    /// Minimum spacing between two uploads
    pub const MIN_UPLOAD_INTERVAL_SECS: u32 = 60;

    /// Reject configurations the station cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.temperature_offset.is_finite() {
            return Err(invalid("temperature_offset", "must be finite"));
        }

        let window = &self.air_quality;
        if !(window.r_min_kohm.is_finite() && window.r_max_kohm.is_finite()) {
            return Err(invalid("air_quality", "resistance bounds must be finite"));
        }
        if window.r_min_kohm < 0.0 || window.r_max_kohm <= window.r_min_kohm {
            return Err(invalid("air_quality", "expected 0 <= r_min < r_max"));
        }

        if self.uv_integration_time.divisor() == 0 {
            return Err(invalid(
                "uv_integration_time",
                "no UV risk table for half-T integration",
            ));
        }

        let sonometer = &self.sonometer;
        if sonometer.samples == 0 {
            return Err(invalid("sonometer.samples", "must be at least 1"));
        }
        if !(sonometer.voltage_min.is_finite()
            && sonometer.voltage_max.is_finite()
            && sonometer.voltage_offset.is_finite()
            && sonometer.sensitivity_db.is_finite())
        {
            return Err(invalid("sonometer", "voltages must be finite"));
        }
        if sonometer.voltage_min > sonometer.voltage_max {
            return Err(invalid("sonometer", "voltage_min exceeds voltage_max"));
        }
        if sonometer.voltage_max <= sonometer.voltage_offset {
            return Err(invalid("sonometer", "voltage_max must exceed voltage_offset"));
        }

        if self.read_interval_secs == 0 {
            return Err(invalid("read_interval_secs", "must be at least 1"));
        }
        if self.upload_interval_secs < Self::MIN_UPLOAD_INTERVAL_SECS {
            return Err(invalid("upload_interval_secs", "must be at least 60"));
        }
        Ok(())
    }

    pub fn bme680_settings(&self) -> Bme680Settings {
        Bme680Settings {
            temperature_offset: self.temperature_offset,
            gas_warm_up: Duration::from_secs(u64::from(self.gas_warm_up_secs)),
            air_quality: self.air_quality,
        }
    }

    pub fn ccs811_settings(&self) -> Ccs811Settings {
        Ccs811Settings {
            warm_up: Duration::from_secs(u64::from(self.co2_warm_up_secs)),
            compensation_interval: Duration::from_secs(u64::from(
                self.co2_compensation_interval_secs,
            )),
        }
    }

    pub fn read_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.read_interval_secs))
    }

    pub fn upload_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.upload_interval_secs))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|_| ConfigError::Encode)
    }

    /// Decode and validate a persisted configuration.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Decode)?;
        config.validate()?;
        Ok(config)
    }
}
