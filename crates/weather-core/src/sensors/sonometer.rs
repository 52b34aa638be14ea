//! Analog microphone sound level meter
//!
//! A block of voltage samples is reduced to one sound level per read cycle.
//! The default peak-linear mode is a responsive approximation, not a
//! calibrated acoustic model.

use embedded_hal_async::delay::DelayNs;
use log::{debug, error};
use serde::{Deserialize, Serialize};

use super::{Sensor, SensorError, SoundSensor};

/// Level reported for a silent (zero RMS) block
pub const SILENCE_DB: f32 = -100.0;

/// Instantaneous voltage source, typically an ADC channel.
pub trait AnalogInput {
    type Error: core::fmt::Debug;

    fn read_voltage(&mut self) -> Result<f32, Self::Error>;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoundMode {
    /// Running maximum mapped linearly onto 0..=100
    #[default]
    PeakLinear,
    /// RMS around the bias voltage converted to dB SPL
    Rms,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SonometerConfig {
    pub samples: u16,
    pub sample_interval_ms: u32,
    /// Lower bound of the clamping window, V
    pub voltage_min: f32,
    /// Upper bound of the clamping window and RMS reference, V
    pub voltage_max: f32,
    /// Microphone bias voltage at silence, V
    pub voltage_offset: f32,
    /// Microphone sensitivity, dB re 1 V/Pa
    pub sensitivity_db: f32,
    pub mode: SoundMode,
}

impl Default for SonometerConfig {
    fn default() -> Self {
        Self {
            samples: 100,
            sample_interval_ms: 50,
            voltage_min: 1.25,
            voltage_max: 2.0,
            voltage_offset: 1.25,
            sensitivity_db: -42.0,
            mode: SoundMode::PeakLinear,
        }
    }
}

impl SonometerConfig {
    /// Map the block maximum onto 0..=100 after clamping it to the window.
    ///
    /// An inverted window does not panic; the upper bound wins.
    pub fn peak_to_db(&self, peak_voltage: f32) -> f32 {
        let clamped = peak_voltage.max(self.voltage_min).min(self.voltage_max);
        (clamped - self.voltage_offset) / (self.voltage_max - self.voltage_offset) * 100.0
    }

    /// Sound pressure level from the RMS voltage around the bias.
    pub fn rms_to_db_spl(&self, rms: f32) -> f32 {
        if rms == 0.0 {
            return SILENCE_DB;
        }
        rms_to_db(rms, self.voltage_max) + libm::fabsf(self.sensitivity_db)
    }
}

/// dB relative to `reference`, or [`SILENCE_DB`] for a zero RMS.
pub fn rms_to_db(rms: f32, reference: f32) -> f32 {
    if rms == 0.0 {
        return SILENCE_DB;
    }
    20.0 * libm::log10f(rms / reference)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SoundReadings {
    pub db_spl: f32,
}

pub struct Sonometer<A, D> {
    input: A,
    delay: D,
    config: SonometerConfig,
}

impl<A: AnalogInput, D: DelayNs> Sonometer<A, D> {
    pub fn new(input: A, delay: D, config: SonometerConfig) -> Self {
        Self {
            input,
            delay,
            config,
        }
    }

    pub fn config(&self) -> &SonometerConfig {
        &self.config
    }

    fn sample(&mut self) -> Result<f32, SensorError> {
        self.input.read_voltage().map_err(|e| {
            error!("Sonometer ADC read failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: "Sonometer",
                operation: "read analog sample",
                details: "ADC error",
            }
        })
    }
}

impl<A: AnalogInput, D: DelayNs> Sensor for Sonometer<A, D> {
    type Readings = SoundReadings;
    const NAME: &'static str = "Sonometer";

    async fn read(&mut self) -> Result<SoundReadings, SensorError> {
        let samples = self.config.samples;
        if samples == 0 {
            return Err(SensorError::InvalidData {
                sensor: "Sonometer",
                details: "sample block is empty",
            });
        }

        let mut peak = f32::MIN;
        let mut sum_squares = 0.0f32;
        for i in 0..samples {
            let voltage = self.sample()?;
            peak = peak.max(voltage);
            let centered = voltage - self.config.voltage_offset;
            sum_squares += centered * centered;

            if i + 1 < samples {
                self.delay.delay_ms(self.config.sample_interval_ms).await;
            }
        }

        let db_spl = match self.config.mode {
            SoundMode::PeakLinear => self.config.peak_to_db(peak),
            SoundMode::Rms => {
                let rms = libm::sqrtf(sum_squares / f32::from(samples));
                self.config.rms_to_db_spl(rms)
            }
        };
        debug!("Sonometer: peak {} V -> {} dB", peak, db_spl);

        Ok(SoundReadings { db_spl })
    }
}

impl<A: AnalogInput, D: DelayNs> SoundSensor for Sonometer<A, D> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::mock::NoopDelay;
    use embassy_futures::block_on;

    /// Replays a fixed voltage sequence, cycling when exhausted.
    struct Replay {
        voltages: &'static [f32],
        next: usize,
        fail_at: Option<usize>,
    }

    impl Replay {
        fn new(voltages: &'static [f32]) -> Self {
            Self {
                voltages,
                next: 0,
                fail_at: None,
            }
        }
    }

    impl AnalogInput for Replay {
        type Error = ();

        fn read_voltage(&mut self) -> Result<f32, ()> {
            if self.fail_at == Some(self.next) {
                return Err(());
            }
            let v = self.voltages[self.next % self.voltages.len()];
            self.next += 1;
            Ok(v)
        }
    }

    fn config(samples: u16, mode: SoundMode) -> SonometerConfig {
        SonometerConfig {
            samples,
            mode,
            ..SonometerConfig::default()
        }
    }

    #[test]
    fn test_peak_linear_mapping() {
        let config = SonometerConfig::default();
        assert_eq!(config.peak_to_db(1.25), 0.0);
        assert_eq!(config.peak_to_db(0.4), 0.0);
        assert_eq!(config.peak_to_db(2.0), 100.0);
        assert_eq!(config.peak_to_db(3.3), 100.0);
        assert!((config.peak_to_db(1.625) - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_inverted_window_does_not_panic() {
        let config = SonometerConfig {
            voltage_min: 2.0,
            voltage_max: 1.5,
            ..SonometerConfig::default()
        };
        assert!((config.peak_to_db(1.8) - 100.0).abs() < 1e-4);
        assert!((config.peak_to_db(0.0) - 100.0).abs() < 1e-4);

        let input = Replay::new(&[1.3, 1.4]);
        let inverted = SonometerConfig { samples: 4, ..config };
        let mut sonometer = Sonometer::new(input, NoopDelay, inverted);
        let readings = block_on(sonometer.read()).unwrap();
        assert!((readings.db_spl - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_rms_conversion() {
        assert_eq!(rms_to_db(0.0, 2.0), SILENCE_DB);
        assert!((rms_to_db(2.0, 2.0)).abs() < 1e-6);
        assert!((rms_to_db(0.2, 2.0) + 20.0).abs() < 1e-4);

        let config = SonometerConfig::default();
        assert!((config.rms_to_db_spl(0.2) - 22.0).abs() < 1e-4);
        assert_eq!(config.rms_to_db_spl(0.0), SILENCE_DB);
    }

    #[test]
    fn test_block_tracks_peak() {
        let input = Replay::new(&[1.3, 1.5, 1.625, 1.4]);
        let mut sonometer = Sonometer::new(input, NoopDelay, config(4, SoundMode::PeakLinear));

        let readings = block_on(sonometer.read()).unwrap();
        assert!((readings.db_spl - 50.0).abs() < 1e-4);
        assert_eq!(sonometer.input.next, 4);
    }

    #[test]
    fn test_rms_block() {
        // Square wave of ±0.2 V around the bias
        let input = Replay::new(&[1.45, 1.05]);
        let mut sonometer = Sonometer::new(input, NoopDelay, config(10, SoundMode::Rms));

        let readings = block_on(sonometer.read()).unwrap();
        assert!((readings.db_spl - 22.0).abs() < 1e-3);
    }

    #[test]
    fn test_failed_sample_fails_block() {
        let mut input = Replay::new(&[1.5]);
        input.fail_at = Some(3);
        let mut sonometer = Sonometer::new(input, NoopDelay, config(10, SoundMode::PeakLinear));

        assert!(matches!(
            block_on(sonometer.read()),
            Err(SensorError::ReadFailed { sensor: "Sonometer", .. })
        ));
    }

    #[test]
    fn test_empty_block_is_invalid() {
        let input = Replay::new(&[1.5]);
        let mut sonometer = Sonometer::new(input, NoopDelay, config(0, SoundMode::Rms));
        assert!(matches!(
            block_on(sonometer.read()),
            Err(SensorError::InvalidData { .. })
        ));
    }
}
