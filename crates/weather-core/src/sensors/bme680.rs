//! BME680 temperature, pressure, humidity and gas-resistance sensor
//!
//! Raw ADC values are compensated in floating point with the factory
//! calibration coefficients read at initialization. The gas channel is only
//! trustworthy once the hot plate has stabilized, which [`WarmUpGate`] tracks.

use embassy_time::{Duration, Instant};
use embedded_hal_async::delay::DelayNs;
use log::{error, info};
use serde::{Deserialize, Serialize};

use super::bus::RegisterBus;
use super::calibration::WarmUpGate;
use super::{EnvironmentalSensor, Sensor, SensorError};

pub const BME680_DEFAULT_ADDRESS: u8 = 0x77;
pub const SEA_LEVEL_PRESSURE_HPA: f32 = 1013.25;

const CHIP_ID: u8 = 0x61;
const REG_CHIP_ID: u8 = 0xD0;
const REG_COEFF_1: u8 = 0x89;
const REG_COEFF_2: u8 = 0xE1;
const REG_RANGE_SW_ERR: u8 = 0x04;
const REG_RES_HEAT_0: u8 = 0x5A;
const REG_GAS_WAIT_0: u8 = 0x64;
const REG_SOFT_RESET: u8 = 0xE0;
const REG_CTRL_GAS: u8 = 0x71;
const REG_CTRL_HUM: u8 = 0x72;
const REG_CTRL_MEAS: u8 = 0x74;
const REG_CONFIG: u8 = 0x75;
const REG_MEAS_STATUS: u8 = 0x1D;

const SOFT_RESET_CMD: u8 = 0xB6;
const RUN_GAS: u8 = 0x10;
const NEW_DATA: u8 = 0x80;
const HEATER_RESISTANCE: u8 = 0x73;
const HEATER_WAIT: u8 = 0x65;

const OVERSAMPLE_PRESSURE: u8 = 0b011;
const OVERSAMPLE_TEMPERATURE: u8 = 0b100;
const OVERSAMPLE_HUMIDITY: u8 = 0b010;
const IIR_FILTER: u8 = 0b010;

const COEFF_1_LEN: usize = 25;
const COEFF_2_LEN: usize = 16;
const MEASUREMENT_LEN: usize = 15;
const MAX_POLL_ATTEMPTS: u8 = 50;
const POLL_INTERVAL_MS: u32 = 5;

const GAS_RANGE_LOOKUP_1: [f64; 16] = [
    2147483647.0,
    2147483647.0,
    2147483647.0,
    2147483647.0,
    2147483647.0,
    2126008810.0,
    2147483647.0,
    2130303777.0,
    2147483647.0,
    2147483647.0,
    2143188679.0,
    2136746228.0,
    2147483647.0,
    2126008810.0,
    2147483647.0,
    2147483647.0,
];

const GAS_RANGE_LOOKUP_2: [f64; 16] = [
    4096000000.0,
    2048000000.0,
    1024000000.0,
    512000000.0,
    255744255.0,
    127110228.0,
    64000000.0,
    32258064.0,
    16016016.0,
    8000000.0,
    4000000.0,
    2000000.0,
    1000000.0,
    500000.0,
    250000.0,
    125000.0,
];

/// Factory calibration coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bme680Calibration {
    par_t: [f64; 3],
    par_p: [f64; 10],
    par_h: [f64; 7],
    range_switching_error: f64,
}

impl Bme680Calibration {
    /// Length of the two coefficient blocks read back to back
    pub const COEFFICIENT_LEN: usize = COEFF_1_LEN + COEFF_2_LEN;

    /// Decode the coefficient blocks at `0x89` (25 bytes) and `0xE1` (16 bytes)
    /// plus the range switching error register.
    pub fn from_registers(coeff: &[u8; Self::COEFFICIENT_LEN], range_sw_err: u8) -> Self {
        let u16_at = |i: usize| f64::from(u16::from_le_bytes([coeff[i], coeff[i + 1]]));
        let i16_at = |i: usize| f64::from(i16::from_le_bytes([coeff[i], coeff[i + 1]]));
        let i8_at = |i: usize| f64::from(coeff[i] as i8);
        let u8_at = |i: usize| f64::from(coeff[i]);

        // H1 and H2 share the nibbles of 0xE2
        let par_h1 = f64::from((u16::from(coeff[27]) << 4) | u16::from(coeff[26] & 0x0F));
        let par_h2 = f64::from((u16::from(coeff[25]) << 4) | u16::from(coeff[26] >> 4));

        Self {
            par_t: [u16_at(33), i16_at(1), i8_at(3)],
            par_p: [
                u16_at(5),
                i16_at(7),
                i8_at(9),
                i16_at(11),
                i16_at(13),
                i8_at(16),
                i8_at(15),
                i16_at(19),
                i16_at(21),
                u8_at(23),
            ],
            par_h: [
                par_h1,
                par_h2,
                i8_at(28),
                i8_at(29),
                i8_at(30),
                u8_at(31),
                i8_at(32),
            ],
            range_switching_error: f64::from((range_sw_err & 0xF0) >> 4),
        }
    }

    fn t_fine(&self, adc_temperature: f64) -> f64 {
        let [t1, t2, t3] = self.par_t;
        let var1 = adc_temperature / 8.0 - t1 * 2.0;
        let var2 = var1 * t2 / 2048.0;
        let var3 = (var1 / 2.0) * (var1 / 2.0) / 4096.0;
        let var3 = var3 * t3 * 16.0 / 16384.0;
        libm::trunc(var2 + var3)
    }

    /// Temperature in °C, without any offset.
    fn temperature(t_fine: f64) -> f64 {
        (t_fine * 5.0 + 128.0) / 256.0 / 100.0
    }

    /// Pressure in hPa (mbar).
    fn pressure(&self, t_fine: f64, adc_pressure: f64) -> f64 {
        let p = &self.par_p;

        let var1 = t_fine / 2.0 - 64000.0;
        let var2 = (var1 / 4.0) * (var1 / 4.0) / 2048.0;
        let var2 = var2 * p[5] / 4.0;
        let var2 = var2 + var1 * p[4] * 2.0;
        let var2 = var2 / 4.0 + p[3] * 65536.0;
        let var1 = ((var1 / 4.0) * (var1 / 4.0) / 8192.0) * (p[2] * 32.0) / 8.0 + p[1] * var1 / 2.0;
        let var1 = var1 / 262144.0;
        let var1 = (32768.0 + var1) * p[0] / 32768.0;

        let mut calc = 1048576.0 - adc_pressure;
        calc = (calc - var2 / 4096.0) * 3125.0;
        calc = calc / var1 * 2.0;

        let var1 = p[8] * ((calc / 8.0) * (calc / 8.0) / 8192.0) / 4096.0;
        let var2 = (calc / 4.0) * p[7] / 8192.0;
        let var3 = libm::pow(calc / 256.0, 3.0) * p[9] / 131072.0;
        calc += (var1 + var2 + var3 + p[6] * 128.0) / 16.0;

        calc / 100.0
    }

    /// Relative humidity in %, clamped to 0..=100.
    fn humidity(&self, t_fine: f64, adc_humidity: f64) -> f64 {
        let h = &self.par_h;
        let temp_scaled = (t_fine * 5.0 + 128.0) / 256.0;

        let var1 = (adc_humidity - h[0] * 16.0) - temp_scaled * h[2] / 200.0;
        let var2 = h[1]
            * (temp_scaled * h[3] / 100.0
                + temp_scaled * (temp_scaled * h[4] / 100.0) / 64.0 / 100.0
                + 16384.0)
            / 1024.0;
        let var3 = var1 * var2;
        let var4 = (h[5] * 128.0 + temp_scaled * h[6] / 100.0) / 16.0;
        let var5 = (var3 / 16384.0) * (var3 / 16384.0) / 1024.0;
        let var6 = var4 * var5 / 2.0;

        let calc = (var3 + var6) / 1024.0 * 1000.0 / 4096.0 / 1000.0;
        calc.clamp(0.0, 100.0)
    }

    /// Gas resistance in Ω, truncated to a whole number.
    fn gas_resistance(&self, adc_gas: f64, gas_range: usize) -> f64 {
        let range = gas_range & 0x0F;
        let var1 =
            (1340.0 + 5.0 * self.range_switching_error) * GAS_RANGE_LOOKUP_1[range] / 65536.0;
        let var2 = adc_gas * 32768.0 - 16777216.0 + var1;
        let var3 = GAS_RANGE_LOOKUP_2[range] * var1 / 512.0;
        libm::trunc((var3 + var2 / 2.0) / var2)
    }

    pub fn compensate(&self, raw: &RawMeasurement) -> CompensatedMeasurement {
        let t_fine = self.t_fine(raw.adc_temperature);

        CompensatedMeasurement {
            temperature: Self::temperature(t_fine) as f32,
            pressure: self.pressure(t_fine, raw.adc_pressure) as f32,
            humidity: self.humidity(t_fine, raw.adc_humidity) as f32,
            gas_resistance: self.gas_resistance(raw.adc_gas, raw.gas_range) as f32,
        }
    }
}

/// ADC values of one forced-mode measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMeasurement {
    pub adc_temperature: f64,
    pub adc_pressure: f64,
    pub adc_humidity: f64,
    pub adc_gas: f64,
    pub gas_range: usize,
}

impl RawMeasurement {
    /// Decode the 15-byte block starting at the measurement status register.
    ///
    /// Returns `None` while the new-data flag is clear.
    pub fn parse(data: &[u8; MEASUREMENT_LEN]) -> Option<Self> {
        if data[0] & NEW_DATA == 0 {
            return None;
        }

        let read20 = |i: usize| {
            let raw = (u32::from(data[i]) << 16)
                | (u32::from(data[i + 1]) << 8)
                | u32::from(data[i + 2]);
            f64::from(raw) / 16.0
        };

        Some(Self {
            adc_pressure: read20(2),
            adc_temperature: read20(5),
            adc_humidity: f64::from(u16::from_be_bytes([data[8], data[9]])),
            adc_gas: f64::from(u16::from_be_bytes([data[13], data[14]]) >> 6),
            gas_range: usize::from(data[14] & 0x0F),
        })
    }
}

/// Compensated physical values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompensatedMeasurement {
    /// °C
    pub temperature: f32,
    /// hPa
    pub pressure: f32,
    /// % relative humidity
    pub humidity: f32,
    /// Ω
    pub gas_resistance: f32,
}

/// Altitude in metres from barometric pressure.
pub fn altitude(pressure_hpa: f32, sea_level_hpa: f32) -> f32 {
    let ratio = f64::from(pressure_hpa) / f64::from(sea_level_hpa);
    (44330.0 * (1.0 - libm::pow(ratio, 0.1903))) as f32
}

/// Gas-resistance window mapped onto the 0..=100 air-quality index.
///
/// A higher resistance means cleaner air.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AirQualityWindow {
    /// Resistance of heavily polluted air, kΩ
    pub r_min_kohm: f32,
    /// Resistance of clean air, kΩ
    pub r_max_kohm: f32,
}

impl Default for AirQualityWindow {
    fn default() -> Self {
        Self {
            r_min_kohm: 100.0,
            r_max_kohm: 500.0,
        }
    }
}

impl AirQualityWindow {
    /// Air-quality index for a gas resistance in Ω, rounded to a whole number.
    ///
    /// Always within `0..=100`, even for a window that was never validated.
    pub fn index(&self, gas_resistance_ohms: f32) -> f32 {
        let kohm = (gas_resistance_ohms / 1000.0)
            .max(self.r_min_kohm)
            .min(self.r_max_kohm);
        let iaq = (kohm - self.r_min_kohm) / (self.r_max_kohm - self.r_min_kohm) * 100.0;
        // f32::max maps NaN (empty window) to the lower bound
        libm::roundf(iaq.max(0.0).min(100.0))
    }
}

/// Typed readings from the BME680.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvironmentalReadings {
    pub temperature: Option<f32>,
    pub pressure: Option<f32>,
    pub humidity: Option<f32>,
    pub gas_resistance: Option<f32>,
    pub air_quality: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bme680Settings {
    /// Added to every compensated temperature, °C
    pub temperature_offset: f32,
    pub gas_warm_up: Duration,
    pub air_quality: AirQualityWindow,
}

impl Default for Bme680Settings {
    fn default() -> Self {
        Self {
            temperature_offset: -1.0,
            gas_warm_up: Duration::from_secs(300),
            air_quality: AirQualityWindow::default(),
        }
    }
}

pub struct Bme680<B, D> {
    bus: B,
    delay: D,
    settings: Bme680Settings,
    calibration: Option<Bme680Calibration>,
    gas_gate: WarmUpGate,
}

fn bus_failure<E: core::fmt::Debug>(operation: &'static str) -> impl FnOnce(E) -> SensorError {
    move |e| {
        error!("BME680 {} failed: {:?}", operation, e);
        SensorError::ReadFailed {
            sensor: "BME680",
            operation,
            details: "register bus error",
        }
    }
}

impl<B: RegisterBus, D: DelayNs> Bme680<B, D> {
    pub fn new(bus: B, delay: D, settings: Bme680Settings) -> Self {
        Self {
            bus,
            delay,
            calibration: None,
            gas_gate: WarmUpGate::new(settings.gas_warm_up),
            settings,
        }
    }

    pub fn calibration(&self) -> Option<&Bme680Calibration> {
        self.calibration.as_ref()
    }

    /// Soft reset, chip id check, calibration readout and heater setup.
    pub async fn initialize(&mut self) -> Result<(), SensorError> {
        self.bus
            .write_register(REG_SOFT_RESET, SOFT_RESET_CMD)
            .await
            .map_err(bus_failure("soft reset"))?;
        self.delay.delay_ms(5).await;

        let mut id = [0u8; 1];
        self.bus
            .read_registers(REG_CHIP_ID, &mut id)
            .await
            .map_err(bus_failure("read chip id"))?;
        if id[0] != CHIP_ID {
            error!("BME680 unexpected chip id 0x{:02x}", id[0]);
            return Err(SensorError::InitializationFailed {
                sensor: "BME680",
                details: "unexpected chip id",
            });
        }

        let mut coeff = [0u8; Bme680Calibration::COEFFICIENT_LEN];
        let (first, second) = coeff.split_at_mut(COEFF_1_LEN);
        self.bus
            .read_registers(REG_COEFF_1, first)
            .await
            .map_err(bus_failure("read calibration block 1"))?;
        self.bus
            .read_registers(REG_COEFF_2, second)
            .await
            .map_err(bus_failure("read calibration block 2"))?;

        let mut sw_err = [0u8; 1];
        self.bus
            .read_registers(REG_RANGE_SW_ERR, &mut sw_err)
            .await
            .map_err(bus_failure("read range switching error"))?;

        self.bus
            .write_register(REG_RES_HEAT_0, HEATER_RESISTANCE)
            .await
            .map_err(bus_failure("configure heater"))?;
        self.bus
            .write_register(REG_GAS_WAIT_0, HEATER_WAIT)
            .await
            .map_err(bus_failure("configure heater wait"))?;

        self.calibration = Some(Bme680Calibration::from_registers(&coeff, sw_err[0]));
        info!("BME680: calibration loaded");
        Ok(())
    }

    /// Trigger one forced-mode measurement and wait for the new-data flag.
    async fn measure(&mut self) -> Result<RawMeasurement, SensorError> {
        self.bus
            .write_register(REG_CONFIG, IIR_FILTER << 2)
            .await
            .map_err(bus_failure("write filter config"))?;
        self.bus
            .write_register(
                REG_CTRL_MEAS,
                (OVERSAMPLE_TEMPERATURE << 5) | (OVERSAMPLE_PRESSURE << 2),
            )
            .await
            .map_err(bus_failure("write oversampling"))?;
        self.bus
            .write_register(REG_CTRL_HUM, OVERSAMPLE_HUMIDITY)
            .await
            .map_err(bus_failure("write humidity oversampling"))?;
        self.bus
            .write_register(REG_CTRL_GAS, RUN_GAS)
            .await
            .map_err(bus_failure("enable gas conversion"))?;

        let mut ctrl = [0u8; 1];
        self.bus
            .read_registers(REG_CTRL_MEAS, &mut ctrl)
            .await
            .map_err(bus_failure("read measurement control"))?;
        self.bus
            .write_register(REG_CTRL_MEAS, (ctrl[0] & 0xFC) | 0x01)
            .await
            .map_err(bus_failure("start forced measurement"))?;

        let mut data = [0u8; MEASUREMENT_LEN];
        for _ in 0..MAX_POLL_ATTEMPTS {
            self.bus
                .read_registers(REG_MEAS_STATUS, &mut data)
                .await
                .map_err(bus_failure("read measurement"))?;
            if let Some(raw) = RawMeasurement::parse(&data) {
                return Ok(raw);
            }
            self.delay.delay_ms(POLL_INTERVAL_MS).await;
        }

        error!("BME680 new data flag never set");
        Err(SensorError::Timeout {
            sensor: "BME680",
            operation: "wait for new data",
        })
    }
}

impl<B: RegisterBus, D: DelayNs> Sensor for Bme680<B, D> {
    type Readings = EnvironmentalReadings;
    const NAME: &'static str = "BME680";

    async fn read(&mut self) -> Result<EnvironmentalReadings, SensorError> {
        // Initialize sensor on first read
        if self.calibration.is_none() {
            self.initialize().await?;
        }
        let raw = self.measure().await?;
        let calibration = self.calibration.ok_or(SensorError::NotReady { sensor: "BME680" })?;
        let values = calibration.compensate(&raw);

        Ok(EnvironmentalReadings {
            temperature: Some(values.temperature + self.settings.temperature_offset),
            pressure: Some(values.pressure),
            humidity: Some(values.humidity),
            gas_resistance: Some(values.gas_resistance),
            air_quality: Some(self.settings.air_quality.index(values.gas_resistance)),
        })
    }
}

impl<B: RegisterBus, D: DelayNs> EnvironmentalSensor for Bme680<B, D> {
    fn is_gas_ready(&mut self, now: Instant) -> bool {
        self.gas_gate.is_warm(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::bus::I2cRegisterBus;
    use crate::sensors::mock::{MockI2c, NoopDelay};
    use embassy_futures::block_on;

    const COEFF: [u8; 41] = [
        0x00, 0xE0, 0x66, 0x03, 0x00, 0x68, 0x8E, 0x1B, 0xD7, 0x58, 0x00, 0xAC, 0x1A, 0x72, 0xFF,
        0x26, 0x1E, 0x00, 0x00, 0x01, 0xF5, 0x56, 0xF9, 0x1E, 0x00, 0x3F, 0x6E, 0x30, 0x00, 0x2D,
        0x14, 0x78, 0x9C, 0x0D, 0x66, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    const DATA: [u8; 15] = [
        0x80, 0x00, 0x59, 0xD8, 0x00, 0x7D, 0x3E, 0x80, 0x65, 0x90, 0x00, 0x00, 0x00, 0xAF, 0x24,
    ];

    const SW_ERR: u8 = 0x34;

    fn assert_close(actual: f32, expected: f32, tolerance: f32) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} ± {tolerance}, got {actual}"
        );
    }

    #[test]
    fn test_calibration_decoding() {
        let cal = Bme680Calibration::from_registers(&COEFF, SW_ERR);
        assert_eq!(cal.par_t, [26125.0, 26336.0, 3.0]);
        assert_eq!(
            cal.par_p,
            [36456.0, -10469.0, 88.0, 6828.0, -142.0, 30.0, 38.0, -2815.0, -1706.0, 30.0]
        );
        assert_eq!(cal.par_h, [782.0, 1014.0, 0.0, 45.0, 20.0, 120.0, -100.0]);
        assert_eq!(cal.range_switching_error, 3.0);
    }

    #[test]
    fn test_raw_measurement_parsing() {
        let raw = RawMeasurement::parse(&DATA).unwrap();
        assert_eq!(raw.adc_temperature, 513000.0);
        assert_eq!(raw.adc_pressure, 368000.0);
        assert_eq!(raw.adc_humidity, 26000.0);
        assert_eq!(raw.adc_gas, 700.0);
        assert_eq!(raw.gas_range, 4);

        let mut pending = DATA;
        pending[0] = 0x00;
        assert!(RawMeasurement::parse(&pending).is_none());
    }

    #[test]
    fn test_compensation() {
        let cal = Bme680Calibration::from_registers(&COEFF, SW_ERR);
        let raw = RawMeasurement::parse(&DATA).unwrap();
        let values = cal.compensate(&raw);

        assert_close(values.temperature, 29.835_08, 0.001);
        assert_close(values.pressure, 988.341_8, 0.01);
        assert_close(values.humidity, 76.733_65, 0.001);
        assert_eq!(values.gas_resistance, 438641.0);
    }

    #[test]
    fn test_humidity_is_clamped() {
        let cal = Bme680Calibration::from_registers(&COEFF, SW_ERR);
        let mut raw = RawMeasurement::parse(&DATA).unwrap();

        raw.adc_humidity = 0.0;
        assert_eq!(cal.compensate(&raw).humidity, 0.0);

        raw.adc_humidity = 65535.0;
        assert_eq!(cal.compensate(&raw).humidity, 100.0);
    }

    #[test]
    fn test_altitude() {
        assert_close(altitude(SEA_LEVEL_PRESSURE_HPA, SEA_LEVEL_PRESSURE_HPA), 0.0, 0.001);
        assert_close(altitude(988.341_8, SEA_LEVEL_PRESSURE_HPA), 209.47, 0.05);
    }

    #[test]
    fn test_air_quality_index() {
        let window = AirQualityWindow::default();
        assert_eq!(window.index(50_000.0), 0.0);
        assert_eq!(window.index(100_000.0), 0.0);
        assert_eq!(window.index(300_000.0), 50.0);
        assert_eq!(window.index(438_641.0), 85.0);
        assert_eq!(window.index(500_000.0), 100.0);
        assert_eq!(window.index(900_000.0), 100.0);
    }

    fn mock_device() -> MockI2c {
        MockI2c::new()
            .with_register(BME680_DEFAULT_ADDRESS, REG_CHIP_ID, &[CHIP_ID])
            .with_register(BME680_DEFAULT_ADDRESS, REG_COEFF_1, &COEFF[..25])
            .with_register(BME680_DEFAULT_ADDRESS, REG_COEFF_2, &COEFF[25..])
            .with_register(BME680_DEFAULT_ADDRESS, REG_RANGE_SW_ERR, &[SW_ERR])
            .with_register(BME680_DEFAULT_ADDRESS, REG_MEAS_STATUS, &DATA)
    }

    #[test]
    fn test_air_quality_index_with_unvalidated_window() {
        let inverted = AirQualityWindow {
            r_min_kohm: 500.0,
            r_max_kohm: 100.0,
        };
        assert_eq!(inverted.index(300_000.0), 100.0);

        let empty = AirQualityWindow {
            r_min_kohm: 200.0,
            r_max_kohm: 200.0,
        };
        assert_eq!(empty.index(300_000.0), 0.0);
    }

    #[test]
    fn test_read_applies_offset_and_air_quality() {
        let bus = I2cRegisterBus::new(mock_device(), BME680_DEFAULT_ADDRESS);
        let mut sensor = Bme680::new(bus, NoopDelay, Bme680Settings::default());

        let readings = block_on(sensor.read()).unwrap();

        assert!(sensor.calibration().is_some());
        assert_close(readings.temperature.unwrap(), 28.835_08, 0.001);
        assert_close(readings.pressure.unwrap(), 988.341_8, 0.01);
        assert_eq!(readings.gas_resistance, Some(438641.0));
        assert_eq!(readings.air_quality, Some(85.0));
    }

    #[test]
    fn test_wrong_chip_id_fails_initialization() {
        let device = mock_device().with_register(BME680_DEFAULT_ADDRESS, REG_CHIP_ID, &[0x60]);
        let bus = I2cRegisterBus::new(device, BME680_DEFAULT_ADDRESS);
        let mut sensor = Bme680::new(bus, NoopDelay, Bme680Settings::default());

        assert!(matches!(
            block_on(sensor.read()),
            Err(SensorError::InitializationFailed { sensor: "BME680", .. })
        ));
    }

    #[test]
    fn test_missing_new_data_times_out() {
        let mut pending = DATA;
        pending[0] = 0x00;
        let device = mock_device().with_register(BME680_DEFAULT_ADDRESS, REG_MEAS_STATUS, &pending);
        let bus = I2cRegisterBus::new(device, BME680_DEFAULT_ADDRESS);
        let mut sensor = Bme680::new(bus, NoopDelay, Bme680Settings::default());

        assert!(matches!(block_on(sensor.read()), Err(SensorError::Timeout { .. })));
    }

    #[test]
    fn test_bus_failure_is_read_failed() {
        let mut device = mock_device();
        device.fail = true;
        let bus = I2cRegisterBus::new(device, BME680_DEFAULT_ADDRESS);
        let mut sensor = Bme680::new(bus, NoopDelay, Bme680Settings::default());

        assert!(matches!(block_on(sensor.read()), Err(SensorError::ReadFailed { .. })));
    }

    #[test]
    fn test_gas_gate() {
        let bus = I2cRegisterBus::new(mock_device(), BME680_DEFAULT_ADDRESS);
        let mut sensor = Bme680::new(bus, NoopDelay, Bme680Settings::default());

        assert!(!sensor.is_gas_ready(Instant::from_secs(5)));
        assert!(!sensor.is_gas_ready(Instant::from_secs(304)));
        assert!(sensor.is_gas_ready(Instant::from_secs(305)));
    }
}
