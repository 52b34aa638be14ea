//! CCS811 eCO2/TVOC gas sensor
//!
//! The device needs a 20 minute run-in after power-on before its readings are
//! meaningful, and it improves its estimates when fed ambient temperature and
//! humidity. Both concerns are tracked by a [`CalibrationState`].

use embassy_time::{Duration, Instant};
use embedded_hal_async::i2c::I2c;
use log::{debug, error, info};

use super::calibration::CalibrationState;
use super::{GasQualitySensor, Sensor, SensorError};

pub const CCS811_DEFAULT_ADDRESS: u8 = 0x5A;

const REG_STATUS: u8 = 0x00;
const REG_MEAS_MODE: u8 = 0x01;
const REG_ALG_RESULT_DATA: u8 = 0x02;
const REG_ENV_DATA: u8 = 0x05;
const REG_BASELINE: u8 = 0x11;
const REG_HW_ID: u8 = 0x20;
const REG_ERROR_ID: u8 = 0xE0;
const CMD_APP_START: u8 = 0xF4;

const HW_ID: u8 = 0x81;
/// Drive mode 1 (constant power, one measurement per second)
const DRIVE_MODE_1: u8 = 0b0001_1000;

const STATUS_ERROR: u8 = 1 << 0;
const STATUS_DATA_READY: u8 = 1 << 3;
const STATUS_APP_VALID: u8 = 1 << 4;

/// Typed readings from the CCS811, always taken from one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasQualityReadings {
    pub co2_ppm: u16,
    pub tvoc_ppb: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ccs811Settings {
    pub warm_up: Duration,
    pub compensation_interval: Duration,
}

impl Default for Ccs811Settings {
    fn default() -> Self {
        Self {
            warm_up: Duration::from_secs(1200),
            compensation_interval: Duration::from_secs(300),
        }
    }
}

/// Human readable name of the highest set bit of the error register.
pub fn describe_error(code: u8) -> &'static str {
    const NAMES: [(u8, &str); 6] = [
        (5, "HeaterSupply"),
        (4, "HeaterFault"),
        (3, "MaxResistance"),
        (2, "MeasModeInvalid"),
        (1, "ReadRegInvalid"),
        (0, "MsgInvalid"),
    ];

    NAMES
        .iter()
        .find(|(bit, _)| code & (1u8 << *bit) != 0)
        .map(|(_, name)| *name)
        .unwrap_or("Unknown")
}

/// Encode relative humidity (%) and temperature (°C) for the ENV_DATA register.
///
/// Humidity is sent in half-percent steps, temperature as `(T + 25) * 512`
/// fixed point. Both are clamped to the range the register can carry.
pub fn encode_env_data(humidity: f32, temperature: f32) -> [u8; 4] {
    let humidity = humidity.clamp(0.0, 100.0) as u8;
    let temperature = temperature.clamp(-25.0, 100.0);

    let whole = libm::floorf(temperature);
    let fraction = temperature - whole;
    let combined = (((whole as i32 + 25) << 9) | (fraction * 512.0) as i32) as u16;
    let [high, low] = combined.to_be_bytes();

    [humidity << 1, 0x00, high, low]
}

pub struct Ccs811<I> {
    i2c: I,
    address: u8,
    calibration: CalibrationState,
    initialized: bool,
    warm_logged: bool,
}

impl<I: I2c> Ccs811<I> {
    /// `powered_on_at` starts both the warm-up window and the compensation timer.
    pub fn new(i2c: I, address: u8, powered_on_at: Instant, settings: Ccs811Settings) -> Self {
        Self {
            i2c,
            address,
            calibration: CalibrationState::new(
                powered_on_at,
                settings.warm_up,
                settings.compensation_interval,
            ),
            initialized: false,
            warm_logged: false,
        }
    }

    pub fn calibration(&self) -> &CalibrationState {
        &self.calibration
    }

    async fn read_register(
        &mut self,
        register: u8,
        buf: &mut [u8],
        operation: &'static str,
    ) -> Result<(), SensorError> {
        self.i2c
            .write_read(self.address, &[register], buf)
            .await
            .map_err(|e| {
                error!("CCS811 {} failed: {:?}", operation, e);
                SensorError::ReadFailed {
                    sensor: "CCS811",
                    operation,
                    details: "I2C communication error",
                }
            })
    }

    async fn write(&mut self, bytes: &[u8], operation: &'static str) -> Result<(), SensorError> {
        self.i2c.write(self.address, bytes).await.map_err(|e| {
            error!("CCS811 {} failed: {:?}", operation, e);
            SensorError::ReadFailed {
                sensor: "CCS811",
                operation,
                details: "I2C communication error",
            }
        })
    }

    async fn status(&mut self) -> Result<u8, SensorError> {
        let mut status = [0u8; 1];
        self.read_register(REG_STATUS, &mut status, "read status").await?;
        Ok(status[0])
    }

    async fn ensure_no_error(&mut self, stage: &'static str) -> Result<(), SensorError> {
        if self.status().await? & STATUS_ERROR == 0 {
            return Ok(());
        }

        let mut code = [0u8; 1];
        self.read_register(REG_ERROR_ID, &mut code, "read error id").await?;
        error!("CCS811 {}: {}", stage, describe_error(code[0]));
        Err(SensorError::InitializationFailed {
            sensor: "CCS811",
            details: stage,
        })
    }

    /// Hardware id check, application start and drive mode selection.
    pub async fn initialize(&mut self) -> Result<(), SensorError> {
        let mut id = [0u8; 1];
        self.read_register(REG_HW_ID, &mut id, "read hardware id").await?;
        if id[0] != HW_ID {
            error!("CCS811 unexpected hardware id 0x{:02x}", id[0]);
            return Err(SensorError::InitializationFailed {
                sensor: "CCS811",
                details: "unexpected hardware id",
            });
        }

        self.ensure_no_error("boot").await?;
        if self.status().await? & STATUS_APP_VALID == 0 {
            error!("CCS811 has no valid application firmware");
            return Err(SensorError::InitializationFailed {
                sensor: "CCS811",
                details: "application firmware not valid",
            });
        }

        self.write(&[CMD_APP_START], "start application").await?;
        self.ensure_no_error("application start").await?;

        self.write(&[REG_MEAS_MODE, DRIVE_MODE_1], "set drive mode").await?;
        self.ensure_no_error("drive mode").await?;

        let baseline = self.baseline().await?;
        info!("CCS811: started, baseline 0x{:04x}", baseline);

        self.initialized = true;
        Ok(())
    }

    pub async fn baseline(&mut self) -> Result<u16, SensorError> {
        let mut raw = [0u8; 2];
        self.read_register(REG_BASELINE, &mut raw, "read baseline").await?;
        Ok(u16::from_be_bytes(raw))
    }

    pub async fn data_available(&mut self) -> Result<bool, SensorError> {
        Ok(self.status().await? & STATUS_DATA_READY != 0)
    }
}

impl<I: I2c> Sensor for Ccs811<I> {
    type Readings = GasQualityReadings;
    const NAME: &'static str = "CCS811";

    async fn read(&mut self) -> Result<GasQualityReadings, SensorError> {
        if !self.initialized {
            self.initialize().await?;
        }

        let mut data = [0u8; 4];
        self.read_register(REG_ALG_RESULT_DATA, &mut data, "read algorithm result")
            .await?;

        Ok(GasQualityReadings {
            co2_ppm: u16::from_be_bytes([data[0], data[1]]),
            tvoc_ppb: u16::from_be_bytes([data[2], data[3]]),
        })
    }
}

impl<I: I2c> GasQualitySensor for Ccs811<I> {
    async fn is_ready(&mut self, now: Instant) -> Result<bool, SensorError> {
        if !self.initialized {
            self.initialize().await?;
        }

        if !self.data_available().await? {
            debug!("CCS811: no new data");
            return Ok(false);
        }

        let warm = self.calibration.is_warm(now);
        if warm && !self.warm_logged {
            info!("CCS811: warm-up complete");
            self.warm_logged = true;
        }
        Ok(warm)
    }

    fn compensation_due(&self, now: Instant) -> bool {
        self.calibration.compensation_due(now)
    }

    async fn compensate(
        &mut self,
        now: Instant,
        temperature: f32,
        humidity: f32,
    ) -> Result<(), SensorError> {
        let [b0, b1, b2, b3] = encode_env_data(humidity, temperature);
        self.write(&[REG_ENV_DATA, b0, b1, b2, b3], "write environment data")
            .await?;
        self.calibration.mark_compensated(now);
        info!(
            "CCS811: compensated with {:.1} C / {:.1} %",
            temperature, humidity
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::mock::MockI2c;
    use embassy_futures::block_on;

    const ADDR: u8 = CCS811_DEFAULT_ADDRESS;

    fn mock_device(status: u8) -> MockI2c {
        MockI2c::new()
            .with_register(ADDR, REG_HW_ID, &[HW_ID])
            .with_register(ADDR, REG_STATUS, &[status])
            .with_register(ADDR, REG_BASELINE, &[0x84, 0x3A])
            .with_register(ADDR, REG_ALG_RESULT_DATA, &[0x01, 0xC2, 0x00, 0x2A])
    }

    fn sensor(device: MockI2c) -> Ccs811<MockI2c> {
        Ccs811::new(device, ADDR, Instant::from_secs(0), Ccs811Settings::default())
    }

    #[test]
    fn test_env_data_encoding() {
        assert_eq!(encode_env_data(50.0, 25.5), [0x64, 0x00, 0x65, 0x00]);
        assert_eq!(encode_env_data(48.7, 21.25), [0x60, 0x00, 0x5C, 0x80]);
        assert_eq!(encode_env_data(0.0, -25.0), [0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_env_data_clamps_inputs() {
        assert_eq!(encode_env_data(150.0, -40.0), encode_env_data(100.0, -25.0));
        assert_eq!(encode_env_data(-3.0, 20.0)[0], 0);
    }

    #[test]
    fn test_error_description() {
        assert_eq!(describe_error(0b10_0000), "HeaterSupply");
        assert_eq!(describe_error(0b01_0001), "HeaterFault");
        assert_eq!(describe_error(0b00_0001), "MsgInvalid");
        assert_eq!(describe_error(0), "Unknown");
    }

    #[test]
    fn test_initialization_sequence() {
        let mut sensor = sensor(mock_device(STATUS_APP_VALID));
        block_on(sensor.initialize()).unwrap();

        assert!(sensor.i2c.wrote(ADDR, &[CMD_APP_START]));
        assert!(sensor.i2c.wrote(ADDR, &[REG_MEAS_MODE, DRIVE_MODE_1]));
    }

    #[test]
    fn test_wrong_hardware_id() {
        let device = mock_device(STATUS_APP_VALID).with_register(ADDR, REG_HW_ID, &[0x00]);
        let mut sensor = sensor(device);

        assert_eq!(
            block_on(sensor.initialize()),
            Err(SensorError::InitializationFailed {
                sensor: "CCS811",
                details: "unexpected hardware id",
            })
        );
    }

    #[test]
    fn test_error_flag_fails_initialization() {
        let device = mock_device(STATUS_APP_VALID | STATUS_ERROR).with_register(
            ADDR,
            REG_ERROR_ID,
            &[0x20],
        );
        let mut sensor = sensor(device);

        assert_eq!(
            block_on(sensor.initialize()),
            Err(SensorError::InitializationFailed {
                sensor: "CCS811",
                details: "boot",
            })
        );
    }

    #[test]
    fn test_invalid_application() {
        let mut sensor = sensor(mock_device(0));
        assert!(matches!(
            block_on(sensor.initialize()),
            Err(SensorError::InitializationFailed { .. })
        ));
    }

    #[test]
    fn test_ready_requires_data_and_warm_up() {
        let mut sensor = sensor(mock_device(STATUS_APP_VALID | STATUS_DATA_READY));

        assert!(!block_on(sensor.is_ready(Instant::from_secs(1199))).unwrap());
        assert!(block_on(sensor.is_ready(Instant::from_secs(1200))).unwrap());

        let mut idle = self::sensor(mock_device(STATUS_APP_VALID));
        assert!(!block_on(idle.is_ready(Instant::from_secs(5000))).unwrap());
    }

    #[test]
    fn test_read_decodes_algorithm_result() {
        let mut sensor = sensor(mock_device(STATUS_APP_VALID | STATUS_DATA_READY));
        let readings = block_on(sensor.read()).unwrap();

        assert_eq!(
            readings,
            GasQualityReadings {
                co2_ppm: 450,
                tvoc_ppb: 42,
            }
        );
    }

    #[test]
    fn test_compensation_writes_env_data() {
        let mut sensor = sensor(mock_device(STATUS_APP_VALID | STATUS_DATA_READY));

        assert!(!sensor.compensation_due(Instant::from_secs(299)));
        assert!(sensor.compensation_due(Instant::from_secs(300)));

        block_on(sensor.compensate(Instant::from_secs(300), 25.5, 50.0)).unwrap();

        assert!(sensor.i2c.wrote(ADDR, &[REG_ENV_DATA, 0x64, 0x00, 0x65, 0x00]));
        assert_eq!(sensor.calibration().last_calibration_time(), Instant::from_secs(300));
        assert!(!sensor.compensation_due(Instant::from_secs(599)));
    }

    #[test]
    fn test_bus_failure() {
        let mut device = mock_device(STATUS_APP_VALID);
        device.fail = true;
        let mut sensor = sensor(device);

        assert!(matches!(
            block_on(sensor.read()),
            Err(SensorError::ReadFailed { sensor: "CCS811", .. })
        ));
    }
}
