//! Desktop simulator for the weather station.
//!
//! Drives the weather-core read cycle against synthetic sensors on an
//! accelerated virtual clock, logs the 3×3 tile grid after every cycle and
//! logs the JSON body of every upload instead of posting it.
//!
//! # Usage
//!
//! ```text
//! weather-simulator [--config <postcard blob>] [--cycles <n>]
//! ```
//!
//! Environment:
//!
//! | Variable          | Meaning                                  |
//! |-------------------|------------------------------------------|
//! | `RUST_LOG`        | log filter, `info` by default            |
//! | `WEATHER_API_URL` | base URL shown in upload logs            |
//! | `WEATHER_API_PATH`| endpoint path shown in upload logs       |
//! | `WEATHER_API_TOKEN` | bearer token (only its presence is logged) |

use core::cell::Cell;
use core::convert::Infallible;
use std::process::ExitCode;
use std::time::Duration as StdDuration;

use embassy_futures::block_on;
use embassy_time::{Duration, Instant};
use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};

use weather_core::classification::BandMap;
use weather_core::clock::Clock;
use weather_core::display::{self, Display};
use weather_core::orchestrator::{SensorSet, log_report};
use weather_core::sensors::bh1750::lux_to_lumens;
use weather_core::sensors::bme680::AirQualityWindow;
use weather_core::sensors::ccs811::Ccs811Settings;
use weather_core::sensors::{
    AnalogInput, CalibrationState, EnvironmentalReadings, EnvironmentalSensor,
    GasQualityReadings, GasQualitySensor, IntegrationTime, LightReadings, LightSensor, Sensor,
    SensorError, Sonometer, UvReadings, UvSensor, WarmUpGate,
};
use weather_core::upload::{Endpoint, UploadOutcome, UploadPayload, Uploader};
use weather_core::{
    MetricRegistry, ReadOrchestrator, StationConfig, UploadScheduler, WeatherStation,
};

/// Wall-clock pause between two simulated cycles
const TICK: StdDuration = StdDuration::from_millis(250);

// ---------------------------------------------------------------------------
// Virtual time
// ---------------------------------------------------------------------------

/// Virtual clock advanced by the main loop, one read interval per cycle.
struct SimClock {
    now_ms: Cell<u64>,
}

impl SimClock {
    fn new() -> Self {
        Self {
            now_ms: Cell::new(0),
        }
    }

    fn advance(&self, by: Duration) {
        self.now_ms.set(self.now_ms.get() + by.as_millis());
    }

    fn secs(&self) -> f32 {
        self.now_ms.get() as f32 / 1000.0
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        Instant::from_millis(self.now_ms.get())
    }
}

/// Delay that returns immediately; virtual time is owned by [`SimClock`].
struct InstantDelay;

impl DelayNs for InstantDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

// ---------------------------------------------------------------------------
// Synthetic sensors
// ---------------------------------------------------------------------------

fn wave(t: f32, period_secs: f32) -> f32 {
    (t / period_secs * core::f32::consts::TAU).sin()
}

struct SimEnvironment<'a> {
    clock: &'a SimClock,
    gas_gate: WarmUpGate,
    temperature_offset: f32,
    air_quality: AirQualityWindow,
}

impl Sensor for SimEnvironment<'_> {
    type Readings = EnvironmentalReadings;
    const NAME: &'static str = "sim-environment";

    async fn read(&mut self) -> Result<EnvironmentalReadings, SensorError> {
        let t = self.clock.secs();
        let gas_resistance = 260_000.0 + 140_000.0 * wave(t, 5400.0);

        Ok(EnvironmentalReadings {
            temperature: Some(23.0 + 4.0 * wave(t, 3600.0) + self.temperature_offset),
            pressure: Some(1013.0 + 6.0 * wave(t, 7200.0)),
            humidity: Some(50.0 + 12.0 * wave(t, 2700.0)),
            gas_resistance: Some(gas_resistance),
            air_quality: Some(self.air_quality.index(gas_resistance)),
        })
    }
}

impl EnvironmentalSensor for SimEnvironment<'_> {
    fn is_gas_ready(&mut self, now: Instant) -> bool {
        self.gas_gate.is_warm(now)
    }
}

struct SimGasQuality<'a> {
    clock: &'a SimClock,
    calibration: CalibrationState,
}

impl<'a> SimGasQuality<'a> {
    fn new(clock: &'a SimClock, settings: Ccs811Settings) -> Self {
        Self {
            clock,
            calibration: CalibrationState::new(
                clock.now(),
                settings.warm_up,
                settings.compensation_interval,
            ),
        }
    }
}

impl Sensor for SimGasQuality<'_> {
    type Readings = GasQualityReadings;
    const NAME: &'static str = "sim-gas-quality";

    async fn read(&mut self) -> Result<GasQualityReadings, SensorError> {
        let t = self.clock.secs();
        Ok(GasQualityReadings {
            co2_ppm: (620.0 + 180.0 * wave(t, 4800.0)) as u16,
            tvoc_ppb: (110.0 + 90.0 * wave(t, 3000.0)) as u16,
        })
    }
}

impl GasQualitySensor for SimGasQuality<'_> {
    async fn is_ready(&mut self, now: Instant) -> Result<bool, SensorError> {
        Ok(self.calibration.is_warm(now))
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
        info!(
            "Compensating CO2 sensor with {:.1} C / {:.1} %",
            temperature, humidity
        );
        self.calibration.mark_compensated(now);
        Ok(())
    }
}

struct SimUv<'a> {
    clock: &'a SimClock,
    integration_time: IntegrationTime,
}

impl Sensor for SimUv<'_> {
    type Readings = UvReadings;
    const NAME: &'static str = "sim-uv";

    async fn read(&mut self) -> Result<UvReadings, SensorError> {
        let daylight = wave(self.clock.secs(), 86_400.0).max(0.0);
        let raw = 2000.0 * daylight * f32::from(self.integration_time.divisor());
        Ok(UvReadings {
            raw: Some(raw as u16),
        })
    }
}

impl UvSensor for SimUv<'_> {
    fn integration_divisor(&self) -> u8 {
        self.integration_time.divisor()
    }
}

struct SimLight<'a> {
    clock: &'a SimClock,
}

impl Sensor for SimLight<'_> {
    type Readings = LightReadings;
    const NAME: &'static str = "sim-light";

    async fn read(&mut self) -> Result<LightReadings, SensorError> {
        let daylight = wave(self.clock.secs(), 86_400.0).max(0.0);
        let lux = 5.0 + 20_000.0 * daylight;
        Ok(LightReadings {
            lux,
            lumens: lux_to_lumens(lux),
        })
    }
}

impl LightSensor for SimLight<'_> {}

/// Microphone output around the bias voltage, louder every few minutes.
struct SimMicrophone<'a> {
    clock: &'a SimClock,
    bias: f32,
    sample: u32,
}

impl AnalogInput for SimMicrophone<'_> {
    type Error = Infallible;

    fn read_voltage(&mut self) -> Result<f32, Infallible> {
        self.sample = self.sample.wrapping_add(1);
        let loudness = 0.15 + 0.25 * wave(self.clock.secs(), 300.0).abs();
        Ok(self.bias + loudness * (self.sample as f32 * 0.7).sin())
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Logs the tile grid, one row per line.
struct ConsoleDisplay;

impl Display for ConsoleDisplay {
    type Error = Infallible;

    fn render(&mut self, snapshot: &MetricRegistry, bands: &BandMap) -> Result<(), Infallible> {
        for row in display::tiles(snapshot, bands) {
            let cells: Vec<String> = row
                .iter()
                .map(|tile| {
                    format!(
                        "{:>12} {:>8} {:<4} [{}]",
                        tile.metric.name(),
                        tile.value.as_str(),
                        tile.unit,
                        tile.band.map_or("-", |band| band.label())
                    )
                })
                .collect();
            info!("{}", cells.join(" |"));
        }
        debug!(
            "Icons: {:?}",
            display::tiles(snapshot, bands)
                .iter()
                .flatten()
                .map(|tile| tile.icon.as_str())
                .collect::<Vec<_>>()
        );
        Ok(())
    }
}

/// Logs the request that would be posted.
struct LogUploader {
    device_id: u32,
    base_url: String,
    path: String,
    token: String,
}

impl LogUploader {
    fn from_env(device_id: u32) -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.into())
        };
        Self {
            device_id,
            base_url: var("WEATHER_API_URL", "http://localhost:8000/api"),
            path: var("WEATHER_API_PATH", "weather"),
            token: var("WEATHER_API_TOKEN", ""),
        }
    }
}

impl Uploader for LogUploader {
    async fn upload(&mut self, snapshot: &MetricRegistry) -> bool {
        let endpoint = Endpoint {
            base_url: &self.base_url,
            path: &self.path,
            token: &self.token,
        };

        match UploadPayload::from_snapshot(self.device_id, snapshot).to_json() {
            Ok(body) => {
                for (name, value) in endpoint.headers() {
                    if name == "Authorization" {
                        debug!("  {}: <redacted>", name);
                    } else {
                        debug!("  {}: {}", name, value);
                    }
                }
                info!(
                    "POST {} (token {}): {}",
                    endpoint.url(),
                    if self.token.is_empty() { "unset" } else { "set" },
                    body
                );
                true
            }
            Err(e) => {
                error!("Failed to encode upload payload: {}", e);
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

struct Args {
    config: Option<String>,
    cycles: Option<u64>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        cycles: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => args.config = Some(iter.next().ok_or("--config needs a path")?),
            "--cycles" => {
                let value = iter.next().ok_or("--cycles needs a number")?;
                let cycles = value
                    .parse()
                    .map_err(|_| format!("invalid cycle count {value}"))?;
                args.cycles = Some(cycles);
            }
            other => return Err(format!("unexpected argument {other}")),
        }
    }
    Ok(args)
}

fn load_config(path: Option<&str>) -> Result<StationConfig, String> {
    let Some(path) = path else {
        return Ok(StationConfig::default());
    };

    let bytes = std::fs::read(path).map_err(|e| format!("cannot read {path}: {e}"))?;
    let config = StationConfig::from_bytes(&bytes).map_err(|e| format!("{path}: {e}"))?;
    info!("Loaded configuration from {}", path);
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Starting weather-station simulator (device {})", config.hardware_device_id);

    let clock = SimClock::new();
    let station = WeatherStation::default();

    let bme680 = config.bme680_settings();
    let sensors = SensorSet {
        environmental: SimEnvironment {
            clock: &clock,
            gas_gate: WarmUpGate::new(bme680.gas_warm_up),
            temperature_offset: bme680.temperature_offset,
            air_quality: bme680.air_quality,
        },
        gas: SimGasQuality::new(&clock, config.ccs811_settings()),
        uv: SimUv {
            clock: &clock,
            integration_time: config.uv_integration_time,
        },
        light: SimLight { clock: &clock },
        sound: Sonometer::new(
            SimMicrophone {
                clock: &clock,
                bias: config.sonometer.voltage_offset,
                sample: 0,
            },
            InstantDelay,
            config.sonometer,
        ),
    };

    let mut orchestrator = match ReadOrchestrator::new(sensors, &clock) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!("Cannot start read cycle: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut display = ConsoleDisplay;
    let mut uploader = LogUploader::from_env(config.hardware_device_id);
    let mut scheduler = UploadScheduler::new(clock.now(), config.upload_interval());
    let mut warm = false;
    let mut cycle = 0u64;

    while args.cycles.is_none_or(|limit| cycle < limit) {
        cycle += 1;
        let report = block_on(orchestrator.run_cycle(&station));
        log_report(&report);

        if report.fully_warm() && !warm {
            warm = true;
            info!("All sensors warmed up at t={:.0}s, discarding warm-up statistics", clock.secs());
            station.reset_stats();
        }

        let snapshot = station.snapshot();
        let bands = station.bands(&snapshot).unwrap_or_else(|e| {
            error!("Classification failed: {}", e);
            BandMap::empty()
        });
        if let Err(e) = display.render(&snapshot, &bands) {
            warn!("Display refresh failed: {:?}", e);
        }

        match block_on(scheduler.poll(clock.now(), &station, &mut uploader)) {
            UploadOutcome::NotDue => {}
            outcome => debug!("Upload outcome: {:?}", outcome),
        }

        clock.advance(config.read_interval());
        std::thread::sleep(TICK);
    }

    info!("Simulator exiting after {} cycles", cycle);
    ExitCode::SUCCESS
}
