//! Read cycle orchestration
//!
//! One call to [`ReadOrchestrator::run_cycle`] walks every sensor in a fixed
//! order, applies the readiness gates, and records whatever was read into
//! the [`WeatherStation`]. Sensor failures end at this boundary: they are
//! logged, listed in the [`CycleReport`], and the cycle moves on.

use heapless::Vec;
use log::{debug, error, info, warn};

use crate::classification::{ClassifyError, uv_risk_level};
use crate::clock::Clock;
use crate::metrics::MetricId;
use crate::sensors::{
    EnvironmentalSensor, GasQualitySensor, LightSensor, SensorError, SoundSensor, UvSensor,
};
use crate::station::{StationError, WeatherStation};

/// Position of the orchestrator within a read cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    ReadingEnvironmental,
    ReadingGasSensors,
    ReadingOptical,
    ReadingAcoustic,
    Done,
}

/// Source of a group of metrics, as named in cycle reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSlot {
    /// Temperature, humidity and pressure
    Environment,
    /// Gas resistance and the derived air quality
    GasResistance,
    /// CO2 and TVOC
    GasQuality,
    Uv,
    Light,
    Sound,
}

impl SensorSlot {
    pub const fn name(self) -> &'static str {
        match self {
            SensorSlot::Environment => "environment",
            SensorSlot::GasResistance => "gas resistance",
            SensorSlot::GasQuality => "co2/tvoc",
            SensorSlot::Uv => "uv",
            SensorSlot::Light => "light",
            SensorSlot::Sound => "sound",
        }
    }
}

const MAX_SKIPS: usize = 6;
const MAX_FAILURES: usize = 8;

/// Outcome of one read cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    updated: [bool; MetricId::COUNT],
    not_ready: Vec<SensorSlot, MAX_SKIPS>,
    failures: Vec<(SensorSlot, SensorError), MAX_FAILURES>,
    gas_ready: bool,
    co2_ready: bool,
    compensated: bool,
}

impl Default for CycleReport {
    fn default() -> Self {
        Self {
            updated: [false; MetricId::COUNT],
            not_ready: Vec::new(),
            failures: Vec::new(),
            gas_ready: false,
            co2_ready: false,
            compensated: false,
        }
    }
}

impl CycleReport {
    /// Whether `id` received a new sample this cycle
    pub fn updated(&self, id: MetricId) -> bool {
        self.updated[id.index()]
    }

    pub fn updated_metrics(&self) -> impl Iterator<Item = MetricId> + '_ {
        MetricId::ALL.into_iter().filter(|id| self.updated(*id))
    }

    /// Sources skipped because a warm-up or data-ready gate was closed
    pub fn not_ready(&self) -> &[SensorSlot] {
        &self.not_ready
    }

    pub fn failures(&self) -> &[(SensorSlot, SensorError)] {
        &self.failures
    }

    pub fn gas_ready(&self) -> bool {
        self.gas_ready
    }

    pub fn co2_ready(&self) -> bool {
        self.co2_ready
    }

    /// Whether every warm-up gate was open this cycle
    pub fn fully_warm(&self) -> bool {
        self.gas_ready && self.co2_ready
    }

    /// Whether environmental compensation was written to the CO2 device
    pub fn compensated(&self) -> bool {
        self.compensated
    }

    fn mark(&mut self, id: MetricId, updated: bool) {
        self.updated[id.index()] |= updated;
    }

    fn skip(&mut self, slot: SensorSlot) {
        debug!("Skipping {}: not ready", slot.name());
        let _ = self.not_ready.push(slot);
    }

    fn fail(&mut self, slot: SensorSlot, err: SensorError) {
        error!("Skipping {} this cycle: {}", slot.name(), err);
        let _ = self.failures.push((slot, err));
    }
}

/// The sensors driven by a [`ReadOrchestrator`]
pub struct SensorSet<E, G, U, L, S> {
    pub environmental: E,
    pub gas: G,
    pub uv: U,
    pub light: L,
    pub sound: S,
}

pub struct ReadOrchestrator<E, G, U, L, S, C> {
    sensors: SensorSet<E, G, U, L, S>,
    clock: C,
    phase: CyclePhase,
}

impl<E, G, U, L, S, C> ReadOrchestrator<E, G, U, L, S, C>
where
    E: EnvironmentalSensor,
    G: GasQualitySensor,
    U: UvSensor,
    L: LightSensor,
    S: SoundSensor,
    C: Clock,
{
    /// Fails when the UV sensor's integration time has no risk table.
    pub fn new(sensors: SensorSet<E, G, U, L, S>, clock: C) -> Result<Self, StationError> {
        if sensors.uv.integration_divisor() == 0 {
            error!("UV integration time has no risk table");
            return Err(ClassifyError::UnsupportedIntegrationTime.into());
        }

        Ok(Self {
            sensors,
            clock,
            phase: CyclePhase::Idle,
        })
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn sensors(&self) -> &SensorSet<E, G, U, L, S> {
        &self.sensors
    }

    pub fn sensors_mut(&mut self) -> &mut SensorSet<E, G, U, L, S> {
        &mut self.sensors
    }

    /// Read every sensor once and record the results into `station`.
    pub async fn run_cycle(&mut self, station: &WeatherStation) -> CycleReport {
        let mut report = CycleReport::default();

        self.phase = CyclePhase::ReadingEnvironmental;
        self.read_environmental(station, &mut report).await;

        self.phase = CyclePhase::ReadingGasSensors;
        self.read_gas_quality(station, &mut report).await;

        self.phase = CyclePhase::ReadingOptical;
        self.read_optical(station, &mut report).await;

        self.phase = CyclePhase::ReadingAcoustic;
        self.read_acoustic(station, &mut report).await;

        self.phase = CyclePhase::Done;
        report
    }

    async fn read_environmental(&mut self, station: &WeatherStation, report: &mut CycleReport) {
        // The gate is queried before the read so its timer starts at the first attempt
        let gas_ready = self.sensors.environmental.is_gas_ready(self.clock.now());
        report.gas_ready = gas_ready;

        let readings = match self.sensors.environmental.read().await {
            Ok(readings) => readings,
            Err(err) => {
                report.fail(SensorSlot::Environment, err);
                return;
            }
        };

        station.update(|registry| {
            report.mark(
                MetricId::Temperature,
                registry.record(MetricId::Temperature, readings.temperature),
            );
            report.mark(
                MetricId::Pressure,
                registry.record(MetricId::Pressure, readings.pressure),
            );
            report.mark(
                MetricId::Humidity,
                registry.record(MetricId::Humidity, readings.humidity),
            );

            if gas_ready {
                report.mark(
                    MetricId::Gas,
                    registry.record(MetricId::Gas, readings.gas_resistance),
                );
                report.mark(
                    MetricId::AirQuality,
                    registry.record(MetricId::AirQuality, readings.air_quality),
                );
            }
        });

        if !gas_ready {
            report.skip(SensorSlot::GasResistance);
        }
    }

    async fn read_gas_quality(&mut self, station: &WeatherStation, report: &mut CycleReport) {
        let now = self.clock.now();
        let gas = &mut self.sensors.gas;

        match gas.is_ready(now).await {
            Ok(true) => report.co2_ready = true,
            Ok(false) => {
                report.skip(SensorSlot::GasQuality);
                return;
            }
            Err(err) => {
                report.fail(SensorSlot::GasQuality, err);
                return;
            }
        }

        if gas.compensation_due(now) {
            let temperature = station.current(MetricId::Temperature);
            let humidity = station.current(MetricId::Humidity);
            match (temperature, humidity) {
                (Some(temperature), Some(humidity)) => {
                    match gas.compensate(now, temperature, humidity).await {
                        Ok(()) => report.compensated = true,
                        Err(err) => report.fail(SensorSlot::GasQuality, err),
                    }
                }
                _ => debug!("Compensation due but no temperature/humidity recorded yet"),
            }
        }

        match gas.read().await {
            Ok(readings) => {
                // Both values come from one transaction and are always finite
                let accepted = station.record_many(&[
                    (MetricId::Co2, f32::from(readings.co2_ppm)),
                    (MetricId::Tvoc, f32::from(readings.tvoc_ppb)),
                ]);
                report.mark(MetricId::Co2, accepted == 2);
                report.mark(MetricId::Tvoc, accepted == 2);
            }
            Err(err) => report.fail(SensorSlot::GasQuality, err),
        }
    }

    async fn read_optical(&mut self, station: &WeatherStation, report: &mut CycleReport) {
        match self.sensors.light.read().await {
            Ok(readings) => report.mark(
                MetricId::Light,
                station.record(MetricId::Light, readings.lumens),
            ),
            Err(err) => report.fail(SensorSlot::Light, err),
        }

        match self.sensors.uv.read().await {
            Ok(readings) => match readings.raw {
                Some(raw) => {
                    let risk = match uv_risk_level(raw, self.sensors.uv.integration_divisor()) {
                        Ok(level) => Some(level),
                        Err(err) => {
                            warn!("No UV risk level for raw reading {}: {}", raw, err);
                            None
                        }
                    };
                    report.mark(MetricId::Uv, station.record_uv(f32::from(raw), risk));
                }
                None => debug!("UV sensor returned no reading"),
            },
            Err(err) => report.fail(SensorSlot::Uv, err),
        }
    }

    async fn read_acoustic(&mut self, station: &WeatherStation, report: &mut CycleReport) {
        match self.sensors.sound.read().await {
            Ok(readings) => report.mark(
                MetricId::Sound,
                station.record_sample(MetricId::Sound, readings.db_spl),
            ),
            Err(err) => report.fail(SensorSlot::Sound, err),
        }
    }
}

/// Log a one-line summary of a finished cycle
pub fn log_report(report: &CycleReport) {
    info!(
        "Cycle done: {} metrics updated, {} gated, {} failures",
        report.updated_metrics().count(),
        report.not_ready().len(),
        report.failures().len()
    );
}
