//! Metric registry and running statistics
//!
//! The registry holds one [`Metric`] per physical quantity the station
//! measures. Each metric keeps the latest value together with running
//! min/max/mean statistics that are updated incrementally, so no sample
//! history is stored between resets.

use core::fmt;
use core::str::FromStr;

use log::warn;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::classification::UvRiskLevel;

/// Identifier of every metric tracked by the station.
///
/// The declaration order is the registry order and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricId {
    Temperature,
    Humidity,
    Pressure,
    Gas,
    AirQuality,
    Co2,
    Tvoc,
    Uv,
    Light,
    Sound,
}

impl MetricId {
    /// Number of metrics in the registry
    pub const COUNT: usize = 10;

    /// All metrics, in registry order
    pub const ALL: [MetricId; Self::COUNT] = [
        Self::Temperature,
        Self::Humidity,
        Self::Pressure,
        Self::Gas,
        Self::AirQuality,
        Self::Co2,
        Self::Tvoc,
        Self::Uv,
        Self::Light,
        Self::Sound,
    ];

    /// Position of this metric in the registry
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Stable name used by the display and upload collaborators
    pub const fn name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
            Self::Gas => "gas",
            Self::AirQuality => "air_quality",
            Self::Co2 => "co2",
            Self::Tvoc => "tvoc",
            Self::Uv => "uv",
            Self::Light => "light",
            Self::Sound => "sound",
        }
    }

    /// Constant unit string for this metric
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "C",
            Self::Humidity => "%",
            Self::Pressure => "mbar",
            Self::Gas => "ohms",
            Self::AirQuality => "%",
            Self::Co2 => "ppm",
            Self::Tvoc => "ppb",
            Self::Uv => "uv",
            Self::Light => "lum",
            Self::Sound => "dB",
        }
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a metric name is not part of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownMetric;

impl FromStr for MetricId {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name() == s)
            .ok_or(UnknownMetric)
    }
}

/// Running statistics for a single metric.
///
/// Invariant: `sample_count == 0` exactly when `current`, `min`, `max` and
/// `avg` are all `None`, and `min <= current <= max` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metric {
    current: Option<f32>,
    min: Option<f32>,
    max: Option<f32>,
    avg: Option<f32>,
    #[serde(rename = "reads")]
    sample_count: u32,
    unit: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    risk_level: Option<UvRiskLevel>,
}

impl Metric {
    const fn empty(unit: &'static str) -> Self {
        Self {
            current: None,
            min: None,
            max: None,
            avg: None,
            sample_count: 0,
            unit,
            risk_level: None,
        }
    }

    /// Latest recorded value
    pub const fn current(&self) -> Option<f32> {
        self.current
    }

    /// Smallest value since the last reset
    pub const fn min(&self) -> Option<f32> {
        self.min
    }

    /// Largest value since the last reset
    pub const fn max(&self) -> Option<f32> {
        self.max
    }

    /// Mean of all values since the last reset
    pub const fn avg(&self) -> Option<f32> {
        self.avg
    }

    /// Number of samples since the last reset
    pub const fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub const fn unit(&self) -> &'static str {
        self.unit
    }

    /// UV risk level of the latest sample (UV only)
    pub const fn risk_level(&self) -> Option<UvRiskLevel> {
        self.risk_level
    }

    fn record(&mut self, value: f32) {
        let previous_count = self.sample_count;
        let count = previous_count + 1;

        self.current = Some(value);
        self.min = Some(self.min.map_or(value, |min| min.min(value)));
        self.max = Some(self.max.map_or(value, |max| max.max(value)));

        // The previous mean only contributes once at least one sample exists.
        // A stored mean of exactly zero is a real value, not "no mean".
        self.avg = Some(match self.avg {
            Some(prev) if previous_count > 0 => {
                ((prev as f64 * previous_count as f64 + value as f64) / count as f64) as f32
            }
            _ => value,
        });

        self.sample_count = count;
    }

    fn clear(&mut self) {
        *self = Self::empty(self.unit);
    }
}

/// Ordered collection of every metric, keyed by [`MetricId`].
///
/// Only [`record_sample`](Self::record_sample), [`record_uv`](Self::record_uv)
/// and [`reset_stats`](Self::reset_stats) mutate it.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRegistry {
    metrics: [Metric; MetricId::COUNT],
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    /// Create a registry with every metric empty
    pub fn new() -> Self {
        Self {
            metrics: MetricId::ALL.map(|id| Metric::empty(id.unit())),
        }
    }

    pub fn get(&self, id: MetricId) -> &Metric {
        &self.metrics[id.index()]
    }

    /// Iterate over all metrics in registry order
    pub fn iter(&self) -> impl Iterator<Item = (MetricId, &Metric)> {
        MetricId::ALL.iter().copied().zip(self.metrics.iter())
    }

    /// Record a new sample for `id`.
    ///
    /// Returns `false` without touching the registry if the value is not
    /// finite.
    pub fn record_sample(&mut self, id: MetricId, value: f32) -> bool {
        if !value.is_finite() {
            warn!("Ignoring non-finite sample {} for {}", value, id);
            return false;
        }

        self.metrics[id.index()].record(value);
        true
    }

    /// Record `value` if present. Returns whether the metric was updated.
    pub fn record(&mut self, id: MetricId, value: Option<f32>) -> bool {
        match value {
            Some(value) => self.record_sample(id, value),
            None => false,
        }
    }

    /// Record a raw UV reading together with its risk level.
    pub fn record_uv(&mut self, raw: f32, risk_level: Option<UvRiskLevel>) -> bool {
        if !self.record_sample(MetricId::Uv, raw) {
            return false;
        }

        self.metrics[MetricId::Uv.index()].risk_level = risk_level;
        true
    }

    /// Clear the statistics of every metric. Units are kept.
    pub fn reset_stats(&mut self) {
        for metric in self.metrics.iter_mut() {
            metric.clear();
        }
    }

    /// Immutable copy of the full registry state
    pub fn snapshot(&self) -> MetricRegistry {
        self.clone()
    }
}

impl Serialize for MetricRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(MetricId::COUNT))?;
        for (id, metric) in self.iter() {
            map.serialize_entry(id.name(), metric)?;
        }
        map.end()
    }
}
