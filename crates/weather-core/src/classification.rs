//! Band and risk classification for metric values
//!
//! Maps a metric's current value onto a coarse qualitative [`Band`] using a
//! per-metric [`ClassificationTable`], and maps raw UV readings onto the
//! five-tier [`UvRiskLevel`] scale. Both are used for display iconography.

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::WebColors;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::metrics::{MetricId, MetricRegistry};

/// Errors raised while classifying a value
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ClassifyError {
    #[error("value {value} is outside every band of {metric}")]
    OutOfRange { metric: MetricId, value: f32 },
    #[error("no classification table for {0}")]
    NoTable(MetricId),
    #[error("UV index is unsupported for the half-T integration time")]
    UnsupportedIntegrationTime,
}

/// Coarse qualitative classification of a metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Low,
    Medium,
    High,
}

impl Band {
    /// Bands in scan order
    pub const ALL: [Band; 3] = [Band::Low, Band::Medium, Band::High];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Get the display color for this band
    pub const fn color(self) -> Rgb565 {
        match self {
            Self::Low => Rgb565::CSS_DEEP_SKY_BLUE,
            Self::Medium => Rgb565::CSS_GREEN,
            Self::High => Rgb565::CSS_ORANGE_RED,
        }
    }
}

/// Closed interval `[lower, upper]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRange {
    pub lower: f32,
    pub upper: f32,
}

impl BandRange {
    pub const fn new(lower: f32, upper: f32) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, value: f32) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Low/medium/high intervals for one metric.
///
/// Touching bounds are allowed: a value equal to the shared bound belongs to
/// the lower band because bands are scanned low, then medium, then high.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationTable {
    pub low: BandRange,
    pub medium: BandRange,
    pub high: BandRange,
}

impl ClassificationTable {
    pub const fn new(low: (f32, f32), medium: (f32, f32), high: (f32, f32)) -> Self {
        Self {
            low: BandRange::new(low.0, low.1),
            medium: BandRange::new(medium.0, medium.1),
            high: BandRange::new(high.0, high.1),
        }
    }

    pub const fn range(&self, band: Band) -> BandRange {
        match band {
            Band::Low => self.low,
            Band::Medium => self.medium,
            Band::High => self.high,
        }
    }

    /// First band whose closed interval contains `value`
    pub fn classify(&self, value: f32) -> Option<Band> {
        Band::ALL
            .into_iter()
            .find(|band| self.range(*band).contains(value))
    }
}

/// Per-metric classification tables, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationTables {
    tables: [Option<ClassificationTable>; MetricId::COUNT],
}

impl Default for ClassificationTables {
    fn default() -> Self {
        let mut tables = [None; MetricId::COUNT];

        let mut set = |id: MetricId, table| tables[id.index()] = Some(table);
        set(
            MetricId::Temperature,
            ClassificationTable::new((0.0, 21.0), (21.0, 25.0), (25.0, 1000.0)),
        );
        set(
            MetricId::Humidity,
            ClassificationTable::new((0.0, 40.0), (40.0, 65.0), (65.0, 100.0)),
        );
        set(
            MetricId::Pressure,
            ClassificationTable::new((0.0, 1008.0), (1008.0, 1018.0), (1018.0, 10000.0)),
        );
        set(
            MetricId::AirQuality,
            ClassificationTable::new((0.0, 50.0), (50.0, 70.0), (70.0, 100.0)),
        );
        set(
            MetricId::Co2,
            ClassificationTable::new((0.0, 500.0), (500.0, 700.0), (700.0, 10000.0)),
        );
        set(
            MetricId::Tvoc,
            ClassificationTable::new((0.0, 65.0), (65.0, 220.0), (220.0, 3000.0)),
        );
        set(
            MetricId::Light,
            ClassificationTable::new((0.0, 100.0), (100.0, 2000.0), (2000.0, 100000.0)),
        );
        set(
            MetricId::Uv,
            ClassificationTable::new((0.0, 2.0), (2.0, 5.0), (5.0, 11.0)),
        );
        set(
            MetricId::Sound,
            ClassificationTable::new((-200.0, 40.0), (40.0, 60.0), (60.0, 10000.0)),
        );

        Self { tables }
    }
}

impl ClassificationTables {
    /// Tables with no entries at all
    pub const fn empty() -> Self {
        Self {
            tables: [None; MetricId::COUNT],
        }
    }

    /// Replace (or add) the table for `id`
    pub fn with_table(mut self, id: MetricId, table: ClassificationTable) -> Self {
        self.tables[id.index()] = Some(table);
        self
    }

    pub fn get(&self, id: MetricId) -> Option<&ClassificationTable> {
        self.tables[id.index()].as_ref()
    }

    /// Classify `value` for `metric`
    pub fn classify(&self, metric: MetricId, value: f32) -> Result<Band, ClassifyError> {
        let table = self.get(metric).ok_or(ClassifyError::NoTable(metric))?;
        table
            .classify(value)
            .ok_or(ClassifyError::OutOfRange { metric, value })
    }

    /// Band of every metric's current value in `snapshot`.
    ///
    /// Metrics without a value or without a table get no band. UV uses the
    /// band implied by its risk level, since its current value is a raw count.
    pub fn bands(&self, snapshot: &MetricRegistry) -> Result<BandMap, ClassifyError> {
        let mut bands = BandMap::empty();

        for (id, metric) in snapshot.iter() {
            let band = match (id, metric.current()) {
                (_, None) => None,
                (MetricId::Uv, Some(_)) => metric.risk_level().map(Band::from),
                (_, Some(_)) if self.get(id).is_none() => None,
                (_, Some(value)) => Some(self.classify(id, value)?),
            };
            bands.set(id, band);
        }

        Ok(bands)
    }
}

/// Band per metric, in registry order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandMap {
    bands: [Option<Band>; MetricId::COUNT],
}

impl BandMap {
    pub const fn empty() -> Self {
        Self {
            bands: [None; MetricId::COUNT],
        }
    }

    pub fn get(&self, id: MetricId) -> Option<Band> {
        self.bands[id.index()]
    }

    pub fn set(&mut self, id: MetricId, band: Option<Band>) {
        self.bands[id.index()] = band;
    }
}

/// UV exposure risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UvRiskLevel {
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MODERATE")]
    Moderate,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "VERY HIGH")]
    VeryHigh,
    #[serde(rename = "EXTREME")]
    Extreme,
}

impl UvRiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::High => "HIGH",
            Self::VeryHigh => "VERY HIGH",
            Self::Extreme => "EXTREME",
        }
    }
}

impl From<UvRiskLevel> for Band {
    fn from(level: UvRiskLevel) -> Self {
        match level {
            UvRiskLevel::Low => Band::Low,
            UvRiskLevel::Moderate => Band::Medium,
            UvRiskLevel::High | UvRiskLevel::VeryHigh | UvRiskLevel::Extreme => Band::High,
        }
    }
}

/// Half-open `[lower, upper)` risk intervals on the divisor-adjusted reading.
///
/// The VEML6070 application note leaves 560, 1120, 1494 and 2054 outside
/// every interval; those readings have no risk level.
const UV_RISK_TABLE: [(UvRiskLevel, u32, u32); 5] = [
    (UvRiskLevel::Low, 0, 560),
    (UvRiskLevel::Moderate, 561, 1120),
    (UvRiskLevel::High, 1121, 1494),
    (UvRiskLevel::VeryHigh, 1495, 2054),
    (UvRiskLevel::Extreme, 2055, 9999),
];

/// Risk level of a raw VEML6070 reading.
///
/// `integration_divisor` is the divisor of the configured integration time;
/// zero means the UV index is not defined for that integration time.
pub fn uv_risk_level(raw: u16, integration_divisor: u8) -> Result<UvRiskLevel, ClassifyError> {
    if integration_divisor == 0 {
        return Err(ClassifyError::UnsupportedIntegrationTime);
    }

    let adjusted = raw as u32 / integration_divisor as u32;

    UV_RISK_TABLE
        .iter()
        .find(|(_, lower, upper)| *lower <= adjusted && adjusted < *upper)
        .map(|(level, _, _)| *level)
        .ok_or(ClassifyError::OutOfRange {
            metric: MetricId::Uv,
            value: adjusted as f32,
        })
}
