//! Display collaborator interface
//!
//! The core decides what every tile shows: its formatted value, unit, band
//! color and icon key. Pixel layout belongs to the [`Display`] implementation.

use core::fmt::Write;

use embedded_graphics::pixelcolor::Rgb565;
use heapless::String;

use crate::classification::{Band, BandMap};
use crate::metrics::{MetricId, MetricRegistry};

/// Tile layout of the status screen, row by row
pub const TILE_GRID: [[MetricId; 3]; 3] = [
    [MetricId::Temperature, MetricId::AirQuality, MetricId::Light],
    [MetricId::Humidity, MetricId::Co2, MetricId::Uv],
    [MetricId::Pressure, MetricId::Tvoc, MetricId::Sound],
];

/// Values above this are shown without decimals
const INTEGER_DISPLAY_THRESHOLD: f32 = 999.9;

/// Color of a tile whose metric has no band yet
pub const UNCLASSIFIED_COLOR: Rgb565 = Rgb565::new(8, 16, 8);

pub type TileValue = String<16>;
pub type IconPath = String<48>;

/// A consumer of metric snapshots.
pub trait Display {
    type Error: core::fmt::Debug;

    fn render(&mut self, snapshot: &MetricRegistry, bands: &BandMap) -> Result<(), Self::Error>;
}

/// Format a tile value: `-` when absent, no decimals above 999.9, one decimal
/// otherwise.
pub fn format_value(value: Option<f32>) -> TileValue {
    let mut text = TileValue::new();
    let written = match value {
        None => text.push_str("-").map_err(|_| core::fmt::Error),
        Some(v) if v > INTEGER_DISPLAY_THRESHOLD => write!(text, "{}", libm::truncf(v) as i64),
        Some(v) => write!(text, "{:.1}", v),
    };

    if written.is_err() {
        text.clear();
        let _ = text.push_str("###");
    }
    text
}

/// Icon key for a metric tile. Unclassified metrics use the medium icon.
pub fn icon_path(metric: MetricId, band: Option<Band>) -> IconPath {
    let band = band.unwrap_or(Band::Medium);
    let mut path = IconPath::new();
    // Longest key is well under the capacity
    let _ = write!(path, "/images/{}_{}.rgb565", metric.name(), band.label());
    path
}

/// Everything needed to draw one tile
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub metric: MetricId,
    pub value: TileValue,
    pub unit: &'static str,
    pub band: Option<Band>,
    pub icon: IconPath,
}

impl Tile {
    pub fn new(metric: MetricId, snapshot: &MetricRegistry, bands: &BandMap) -> Self {
        let band = bands.get(metric);
        Self {
            metric,
            value: format_value(snapshot.get(metric).current()),
            unit: metric.unit(),
            band,
            icon: icon_path(metric, band),
        }
    }

    pub fn color(&self) -> Rgb565 {
        self.band.map_or(UNCLASSIFIED_COLOR, Band::color)
    }
}

/// Build every tile of [`TILE_GRID`] from one snapshot.
pub fn tiles(snapshot: &MetricRegistry, bands: &BandMap) -> [[Tile; 3]; 3] {
    TILE_GRID.map(|row| row.map(|metric| Tile::new(metric, snapshot, bands)))
}
