//! Shared weather-station aggregate
//!
//! [`WeatherStation`] owns the metric registry behind a critical-section
//! mutex so the read loop, the display and the uploader can share one
//! instance by reference. Every write and every snapshot is one critical
//! section, so readers never observe a half-applied update.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::info;
use thiserror_no_std::Error;

use crate::classification::{Band, BandMap, ClassificationTables, ClassifyError, UvRiskLevel};
use crate::config::ConfigError;
use crate::metrics::{MetricId, MetricRegistry};

/// Setup-time failures of the station or the read orchestrator
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum StationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("classification setup failed: {0}")]
    Classify(#[from] ClassifyError),
}

pub struct WeatherStation {
    registry: Mutex<CriticalSectionRawMutex, RefCell<MetricRegistry>>,
    tables: ClassificationTables,
}

impl Default for WeatherStation {
    fn default() -> Self {
        Self::new(ClassificationTables::default())
    }
}

impl WeatherStation {
    pub fn new(tables: ClassificationTables) -> Self {
        Self {
            registry: Mutex::new(RefCell::new(MetricRegistry::new())),
            tables,
        }
    }

    /// Run `f` with exclusive access to the registry.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut MetricRegistry) -> R) -> R {
        self.registry.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn record_sample(&self, id: MetricId, value: f32) -> bool {
        self.update(|registry| registry.record_sample(id, value))
    }

    pub fn record(&self, id: MetricId, value: Option<f32>) -> bool {
        self.update(|registry| registry.record(id, value))
    }

    /// Record several samples as one atomic update.
    ///
    /// Returns how many of them were accepted.
    pub fn record_many(&self, samples: &[(MetricId, f32)]) -> usize {
        self.update(|registry| {
            samples
                .iter()
                .filter(|(id, value)| registry.record_sample(*id, *value))
                .count()
        })
    }

    pub fn record_uv(&self, raw: f32, risk_level: Option<UvRiskLevel>) -> bool {
        self.update(|registry| registry.record_uv(raw, risk_level))
    }

    pub fn reset_stats(&self) {
        self.update(|registry| registry.reset_stats());
        info!("Statistics reset");
    }

    /// Consistent copy of every metric
    pub fn snapshot(&self) -> MetricRegistry {
        self.registry.lock(|cell| cell.borrow().snapshot())
    }

    pub fn current(&self, id: MetricId) -> Option<f32> {
        self.registry.lock(|cell| cell.borrow().get(id).current())
    }

    pub fn tables(&self) -> &ClassificationTables {
        &self.tables
    }

    pub fn classify(&self, id: MetricId, value: f32) -> Result<Band, ClassifyError> {
        self.tables.classify(id, value)
    }

    /// Bands of every metric's current value in `snapshot`.
    pub fn bands(&self, snapshot: &MetricRegistry) -> Result<BandMap, ClassifyError> {
        self.tables.bands(snapshot)
    }
}
