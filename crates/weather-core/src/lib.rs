//! Hardware-independent core library for the weather station
//!
//! This crate contains all platform-agnostic logic for the station: the metric
//! registry and its running statistics, the band/risk classifiers, the sensor
//! adapters with their compensation math, the read-cycle orchestrator, and the
//! interfaces consumed by the display and upload collaborators.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod classification;
pub mod clock;
pub mod config;
pub mod display;
pub mod metrics;
pub mod orchestrator;
pub mod sensors;
pub mod station;
pub mod upload;

pub use classification::{Band, ClassifyError, UvRiskLevel};
pub use config::StationConfig;
pub use display::{Display, Tile};
pub use metrics::{Metric, MetricId, MetricRegistry};
pub use orchestrator::{CyclePhase, CycleReport, ReadOrchestrator};
pub use station::{StationError, WeatherStation};
pub use upload::{UploadPayload, UploadScheduler, Uploader};
