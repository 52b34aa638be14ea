//! Upload collaborator interface
//!
//! [`UploadPayload`] shapes the JSON body sent to the remote endpoint and
//! [`UploadScheduler`] decides when an upload is due. Statistics are reset
//! right after every accepted upload so each upload covers a fresh window.

use alloc::format;
use alloc::string::String;

use embassy_time::{Duration, Instant};
use log::{info, warn};
use serde::Serialize;

use crate::metrics::{MetricId, MetricRegistry};
use crate::station::WeatherStation;

/// HTTP status the endpoint answers with when it stores a reading
pub const UPLOAD_ACCEPTED_STATUS: u16 = 201;

/// Remote endpoint the payload is posted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub base_url: &'a str,
    pub path: &'a str,
    pub token: &'a str,
}

impl Endpoint<'_> {
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    /// Value of the `Authorization` header
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            ("Authorization", self.authorization()),
            ("Content-Type", String::from("application/json")),
            ("Accept", String::from("application/json")),
        ]
    }

    pub fn accepted(status: u16) -> bool {
        status == UPLOAD_ACCEPTED_STATUS
    }
}

/// JSON body of one upload. Absent values are left out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UploadPayload {
    pub hardware_device_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_resistance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_quality: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eco2: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvoc: Option<f32>,
}

impl UploadPayload {
    /// Current values of `snapshot`
    pub fn from_snapshot(hardware_device_id: u32, snapshot: &MetricRegistry) -> Self {
        let current = |id: MetricId| snapshot.get(id).current();
        Self {
            hardware_device_id,
            temperature: current(MetricId::Temperature),
            humidity: current(MetricId::Humidity),
            pressure: current(MetricId::Pressure),
            gas_resistance: current(MetricId::Gas),
            air_quality: current(MetricId::AirQuality),
            eco2: current(MetricId::Co2),
            tvoc: current(MetricId::Tvoc),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Sends snapshots to the remote endpoint.
pub trait Uploader {
    /// Returns whether the endpoint accepted the upload.
    fn upload(&mut self, snapshot: &MetricRegistry) -> impl Future<Output = bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    NotDue,
    Uploaded,
    Failed,
}

/// Spaces uploads at least `interval` apart.
///
/// Both accepted and failed attempts restart the interval.
pub struct UploadScheduler {
    interval: Duration,
    last_attempt: Instant,
}

impl UploadScheduler {
    pub fn new(now: Instant, interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: now,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_attempt) >= self.interval
    }

    /// Upload a snapshot of `station` if the interval has elapsed.
    pub async fn poll<U: Uploader>(
        &mut self,
        now: Instant,
        station: &WeatherStation,
        uploader: &mut U,
    ) -> UploadOutcome {
        if !self.is_due(now) {
            return UploadOutcome::NotDue;
        }
        self.last_attempt = now;

        let snapshot = station.snapshot();
        if uploader.upload(&snapshot).await {
            info!("Upload accepted");
            station.reset_stats();
            UploadOutcome::Uploaded
        } else {
            warn!("Upload failed, keeping statistics for the next attempt");
            UploadOutcome::Failed
        }
    }
}
