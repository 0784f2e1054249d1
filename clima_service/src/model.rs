/// Shared data types for the weather sampling pipeline.
///
/// Everything that crosses a module boundary lives here: the monitored
/// point registry entry, the raw vendor observation, the persisted sample,
/// and the two error taxonomies (fetch side and store side).

use crate::condition::Condition;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Monitored points
// ---------------------------------------------------------------------------

/// A fixed geographic location sampled once per cycle.
///
/// Loaded from `clima.toml` at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MonitoredPoint {
    pub name: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
}

impl MonitoredPoint {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

// ---------------------------------------------------------------------------
// Observations and samples
// ---------------------------------------------------------------------------

/// Minimal record extracted from one upstream response, before the
/// vendor category has been normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    /// Air temperature in °C (the request asks for metric units).
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: i32,
    /// `weather[0].main` exactly as the vendor sent it.
    pub raw_condition: String,
}

/// A sample ready to be appended; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSample {
    /// Hour boundary the sample belongs to, not the fetch instant.
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: i32,
    pub condition: Condition,
}

impl NewSample {
    /// Normalizes a raw observation and labels it with `hour`.
    pub fn from_observation(observation: &RawObservation, hour: DateTime<Utc>) -> Self {
        Self {
            timestamp: hour,
            temperature: observation.temperature,
            humidity: observation.humidity,
            condition: crate::condition::normalize(&observation.raw_condition),
        }
    }
}

/// One persisted row of the `clima` table.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSample {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: i32,
    pub condition: Condition,
}

impl WeatherSample {
    pub fn from_new(id: i64, sample: &NewSample) -> Self {
        Self {
            id,
            timestamp: sample.timestamp,
            temperature: sample.temperature,
            humidity: sample.humidity,
            condition: sample.condition,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong fetching one point. None of these are
/// fatal; the scheduler logs them and moves on to the next point.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    #[error("OPENWEATHER_KEY is not configured")]
    Unconfigured,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned HTTP {0}")]
    UpstreamStatus(u16),
    #[error("could not decode upstream response: {0}")]
    Decode(String),
    #[error("upstream response has an empty weather list")]
    NoConditionData,
}

/// Sample store failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("failed to write sample: {0}")]
    Write(String),
    #[error("failed to read samples: {0}")]
    Read(String),
    #[error("no samples stored")]
    NotFound,
}
