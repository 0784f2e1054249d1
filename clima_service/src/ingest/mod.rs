/// Upstream weather data sources.
///
/// Each provider gets its own file under `ingest/`. The daemon only sees
/// the `WeatherSource` trait.

pub mod openweather;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::model::{FetchError, MonitoredPoint, RawObservation};

/// Something that can report current conditions for a point.
///
/// Implementations never panic on upstream trouble; every failure is a
/// `FetchError` value.
pub trait WeatherSource: Send + Sync {
    fn observe(&self, point: &MonitoredPoint) -> Result<RawObservation, FetchError>;
}
