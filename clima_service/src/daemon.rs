/// Hourly sampling daemon
///
/// Two states, repeated forever:
/// 1. Waiting: sleep until the next exact hour boundary in the configured zone
/// 2. Running: fetch every monitored point once and append what succeeds
///
/// A failing point never blocks the others, and nothing here is fatal.

use crate::clock::{self, Clock};
use crate::ingest::WeatherSource;
use crate::model::{FetchError, MonitoredPoint, NewSample, StoreError, WeatherSample};
use crate::store::SampleStore;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

// ---------------------------------------------------------------------------
// Cycle results
// ---------------------------------------------------------------------------

/// What happened to one point during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PointOutcome {
    Stored(WeatherSample),
    FetchFailed(FetchError),
    StoreFailed(StoreError),
}

/// Outcome of one Running pass, in point order.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// The boundary the daemon woke for (or the start instant of an
    /// immediate cycle).
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<(String, PointOutcome)>,
}

impl CycleReport {
    pub fn stored(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, PointOutcome::Stored(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.stored()
    }

    /// True when there was at least one point and none of them stored.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.stored() == 0
    }
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

pub struct Daemon {
    points: Vec<MonitoredPoint>,
    source: Box<dyn WeatherSource>,
    store: Arc<dyn SampleStore>,
    clock: Arc<dyn Clock>,
    tz: Tz,
}

impl Daemon {
    pub fn new(
        points: Vec<MonitoredPoint>,
        source: Box<dyn WeatherSource>,
        store: Arc<dyn SampleStore>,
        clock: Arc<dyn Clock>,
        tz: Tz,
    ) -> Self {
        Self {
            points,
            source,
            store,
            clock,
            tz,
        }
    }

    /// Attempts every monitored point exactly once.
    pub fn run_cycle(&self) -> CycleReport {
        let started_at = self.clock.now();
        let mut outcomes = Vec::with_capacity(self.points.len());

        for point in &self.points {
            let outcome = self.sample_point(point);
            outcomes.push((point.name.clone(), outcome));
        }

        CycleReport {
            started_at,
            outcomes,
        }
    }

    fn sample_point(&self, point: &MonitoredPoint) -> PointOutcome {
        let observation = match self.source.observe(point) {
            Ok(obs) => obs,
            Err(e) => {
                warn!(point = %point.name, error = %e, "fetch failed, skipping point");
                return PointOutcome::FetchFailed(e);
            }
        };

        // Labelled with the hour the cycle belongs to, not the fetch instant
        let hour = clock::floor_to_hour(self.clock.now(), &self.tz);
        let sample = NewSample::from_observation(&observation, hour);
        debug!(
            point = %point.name,
            raw = %observation.raw_condition,
            condition = %sample.condition,
            "normalized observation"
        );

        match self.store.append(&sample) {
            Ok(id) => {
                info!(
                    point = %point.name,
                    id,
                    timestamp = %clock::to_local_rfc3339(hour, &self.tz),
                    temperatura = sample.temperature,
                    humedad = sample.humidity,
                    estado_clima = %sample.condition,
                    "sample stored"
                );
                PointOutcome::Stored(WeatherSample::from_new(id, &sample))
            }
            Err(e) => {
                error!(point = %point.name, error = %e, "sample lost, store write failed");
                PointOutcome::StoreFailed(e)
            }
        }
    }

    /// Waits for the next hour boundary, then runs one cycle.
    pub fn step(&self) -> CycleReport {
        let boundary = clock::next_hour_boundary(self.clock.now(), &self.tz);
        debug!(next = %clock::to_local_rfc3339(boundary, &self.tz), "waiting for hour boundary");
        clock::wait_for(self.clock.as_ref(), boundary);

        let mut report = self.run_cycle();
        report.started_at = boundary;
        info!(
            boundary = %clock::to_local_rfc3339(boundary, &self.tz),
            stored = report.stored(),
            failed = report.failed(),
            "cycle complete"
        );
        report
    }

    /// Main daemon loop (runs until the process exits)
    pub fn run(&self) -> ! {
        info!(points = self.points.len(), timezone = %self.tz, "hourly sampling started");
        loop {
            self.step();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
