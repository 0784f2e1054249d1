/// clima_service: hourly weather sampling for a fixed set of points.
///
/// # Module structure
///
/// ```text
/// clima_service
/// ├── model      - shared data types (MonitoredPoint, WeatherSample, FetchError, StoreError)
/// ├── condition  - vendor category -> closed Spanish label set
/// ├── config     - clima.toml + environment loader
/// ├── clock      - hour-boundary math and the Clock seam
/// ├── db         - Postgres connection string, connect, table check
/// ├── store      - SampleStore trait with Postgres and in-memory backends
/// ├── daemon     - Waiting/Running hourly loop
/// ├── endpoint   - GET /clima/latest, /clima?from&to, /health
/// └── ingest
///     ├── openweather - current weather API: URL construction + JSON parsing
///     └── fixtures (test only) - representative API response payloads
/// ```

/// Public modules
pub mod clock;
pub mod condition;
pub mod config;
pub mod daemon;
pub mod db;
pub mod endpoint;
pub mod ingest;
pub mod model;
pub mod store;
