//! Weather Sampling Service - Main Daemon
//!
//! Once per hour, on the exact boundary in the configured timezone:
//! 1. Fetches current conditions for every point in clima.toml
//! 2. Normalizes the vendor category to a fixed Spanish label
//! 3. Appends one row per point to the `clima` table
//!
//! An HTTP endpoint serves the newest sample at GET /clima/latest.
//!
//! Usage:
//!   cargo run --release                          # daemon + endpoint on PORT (default 8080)
//!   cargo run --release -- --no-endpoint         # daemon only
//!   cargo run --release -- --memory --port 9000  # no database, samples kept in memory
//!
//! Environment:
//!   OPENWEATHER_KEY          - OpenWeather API key
//!   DATABASE_URL             - PostgreSQL connection string (or POSTGRES_USER/PASS/HOST/PORT/DB)
//!   PORT, CLIMA_TIMEZONE, CORS_ALLOW_ORIGIN, RUST_LOG

use anyhow::Context;
use clap::Parser;
use clima_service::clock::SystemClock;
use clima_service::config::{self, ServiceConfig};
use clima_service::daemon::Daemon;
use clima_service::db;
use clima_service::endpoint::{self, EndpointSettings};
use clima_service::ingest::openweather::OpenWeatherSource;
use clima_service::store::{MemoryStore, PgStore, SampleStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug, Clone)]
#[command(name = "clima_service", version, about = "Hourly weather sampling daemon")]
pub struct Args {
    /// Path to the service configuration file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
    /// HTTP port; overrides PORT and the config file
    #[arg(long)]
    pub port: Option<u16>,
    /// Run the sampling loop without the HTTP endpoint
    #[arg(long, default_value_t = false)]
    pub no_endpoint: bool,
    /// Keep samples in memory instead of PostgreSQL
    #[arg(long, default_value_t = false)]
    pub memory: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = ServiceConfig::load(&args.config)?;
    if let Some(port) = args.port {
        config.port = port;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.port,
        points = config.points.len(),
        timezone = %config.timezone,
        store = if args.memory { "memory" } else { "postgres" },
        "clima_service starting"
    );

    let store: Arc<dyn SampleStore> = if args.memory {
        Arc::new(MemoryStore::new())
    } else {
        let store = PgStore::open(db::database_url_from(config::env_var)?)?;
        info!(table = db::SAMPLE_TABLE, "database connection verified");
        Arc::new(store)
    };

    if config.api_key.is_none() {
        warn!("OPENWEATHER_KEY is not set; every point will be skipped until it is configured");
    }

    let source = OpenWeatherSource::new(&config.openweather, config.api_key.clone())
        .context("failed to build the OpenWeather HTTP client")?;

    if !args.no_endpoint {
        let server = endpoint::bind(config.port).map_err(anyhow::Error::msg)?;
        let settings = EndpointSettings {
            timezone: config.timezone,
            cors_allow_origin: config.cors_allow_origin.clone(),
            workers: config.endpoint_workers,
        };
        let store = Arc::clone(&store);
        std::thread::Builder::new()
            .name("endpoint".to_string())
            .spawn(move || endpoint::serve(server, store, settings))
            .context("failed to spawn the endpoint thread")?;
        info!(port = config.port, "endpoint running on http://0.0.0.0:{}/clima/latest", config.port);
    }

    let daemon = Daemon::new(
        config.points,
        Box::new(source),
        store,
        Arc::new(SystemClock),
        config.timezone,
    );
    daemon.run()
}
