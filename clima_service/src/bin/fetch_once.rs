/// Run one sampling cycle immediately, without waiting for the hour
/// boundary, and print each point's outcome.
///
/// Useful for checking the API key and database setup before starting
/// the daemon. Exits non-zero when every point failed.
///
/// Usage:
///   cargo run --bin fetch_once
///   cargo run --bin fetch_once -- --memory

use anyhow::Context;
use clap::Parser;
use clima_service::clock::{SystemClock, to_local_rfc3339};
use clima_service::config::{self, ServiceConfig};
use clima_service::daemon::{Daemon, PointOutcome};
use clima_service::db;
use clima_service::ingest::openweather::OpenWeatherSource;
use clima_service::store::{MemoryStore, PgStore, SampleStore};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "fetch_once", version, about = "Run a single sampling cycle now")]
struct Args {
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Do not touch the database
    #[arg(long, default_value_t = false)]
    memory: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = ServiceConfig::load(&args.config)?;

    let store: Arc<dyn SampleStore> = if args.memory {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(PgStore::open(db::database_url_from(config::env_var)?)?)
    };

    let source = OpenWeatherSource::new(&config.openweather, config.api_key.clone())
        .context("failed to build the OpenWeather HTTP client")?;
    let tz = config.timezone;
    let daemon = Daemon::new(config.points, Box::new(source), store, Arc::new(SystemClock), tz);

    let report = daemon.run_cycle();
    for (point, outcome) in &report.outcomes {
        match outcome {
            PointOutcome::Stored(sample) => println!(
                "✓ {}: #{} {} {:.1}°C {}% {}",
                point,
                sample.id,
                to_local_rfc3339(sample.timestamp, &tz),
                sample.temperature,
                sample.humidity,
                sample.condition
            ),
            PointOutcome::FetchFailed(e) => println!("✗ {}: fetch failed: {}", point, e),
            PointOutcome::StoreFailed(e) => println!("✗ {}: store failed: {}", point, e),
        }
    }
    println!("\n{} stored, {} failed", report.stored(), report.failed());

    if report.all_failed() {
        std::process::exit(1);
    }
    Ok(())
}
