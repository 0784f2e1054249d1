/// Integration tests for one full sampling cycle against a local stub of
/// the OpenWeather current weather endpoint.
///
/// The stub answers by latitude so each monitored point exercises a
/// different upstream behavior. Samples go to a MemoryStore and time is
/// driven by a ManualClock, so no database or network access is needed.
///
/// Run with: cargo test --test ingest_cycle

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::America::Argentina::Buenos_Aires;
use clima_service::clock::ManualClock;
use clima_service::condition::Condition;
use clima_service::config::OpenWeatherSettings;
use clima_service::daemon::{Daemon, PointOutcome};
use clima_service::ingest::openweather::OpenWeatherSource;
use clima_service::model::{FetchError, MonitoredPoint};
use clima_service::store::{MemoryStore, SampleStore};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const RAIN: &str = r#"{"main":{"temp":21.5,"humidity":60},"weather":[{"main":"Rain"}]}"#;
const NO_WEATHER: &str = r#"{"main":{"temp":21.5,"humidity":60},"weather":[]}"#;

fn ba(h: u32, m: u32) -> DateTime<Utc> {
    Buenos_Aires
        .with_ymd_and_hms(2026, 10, 14, h, m, 0)
        .unwrap()
        .with_timezone(&Utc)
}

/// Starts the stub upstream and returns its base URL plus a log of every
/// request URL it received.
fn start_stub_upstream(delay: Duration) -> (String, Arc<Mutex<Vec<String>>>) {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("bind stub upstream");
    let addr = server.server_addr().to_ip().expect("stub listens on TCP");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    thread::spawn(move || {
        for request in server.incoming_requests() {
            let url = request.url().to_string();
            log.lock().unwrap().push(url.clone());
            thread::sleep(delay);

            let (status, body) = if url.contains("lat=-34.6037") {
                (200u16, RAIN)
            } else if url.contains("lat=-31.4201") {
                (500, r#"{"cod":500,"message":"Internal error"}"#)
            } else if url.contains("lat=-32.9468") {
                (200, NO_WEATHER)
            } else {
                (404, r#"{"cod":"404","message":"city not found"}"#)
            };

            let response = tiny_http::Response::from_string(body).with_status_code(status);
            let _ = request.respond(response);
        }
    });

    (format!("http://{}/data/2.5/weather", addr), seen)
}

fn source_for(base_url: &str, timeout_secs: u64) -> OpenWeatherSource {
    let settings = OpenWeatherSettings {
        base_url: base_url.to_string(),
        units: "metric".to_string(),
        lang: Some("es".to_string()),
        timeout_secs,
    };
    OpenWeatherSource::new(&settings, Some("test-key".to_string())).expect("client builds")
}

fn points() -> Vec<MonitoredPoint> {
    vec![
        MonitoredPoint::new("Cordoba", -31.4201, -64.1888),
        MonitoredPoint::new("BuenosAires", -34.6037, -58.3816),
        MonitoredPoint::new("Rosario", -32.9468, -60.6393),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_cycle_stores_good_points_and_skips_failures() {
    let (base_url, seen) = start_stub_upstream(Duration::ZERO);
    let clock = Arc::new(ManualClock::new(ba(14, 5)));
    let store = Arc::new(MemoryStore::new());
    let daemon = Daemon::new(
        points(),
        Box::new(source_for(&base_url, 10)),
        store.clone(),
        clock.clone(),
        Buenos_Aires,
    );

    let report = daemon.step();

    assert_eq!(clock.sleeps(), vec![ba(15, 0)], "cycle must start on the 15:00 boundary");
    assert_eq!(report.outcomes.len(), 3, "every point is attempted exactly once");

    let outcome = |name: &str| {
        report
            .outcomes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| o.clone())
            .unwrap()
    };
    assert_eq!(outcome("Cordoba"), PointOutcome::FetchFailed(FetchError::UpstreamStatus(500)));
    assert_eq!(outcome("Rosario"), PointOutcome::FetchFailed(FetchError::NoConditionData));
    assert!(matches!(outcome("BuenosAires"), PointOutcome::Stored(_)));

    assert_eq!(store.len(), 1);
    let latest = store.latest().unwrap();
    assert_eq!(latest.timestamp, ba(15, 0));
    assert_eq!(latest.temperature, 21.5);
    assert_eq!(latest.humidity, 60);
    assert_eq!(latest.condition, Condition::Rain);

    let urls = seen.lock().unwrap().clone();
    assert_eq!(urls.len(), 3);
    for url in &urls {
        assert!(url.starts_with("/data/2.5/weather?"), "got: {}", url);
        assert!(url.contains("appid=test-key"));
        assert!(url.contains("units=metric"));
        assert!(url.contains("lang=es"));
    }
}

#[test]
fn test_two_cycles_append_two_rows() {
    let (base_url, _) = start_stub_upstream(Duration::ZERO);
    let clock = Arc::new(ManualClock::new(ba(14, 5)));
    let store = Arc::new(MemoryStore::new());
    let daemon = Daemon::new(
        vec![MonitoredPoint::new("BuenosAires", -34.6037, -58.3816)],
        Box::new(source_for(&base_url, 10)),
        store.clone(),
        clock.clone(),
        Buenos_Aires,
    );

    daemon.step();
    daemon.step();

    let stamps: Vec<_> = store.all().iter().map(|s| s.timestamp).collect();
    assert_eq!(stamps, vec![ba(15, 0), ba(16, 0)]);
    assert_eq!(store.latest().unwrap().id, 2);
}

#[test]
fn test_slow_upstream_times_out_as_transport_error() {
    let (base_url, _) = start_stub_upstream(Duration::from_secs(3));
    let source = source_for(&base_url, 1);
    let result = source.fetch(&MonitoredPoint::new("BuenosAires", -34.6037, -58.3816), "test-key");

    match result {
        Err(FetchError::Transport(msg)) => {
            assert!(!msg.contains("test-key"), "API key must not leak into errors: {}", msg)
        }
        other => panic!("expected Transport error, got {:?}", other),
    }
}

#[test]
fn test_unreachable_upstream_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let source = source_for(&format!("http://127.0.0.1:{}/weather", port), 2);
    let result = source.fetch(&MonitoredPoint::new("BuenosAires", -34.6037, -58.3816), "test-key");
    assert!(matches!(result, Err(FetchError::Transport(_))));
}
