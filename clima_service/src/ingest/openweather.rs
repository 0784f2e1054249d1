/// OpenWeather current-conditions API client.
///
/// One GET per monitored point against:
///   https://api.openweathermap.org/data/2.5/weather
///
/// Only three fields of the response are used: `main.temp`,
/// `main.humidity` and `weather[0].main`. See `fixtures.rs` for annotated
/// examples of the response shape.

use crate::config::OpenWeatherSettings;
use crate::ingest::WeatherSource;
use crate::model::{FetchError, MonitoredPoint, RawObservation};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

// ---------------------------------------------------------------------------
// Serde structures for the current weather response
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CurrentResponse {
    main: MainBlock,
    weather: Vec<WeatherBlock>,
}

#[derive(Deserialize)]
struct MainBlock {
    temp: f64,
    humidity: i32,
}

#[derive(Deserialize)]
struct WeatherBlock {
    main: String,
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

/// Builds the current-weather URL for one point.
///
/// The API key is URL-encoded; `lang` is only sent when configured.
///
/// # Example
/// ```
/// use clima_service::ingest::openweather::{build_current_url, DEFAULT_BASE_URL};
/// use clima_service::model::MonitoredPoint;
///
/// let point = MonitoredPoint::new("BuenosAires", -34.6037, -58.3816);
/// let url = build_current_url(DEFAULT_BASE_URL, &point, "secret", "metric", Some("es"));
/// assert!(url.contains("lat=-34.6037"));
/// ```
pub fn build_current_url(
    base_url: &str,
    point: &MonitoredPoint,
    api_key: &str,
    units: &str,
    lang: Option<&str>,
) -> String {
    let mut url = format!(
        "{}?lat={}&lon={}&appid={}&units={}",
        base_url,
        point.latitude,
        point.longitude,
        urlencoding::encode(api_key),
        urlencoding::encode(units)
    );

    if let Some(lang) = lang {
        url.push_str("&lang=");
        url.push_str(&urlencoding::encode(lang));
    }

    url
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Decodes a current-weather response body.
///
/// Vendor responses may list several simultaneous conditions; only the
/// first is kept.
///
/// # Errors
/// - `FetchError::Decode` - malformed JSON, missing fields, or a humidity
///   outside 0-100.
/// - `FetchError::NoConditionData` - `weather` is an empty array.
pub fn parse_current_response(body: &str) -> Result<RawObservation, FetchError> {
    let response: CurrentResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Decode(format!("JSON deserialization failed: {}", e)))?;

    let primary = response
        .weather
        .into_iter()
        .next()
        .ok_or(FetchError::NoConditionData)?;

    if !(0..=100).contains(&response.main.humidity) {
        return Err(FetchError::Decode(format!(
            "humidity {} is outside 0-100",
            response.main.humidity
        )));
    }

    Ok(RawObservation {
        temperature: response.main.temp,
        humidity: response.main.humidity,
        raw_condition: primary.main,
    })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Blocking OpenWeather client used by the hourly daemon.
pub struct OpenWeatherSource {
    http: reqwest::blocking::Client,
    base_url: String,
    units: String,
    lang: Option<String>,
    api_key: Option<String>,
}

impl OpenWeatherSource {
    /// Builds the HTTP client with the configured per-request timeout.
    pub fn new(settings: &OpenWeatherSettings, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("clima_service/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            units: settings.units.clone(),
            lang: settings.lang.clone(),
            api_key,
        })
    }

    /// Fetches current conditions for `point`.
    ///
    /// An empty key is rejected before any request is made.
    pub fn fetch(&self, point: &MonitoredPoint, api_key: &str) -> Result<RawObservation, FetchError> {
        if api_key.trim().is_empty() {
            return Err(FetchError::Unconfigured);
        }

        let url = build_current_url(&self.base_url, point, api_key, &self.units, self.lang.as_deref());

        // without_url() keeps the appid out of error messages and logs
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UpstreamStatus(status.as_u16()));
        }

        let body = response
            .text()
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;

        parse_current_response(&body)
    }
}

impl WeatherSource for OpenWeatherSource {
    fn observe(&self, point: &MonitoredPoint) -> Result<RawObservation, FetchError> {
        self.fetch(point, self.api_key.as_deref().unwrap_or(""))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
