/// Service configuration loader - parses clima.toml and the environment.
///
/// The file holds the monitored point registry and the non-secret knobs.
/// Secrets and deployment-specific values come from the environment (a
/// `.env` file is honored), and environment values win over the file.
///
/// ```toml
/// [service]
/// timezone = "America/Argentina/Buenos_Aires"
/// port = 8080
///
/// [openweather]
/// units = "metric"
/// lang = "es"
///
/// [[point]]
/// name = "BuenosAires"
/// latitude = -34.6037
/// longitude = -58.3816
/// ```

use crate::ingest::openweather::DEFAULT_BASE_URL;
use crate::model::MonitoredPoint;
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "clima.toml";
pub const DEFAULT_TIMEZONE: &str = "America/Argentina/Buenos_Aires";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("No monitored points configured. Add at least one [[point]] entry to clima.toml")]
    NoPoints,
    #[error("Invalid monitored point: {0}")]
    InvalidPoint(String),
    #[error("Unknown timezone '{0}'. Use an IANA identifier such as America/Argentina/Buenos_Aires")]
    InvalidTimezone(String),
    #[error("Invalid value for {key}: '{value}'")]
    InvalidEnv { key: &'static str, value: String },
}

// ---------------------------------------------------------------------------
// File structures
// ---------------------------------------------------------------------------

/// `[service]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSettings {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_allow_origin: Option<String>,
    #[serde(default = "default_endpoint_workers")]
    pub endpoint_workers: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            port: default_port(),
            cors_allow_origin: None,
            endpoint_workers: default_endpoint_workers(),
        }
    }
}

/// `[openweather]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenWeatherSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default)]
    pub lang: Option<String>,
    /// Upper bound on each outbound request, connect through body.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenWeatherSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            units: default_units(),
            lang: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Root structure of clima.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct ClimaFile {
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub openweather: OpenWeatherSettings,
    #[serde(rename = "point", default)]
    pub points: Vec<MonitoredPoint>,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_endpoint_workers() -> usize {
    4
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_units() -> String {
    "metric".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Everything the daemon and endpoint need, fully resolved at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub timezone: Tz,
    pub port: u16,
    pub cors_allow_origin: Option<String>,
    pub endpoint_workers: usize,
    pub openweather: OpenWeatherSettings,
    /// `None` when OPENWEATHER_KEY is unset; every fetch is then skipped.
    pub api_key: Option<String>,
    pub points: Vec<MonitoredPoint>,
}

impl ServiceConfig {
    /// Loads `path` and overlays the process environment (after `.env`).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let file: ClimaFile = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        Self::resolve(file, env_var)
    }

    /// Validates `file` and applies overrides from `lookup`.
    ///
    /// Recognized keys: OPENWEATHER_KEY, PORT, CLIMA_TIMEZONE,
    /// CORS_ALLOW_ORIGIN.
    pub fn resolve<F>(file: ClimaFile, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if file.points.is_empty() {
            return Err(ConfigError::NoPoints);
        }
        for point in &file.points {
            validate_point(point)?;
        }

        let tz_name = lookup("CLIMA_TIMEZONE").unwrap_or(file.service.timezone);
        let timezone: Tz = tz_name
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(tz_name.clone()))?;

        let port = match lookup("PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key: "PORT", value })?,
            None => file.service.port,
        };

        Ok(Self {
            timezone,
            port,
            cors_allow_origin: lookup("CORS_ALLOW_ORIGIN").or(file.service.cors_allow_origin),
            endpoint_workers: file.service.endpoint_workers.max(1),
            openweather: file.openweather,
            api_key: lookup("OPENWEATHER_KEY"),
            points: file.points,
        })
    }
}

/// Reads an environment variable, treating empty values as unset.
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_point(point: &MonitoredPoint) -> Result<(), ConfigError> {
    if point.name.trim().is_empty() {
        return Err(ConfigError::InvalidPoint("name must not be empty".to_string()));
    }
    if !(-90.0..=90.0).contains(&point.latitude) {
        return Err(ConfigError::InvalidPoint(format!(
            "{}: latitude {} is outside -90..90",
            point.name, point.latitude
        )));
    }
    if !(-180.0..=180.0).contains(&point.longitude) {
        return Err(ConfigError::InvalidPoint(format!(
            "{}: longitude {} is outside -180..180",
            point.name, point.longitude
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
        [[point]]
        name = "BuenosAires"
        latitude = -34.6037
        longitude = -58.3816
    "#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn parse(toml_text: &str) -> ClimaFile {
        toml::from_str(toml_text).expect("valid TOML")
    }

    #[test]
    fn test_bundled_config_loads() {
        let file: ClimaFile = toml::from_str(&fs::read_to_string(DEFAULT_CONFIG_PATH).unwrap()).unwrap();
        let config = ServiceConfig::resolve(file, no_env).expect("bundled clima.toml must be valid");

        assert_eq!(config.timezone, chrono_tz::America::Argentina::Buenos_Aires);
        let ba = config
            .points
            .iter()
            .find(|p| p.name == "BuenosAires")
            .expect("BuenosAires should be configured");
        assert_eq!(ba.latitude, -34.6037);
        assert_eq!(ba.longitude, -58.3816);
    }

    #[test]
    fn test_defaults_fill_missing_tables() {
        let config = ServiceConfig::resolve(parse(MINIMAL), no_env).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.endpoint_workers, 4);
        assert_eq!(config.openweather.units, "metric");
        assert_eq!(config.openweather.timeout_secs, 10);
        assert_eq!(config.openweather.base_url, DEFAULT_BASE_URL);
        assert!(config.api_key.is_none());
        assert!(config.cors_allow_origin.is_none());
    }

    #[test]
    fn test_environment_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("OPENWEATHER_KEY", "k3y"),
            ("PORT", "9090"),
            ("CLIMA_TIMEZONE", "Europe/Madrid"),
            ("CORS_ALLOW_ORIGIN", "https://estonianport.com"),
        ]
        .into_iter()
        .collect();

        let config = ServiceConfig::resolve(parse(MINIMAL), |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("k3y"));
        assert_eq!(config.port, 9090);
        assert_eq!(config.timezone, chrono_tz::Europe::Madrid);
        assert_eq!(config.cors_allow_origin.as_deref(), Some("https://estonianport.com"));
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let text = format!("[service]\ntimezone = \"Mars/Olympus_Mons\"\n{}", MINIMAL);
        match ServiceConfig::resolve(parse(&text), no_env) {
            Err(ConfigError::InvalidTimezone(name)) => assert_eq!(name, "Mars/Olympus_Mons"),
            other => panic!("expected InvalidTimezone, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_port_env_is_rejected() {
        let result = ServiceConfig::resolve(parse(MINIMAL), |k| (k == "PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidEnv { key: "PORT", .. })));
    }

    #[test]
    fn test_points_are_required() {
        let result = ServiceConfig::resolve(parse("[service]\nport = 8080\n"), no_env);
        assert!(matches!(result, Err(ConfigError::NoPoints)));
    }

    #[test]
    fn test_out_of_range_coordinates_are_rejected() {
        let text = r#"
            [[point]]
            name = "Nowhere"
            latitude = 123.0
            longitude = 0.0
        "#;
        let result = ServiceConfig::resolve(parse(text), no_env);
        assert!(matches!(result, Err(ConfigError::InvalidPoint(msg)) if msg.contains("latitude")));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = ServiceConfig::load(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.toml"));
    }
}
