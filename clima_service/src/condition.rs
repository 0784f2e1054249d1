/// Condition normalizer: vendor weather category → internal label.
///
/// OpenWeather reports a `weather[].main` category such as `"Rain"` or
/// `"Clouds"`. The service stores a closed enumeration instead, persisted
/// under the labels below. Existing mappings and labels must never change,
/// because rows already written depend on them.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Condition {
    #[serde(rename = "SOLEADO")]
    Sunny,
    #[serde(rename = "NUBLADO")]
    Cloudy,
    #[serde(rename = "LLUVIA")]
    Rain,
    #[serde(rename = "TORMENTA")]
    Storm,
    #[serde(rename = "NIEVE")]
    Snow,
    #[serde(rename = "NIEBLA")]
    Fog,
    /// Fallback for any category not listed in `normalize`.
    #[default]
    #[serde(rename = "DESPEJADO")]
    Clear,
}

impl Condition {
    pub const ALL: [Condition; 7] = [
        Condition::Sunny,
        Condition::Cloudy,
        Condition::Rain,
        Condition::Storm,
        Condition::Snow,
        Condition::Fog,
        Condition::Clear,
    ];

    /// Label written to `clima.estado_clima` and returned by the API.
    pub fn label(&self) -> &'static str {
        match self {
            Condition::Sunny => "SOLEADO",
            Condition::Cloudy => "NUBLADO",
            Condition::Rain => "LLUVIA",
            Condition::Storm => "TORMENTA",
            Condition::Snow => "NIEVE",
            Condition::Fog => "NIEBLA",
            Condition::Clear => "DESPEJADO",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown condition label '{0}'")]
pub struct UnknownLabel(pub String);

impl FromStr for Condition {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::ALL
            .into_iter()
            .find(|c| c.label() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// Maps an OpenWeather `weather[].main` category to a `Condition`.
///
/// Case-sensitive. Unrecognized input, including `""`, is `Clear`.
pub fn normalize(vendor_category: &str) -> Condition {
    match vendor_category {
        "Clear" => Condition::Sunny,
        "Clouds" => Condition::Cloudy,
        "Rain" | "Drizzle" => Condition::Rain,
        "Thunderstorm" => Condition::Storm,
        "Snow" => Condition::Snow,
        "Mist" | "Fog" | "Haze" => Condition::Fog,
        _ => Condition::Clear,
    }
}
