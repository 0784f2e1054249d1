/// Test fixtures: representative JSON payloads from the OpenWeather
/// current weather endpoint.
///
/// Response shape (only the fields the parser reads are listed):
///   main.temp          - °C when `units=metric`
///   main.humidity      - integer percent
///   weather[]          - zero or more simultaneous conditions
///     .main            - category ("Rain", "Clouds", …)
///     .description     - localized free text, ignored
///
/// Extra fields are tolerated and ignored by the parser.

/// The minimal Buenos Aires payload: light rain, 21.5 °C, 60 %.
pub(crate) fn fixture_buenos_aires_rain_json() -> &'static str {
    r#"{"main":{"temp":21.5,"humidity":60},"weather":[{"main":"Rain"}]}"#
}

/// A complete response as returned by the live API.
pub(crate) fn fixture_full_clear_sky_json() -> &'static str {
    r#"{
      "coord": { "lon": -58.3816, "lat": -34.6037 },
      "weather": [
        { "id": 800, "main": "Clear", "description": "cielo claro", "icon": "01n" }
      ],
      "base": "stations",
      "main": {
        "temp": 18.27,
        "feels_like": 18.05,
        "temp_min": 17.21,
        "temp_max": 19.01,
        "pressure": 1015,
        "humidity": 72
      },
      "visibility": 10000,
      "wind": { "speed": 4.12, "deg": 110 },
      "clouds": { "all": 0 },
      "dt": 1760464800,
      "sys": { "country": "AR", "sunrise": 1760433526, "sunset": 1760479801 },
      "timezone": -10800,
      "id": 3435910,
      "name": "Buenos Aires",
      "cod": 200
    }"#
}

/// Two simultaneous conditions; the first one is primary.
pub(crate) fn fixture_multiple_conditions_json() -> &'static str {
    r#"{
      "main": { "temp": 9.4, "humidity": 97 },
      "weather": [
        { "id": 701, "main": "Mist", "description": "niebla" },
        { "id": 300, "main": "Drizzle", "description": "llovizna ligera" }
      ]
    }"#
}

/// Structurally valid but with no condition data.
pub(crate) fn fixture_empty_weather_json() -> &'static str {
    r#"{"main":{"temp":21.5,"humidity":60},"weather":[]}"#
}

/// Error-shaped response body that is still valid JSON.
pub(crate) fn fixture_missing_main_json() -> &'static str {
    r#"{"cod":401,"message":"Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."}"#
}
