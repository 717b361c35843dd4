use serde::{Deserialize, Serialize};
use std::fmt;

/// A city returned by the geocoding search. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitySuggestion {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub state: Option<String>,
    pub display_name: String,
}

impl CitySuggestion {
    pub fn new(
        name: impl Into<String>,
        country: impl Into<String>,
        lat: f64,
        lon: f64,
        state: Option<String>,
    ) -> Self {
        let name = name.into();
        let country = country.into();
        let display_name = match &state {
            Some(state) => format!("{name}, {state}, {country}"),
            None => format!("{name}, {country}"),
        };

        Self {
            name,
            country,
            lat,
            lon,
            state,
            display_name,
        }
    }

    pub fn city_id(&self) -> CityId {
        CityId::from_parts(&self.name, &self.country)
    }
}

impl From<GeocodeRecord> for CitySuggestion {
    fn from(record: GeocodeRecord) -> Self {
        CitySuggestion::new(
            record.name,
            record.country,
            record.lat,
            record.lon,
            record.state,
        )
    }
}

/// Natural key of a watched city, derived from its name and country only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityId(String);

impl CityId {
    /// `"London", "GB"` becomes `london-gb`; `"New York", "US"` becomes `new-york-us`.
    pub fn from_parts(name: &str, country: &str) -> Self {
        Self(format!("{}-{}", normalize_part(name), normalize_part(country)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_part(part: &str) -> String {
    part.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// A single weather reading. Replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub temp: f64,
    pub humidity: u8,
    pub description: String,
    pub icon: String,
    pub wind_speed: f64,
}

impl From<&CurrentWeatherRecord> for WeatherSnapshot {
    fn from(record: &CurrentWeatherRecord) -> Self {
        let condition = record.weather.first();

        Self {
            temp: record.main.temp,
            humidity: record.main.humidity,
            description: condition.map(|c| c.description.clone()).unwrap_or_default(),
            icon: condition.map(|c| c.icon.clone()).unwrap_or_default(),
            wind_speed: record.wind.speed,
        }
    }
}

/// Persisted watchlist entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedCity {
    pub id: CityId,
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub weather: Option<WeatherSnapshot>,
    /// Milliseconds since the Unix epoch.
    pub last_updated: i64,
}

impl WatchedCity {
    pub fn from_suggestion(
        suggestion: &CitySuggestion,
        weather: Option<WeatherSnapshot>,
        now_ms: i64,
    ) -> Self {
        Self {
            id: suggestion.city_id(),
            name: suggestion.name.clone(),
            country: suggestion.country.clone(),
            lat: suggestion.lat,
            lon: suggestion.lon,
            weather,
            last_updated: now_ms,
        }
    }
}

// Wire records consumed from the OpenWeather API. Only the fields we read are declared.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeRecord {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReading {
    pub temp: f64,
    pub humidity: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryInfo {
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeatherRecord {
    pub main: MainReading,
    pub weather: Vec<Condition>,
    pub wind: Wind,
    pub name: String,
    pub sys: CountryInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    /// Unix seconds.
    pub dt: i64,
    pub main: MainReading,
    pub weather: Vec<Condition>,
    pub wind: Wind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub list: Vec<ForecastEntry>,
}
