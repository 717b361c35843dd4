//! In-memory provider and fixtures shared by unit tests.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;

use crate::{
    error::ClientError,
    model::{
        CityId, Condition, CountryInfo, CurrentWeatherRecord, ForecastEntry, ForecastRecord,
        GeocodeRecord, MainReading, WatchedCity, WeatherSnapshot, Wind,
    },
    provider::WeatherProvider,
};

#[derive(Debug)]
struct FakeState {
    weather: HashMap<String, Result<CurrentWeatherRecord, u16>>,
    geocode: HashMap<String, (Duration, Vec<GeocodeRecord>)>,
    forecast: Result<Vec<ForecastEntry>, u16>,
    weather_delay: Duration,
    calls: Vec<String>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            weather: HashMap::new(),
            geocode: HashMap::new(),
            forecast: Ok(Vec::new()),
            weather_delay: Duration::ZERO,
            calls: Vec::new(),
        }
    }
}

/// Scripted provider. Unknown cities answer 404, unknown queries return no matches.
#[derive(Debug, Default)]
pub(crate) struct FakeProvider {
    state: Mutex<FakeState>,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_weather(self, city: &str, temp: f64, description: &str) -> Self {
        self.state
            .lock()
            .weather
            .insert(city.to_string(), Ok(weather_record(city, temp, description)));
        self
    }

    pub(crate) fn failing_weather(self, city: &str, status: u16) -> Self {
        self.state
            .lock()
            .weather
            .insert(city.to_string(), Err(status));
        self
    }

    pub(crate) fn with_weather_delay(self, delay: Duration) -> Self {
        self.state.lock().weather_delay = delay;
        self
    }

    pub(crate) fn with_geocode(
        self,
        query: &str,
        delay: Duration,
        cities: &[(&str, &str)],
    ) -> Self {
        let records = cities
            .iter()
            .map(|(name, country)| GeocodeRecord {
                name: name.to_string(),
                country: country.to_string(),
                lat: 10.0,
                lon: 20.0,
                state: None,
            })
            .collect();
        self.state
            .lock()
            .geocode
            .insert(query.to_string(), (delay, records));
        self
    }

    /// `(dt, temp)` pairs.
    pub(crate) fn with_forecast(self, entries: Vec<(i64, f64)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(dt, temp)| ForecastEntry {
                dt,
                main: MainReading { temp, humidity: 50 },
                weather: vec![Condition {
                    description: "clear sky".into(),
                    icon: "01d".into(),
                }],
                wind: Wind { speed: 1.0 },
            })
            .collect();
        self.state.lock().forecast = Ok(entries);
        self
    }

    pub(crate) fn failing_forecast(self, status: u16) -> Self {
        self.state.lock().forecast = Err(status);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn call_count(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl WeatherProvider for FakeProvider {
    async fn geocode(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<GeocodeRecord>, ClientError> {
        let (delay, records) = {
            let mut state = self.state.lock();
            state.calls.push(format!("geocode:{query}"));
            state.geocode.get(query).cloned().unwrap_or_default()
        };
        tokio::time::sleep(delay).await;
        Ok(records.into_iter().take(limit).collect())
    }

    async fn current_weather(&self, city: &str) -> Result<CurrentWeatherRecord, ClientError> {
        let (delay, scripted) = {
            let mut state = self.state.lock();
            state.calls.push(format!("weather:{city}"));
            (state.weather_delay, state.weather.get(city).cloned())
        };
        tokio::time::sleep(delay).await;

        match scripted {
            Some(Ok(record)) => Ok(record),
            Some(Err(status)) => Err(api_error(status)),
            None => Err(api_error(404)),
        }
    }

    async fn hourly_forecast(&self, lat: f64, lon: f64) -> Result<ForecastRecord, ClientError> {
        let mut state = self.state.lock();
        state.calls.push(format!("forecast:{lat},{lon}"));
        match &state.forecast {
            Ok(list) => Ok(ForecastRecord { list: list.clone() }),
            Err(status) => Err(api_error(*status)),
        }
    }
}

fn api_error(status: u16) -> ClientError {
    ClientError::Api {
        status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        body: format!("{{\"cod\":{status}}}"),
    }
}

pub(crate) fn weather_record(city: &str, temp: f64, description: &str) -> CurrentWeatherRecord {
    CurrentWeatherRecord {
        main: MainReading { temp, humidity: 65 },
        weather: vec![Condition {
            description: description.to_string(),
            icon: "01d".into(),
        }],
        wind: Wind { speed: 5.2 },
        name: city.to_string(),
        sys: CountryInfo {
            country: "XX".into(),
        },
    }
}

pub(crate) fn snapshot(temp: f64, description: &str) -> WeatherSnapshot {
    WeatherSnapshot {
        temp,
        humidity: 65,
        description: description.to_string(),
        icon: "01d".into(),
        wind_speed: 5.2,
    }
}

pub(crate) fn watched(
    name: &str,
    country: &str,
    weather: Option<WeatherSnapshot>,
    last_updated: i64,
) -> WatchedCity {
    WatchedCity {
        id: CityId::from_parts(name, country),
        name: name.to_string(),
        country: country.to_string(),
        lat: 0.0,
        lon: 0.0,
        weather,
        last_updated,
    }
}
