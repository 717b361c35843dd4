use crate::{
    Config,
    error::ClientError,
    model::{CurrentWeatherRecord, ForecastRecord, GeocodeRecord},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Outbound calls against the weather API. One request per call, no retries.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn geocode(&self, query: &str, limit: usize) -> Result<Vec<GeocodeRecord>, ClientError>;

    async fn current_weather(&self, city: &str) -> Result<CurrentWeatherRecord, ClientError>;

    async fn hourly_forecast(&self, lat: f64, lon: f64) -> Result<ForecastRecord, ClientError>;
}

/// Construct the OpenWeather provider from config. Fails when no API key is available.
pub fn provider_from_config(config: &Config) -> anyhow::Result<OpenWeatherProvider> {
    let api_key = config.require_api_key()?;
    OpenWeatherProvider::builder(api_key)
        .base_url(&config.base_url)
        .timeout(config.request_timeout())
        .build()
}
