use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::{
    config::DEFAULT_BASE_URL,
    error::ClientError,
    model::{CurrentWeatherRecord, ForecastRecord, GeocodeRecord},
};

use super::WeatherProvider;

const GEOCODE_PATH: &str = "/geo/1.0/direct";
const CURRENT_PATH: &str = "/data/2.5/weather";
const FORECAST_PATH: &str = "/data/2.5/forecast";
const UNITS: &str = "metric";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

#[derive(Debug)]
pub struct OpenWeatherProviderBuilder {
    api_key: String,
    base_url: String,
    timeout: Option<Duration>,
}

impl OpenWeatherProviderBuilder {
    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> anyhow::Result<OpenWeatherProvider> {
        let mut http = Client::builder();
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }

        Ok(OpenWeatherProvider {
            api_key: self.api_key,
            base_url: self.base_url,
            http: http.build()?,
        })
    }
}

impl OpenWeatherProvider {
    pub fn builder(api_key: String) -> OpenWeatherProviderBuilder {
        OpenWeatherProviderBuilder {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with the shared `appid`/`units` prefix followed by `params`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);

        let res = self
            .http
            .get(&url)
            .query(&[("appid", self.api_key.as_str()), ("units", UNITS)])
            .query(params)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(ClientError::Api {
                status,
                body: truncate_body(&body),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn geocode(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<GeocodeRecord>, ClientError> {
        tracing::debug!("geocoding {:?}", query);
        let params = [("q", query.to_string()), ("limit", limit.to_string())];
        self.get_json(GEOCODE_PATH, &params).await
    }

    async fn current_weather(&self, city: &str) -> Result<CurrentWeatherRecord, ClientError> {
        tracing::debug!("fetching current weather for {:?}", city);
        self.get_json(CURRENT_PATH, &[("q", city.to_string())]).await
    }

    async fn hourly_forecast(&self, lat: f64, lon: f64) -> Result<ForecastRecord, ClientError> {
        tracing::debug!("fetching forecast for {},{}", lat, lon);
        let params = [("lat", lat.to_string()), ("lon", lon.to_string())];
        self.get_json(FORECAST_PATH, &params).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("city not found"), "city not found");
    }

    #[test]
    fn truncate_body_cuts_on_char_boundary() {
        let long = "é".repeat(300);
        let cut = truncate_body(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
    }

    #[test]
    fn builder_strips_trailing_slash() {
        let provider = OpenWeatherProvider::builder("KEY".into())
            .base_url("http://127.0.0.1:8080/")
            .build()
            .expect("build");
        assert_eq!(provider.base_url(), "http://127.0.0.1:8080");
    }
}
