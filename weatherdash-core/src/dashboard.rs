//! Everything a front end needs, wired around one shared store and query layer.

use std::{fmt, sync::Arc};

use chrono::{DateTime, TimeZone};
use thiserror::Error;

use crate::{
    Config,
    add_city::{AddCallbacks, AddCityWorkflow, AddOutcome},
    autocomplete::{AutocompleteController, AutocompleteOptions},
    error::FetchError,
    forecast::{TrendPoint, temperature_trend},
    geocode::GeocodingClient,
    model::{CityId, CitySuggestion, WatchedCity},
    notice::{Notice, Notifier},
    provider::{WeatherProvider, provider_from_config},
    query::{FetchMode, WeatherQuery},
    staleness::{StalenessEngine, is_auto_refreshing, is_stale},
    store::WatchlistStore,
    theme::{Theme, weather_theme},
    watchlist::Watchlist,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DashboardError {
    #[error("{0} is not in the watchlist")]
    UnknownCity(CityId),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// One row of the city grid.
#[derive(Debug, Clone, PartialEq)]
pub struct CityCard {
    pub city: WatchedCity,
    pub is_stale: bool,
    pub is_auto_refreshing: bool,
    pub theme: Theme,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CityDetails {
    pub city: WatchedCity,
    pub trend: Vec<TrendPoint>,
}

#[derive(Debug)]
pub struct Dashboard {
    store: WatchlistStore,
    query: Arc<WeatherQuery>,
    geocoder: GeocodingClient,
    engine: StalenessEngine,
    add_workflow: AddCityWorkflow,
    notifier: Arc<dyn Notifier>,
    autocomplete: AutocompleteOptions,
}

impl Dashboard {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        initial: Watchlist,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_query(WeatherQuery::new(provider), initial, notifier)
    }

    pub fn with_query(
        query: WeatherQuery,
        initial: Watchlist,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let geocoder = GeocodingClient::new(Arc::clone(query.provider()));
        let query = Arc::new(query);
        let store = WatchlistStore::new(initial);

        Self {
            engine: StalenessEngine::new(store.clone(), Arc::clone(&query)),
            add_workflow: AddCityWorkflow::new(
                store.clone(),
                Arc::clone(&query),
                Arc::clone(&notifier),
            ),
            store,
            query,
            geocoder,
            notifier,
            autocomplete: AutocompleteOptions::default(),
        }
    }

    /// Build against the configured OpenWeather endpoint. Fails without an API key.
    pub fn from_config(
        config: &Config,
        initial: Watchlist,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let provider: Arc<dyn WeatherProvider> = Arc::new(provider_from_config(config)?);
        let options = AutocompleteOptions {
            debounce: config.debounce(),
            min_query_len: config.autocomplete.min_query_len,
        };
        let dashboard = Self::new(provider, initial, notifier);
        Ok(dashboard.with_autocomplete_options(options))
    }

    pub fn with_autocomplete_options(mut self, options: AutocompleteOptions) -> Self {
        self.autocomplete = options;
        self
    }

    pub fn store(&self) -> &WatchlistStore {
        &self.store
    }

    pub fn geocoder(&self) -> &GeocodingClient {
        &self.geocoder
    }

    pub fn engine(&self) -> &StalenessEngine {
        &self.engine
    }

    fn watched(&self, id: &CityId) -> Result<WatchedCity, DashboardError> {
        self.store
            .get(id)
            .ok_or_else(|| DashboardError::UnknownCity(id.clone()))
    }

    /// A search box controller sharing this dashboard's geocoder.
    pub fn autocomplete(
        &self,
        on_select: impl Fn(CitySuggestion) + Send + Sync + 'static,
    ) -> AutocompleteController {
        AutocompleteController::new(self.geocoder.clone(), self.autocomplete, on_select)
    }

    pub async fn add_city(
        &self,
        suggestion: &CitySuggestion,
        callbacks: AddCallbacks,
    ) -> AddOutcome {
        self.add_workflow.add(suggestion, callbacks).await
    }

    /// Forced refetch of one city. A failure leaves the stored data untouched.
    pub async fn refresh_city(&self, id: &CityId) -> Result<WatchedCity, DashboardError> {
        let city = self.watched(id)?;

        let fetched = self
            .query
            .current_weather(&city.name, FetchMode::Refetch)
            .await;
        match fetched {
            Ok(weather) => {
                self.store.update_weather(id, weather);
                self.notifier.notify(Notice::Success(format!(
                    "Weather data for {} has been updated!",
                    city.name
                )));
                self.watched(id)
            }
            Err(e) => {
                tracing::warn!("manual refresh of {} failed: {}", id, e);
                self.notifier.notify(Notice::Error(format!(
                    "Failed to update weather data for {}",
                    city.name
                )));
                Err(e.into())
            }
        }
    }

    pub fn remove_city(&self, id: &CityId) -> Result<WatchedCity, DashboardError> {
        let city = self.watched(id)?;
        self.store.remove(id);
        tracing::info!("removed {} from the watchlist", id);
        self.notifier.notify(Notice::Success(format!(
            "{} has been removed from your cities list!",
            city.name
        )));
        Ok(city)
    }

    pub fn cards(&self, now_ms: i64) -> Vec<CityCard> {
        self.store
            .snapshot()
            .into_cities()
            .into_iter()
            .map(|city| {
                let stale = is_stale(&city, now_ms);
                let loading = self.query.is_fetching_weather(&city.name);
                CityCard {
                    is_stale: stale,
                    is_auto_refreshing: is_auto_refreshing(loading, stale),
                    theme: weather_theme(city.weather.as_ref()),
                    city,
                }
            })
            .collect()
    }

    /// Current weather plus the trend for the 24 hours after `now`, labelled in `now`'s zone.
    pub async fn city_details<Tz>(
        &self,
        id: &CityId,
        now: DateTime<Tz>,
    ) -> Result<CityDetails, DashboardError>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let city = self.watched(id)?;
        let forecast = self
            .query
            .hourly_forecast(city.lat, city.lon, FetchMode::Cached)
            .await?;
        Ok(CityDetails {
            trend: temperature_trend(&forecast, now),
            city,
        })
    }

    /// Like [`Dashboard::city_details`] but always refetches the forecast,
    /// reporting the outcome as a notice.
    pub async fn refresh_forecast<Tz>(
        &self,
        id: &CityId,
        now: DateTime<Tz>,
    ) -> Result<CityDetails, DashboardError>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let city = self.watched(id)?;

        match self
            .query
            .hourly_forecast(city.lat, city.lon, FetchMode::Refetch)
            .await
        {
            Ok(forecast) => {
                self.notifier
                    .notify(Notice::Success("Weather forecast has been updated!".into()));
                Ok(CityDetails {
                    trend: temperature_trend(&forecast, now),
                    city,
                })
            }
            Err(e) => {
                tracing::warn!("forecast refresh for {} failed: {}", id, e);
                self.notifier
                    .notify(Notice::Error("Failed to update weather forecast".into()));
                Err(e.into())
            }
        }
    }
}
