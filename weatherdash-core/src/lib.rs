//! Core library for the `weatherdash` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather client and a cached, deduplicating query layer on top of it
//! - The watchlist store, its persistence, and the background staleness sweep
//! - City search with debounced autocomplete, and the add-city workflow
//!
//! It is used by `weatherdash-cli`, but can also back other front ends.

pub mod add_city;
pub mod autocomplete;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod forecast;
pub mod geocode;
pub mod model;
pub mod notice;
pub mod persist;
pub mod provider;
pub mod query;
pub mod retry;
pub mod staleness;
pub mod store;
pub mod theme;
pub mod watchlist;

#[cfg(test)]
mod test_support;

pub use add_city::{AddCallbacks, AddCityWorkflow, AddOutcome};
pub use autocomplete::{AutocompleteController, AutocompleteOptions, AutocompleteState};
pub use config::Config;
pub use dashboard::{CityCard, CityDetails, Dashboard, DashboardError};
pub use error::{ClientError, FetchError};
pub use model::{CityId, CitySuggestion, WatchedCity, WeatherSnapshot};
pub use notice::{Notice, Notifier};
pub use provider::{WeatherProvider, openweather::OpenWeatherProvider};
pub use staleness::{StalenessEngine, SweepReport};
pub use store::WatchlistStore;
pub use theme::Theme;
pub use watchlist::Watchlist;
