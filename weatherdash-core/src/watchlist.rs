//! The watchlist aggregate and its reducers.
//!
//! Every reducer takes `&self` and returns a new [`Watchlist`]; the input is
//! never modified. Entries are unique by [`CityId`] and ordered
//! most-recently-added first.

use serde::{Deserialize, Serialize};

use crate::model::{CityId, WatchedCity, WeatherSnapshot};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Watchlist {
    cities: Vec<WatchedCity>,
}

/// A single state transition of the watchlist.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchlistAction {
    Add(WatchedCity),
    Remove(CityId),
    UpdateWeather {
        id: CityId,
        weather: WeatherSnapshot,
    },
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted entries, dropping later duplicates of an id.
    pub fn from_cities(cities: Vec<WatchedCity>) -> Self {
        let mut deduped: Vec<WatchedCity> = Vec::with_capacity(cities.len());
        for city in cities {
            if deduped.iter().any(|c| c.id == city.id) {
                tracing::warn!("dropping duplicate watchlist entry {}", city.id);
                continue;
            }
            deduped.push(city);
        }
        Self { cities: deduped }
    }

    pub fn cities(&self) -> &[WatchedCity] {
        &self.cities
    }

    pub fn into_cities(self) -> Vec<WatchedCity> {
        self.cities
    }

    pub fn get(&self, id: &CityId) -> Option<&WatchedCity> {
        self.cities.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &CityId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// Prepend `city` unless its id is already present.
    pub fn add(&self, city: WatchedCity) -> Self {
        if self.contains(&city.id) {
            return self.clone();
        }

        let mut cities = Vec::with_capacity(self.cities.len() + 1);
        cities.push(city);
        cities.extend(self.cities.iter().cloned());
        Self { cities }
    }

    pub fn remove(&self, id: &CityId) -> Self {
        Self {
            cities: self
                .cities
                .iter()
                .filter(|c| &c.id != id)
                .cloned()
                .collect(),
        }
    }

    /// Replace the snapshot of `id` and stamp it with `now_ms`.
    pub fn update_weather(&self, id: &CityId, weather: WeatherSnapshot, now_ms: i64) -> Self {
        let cities = self
            .cities
            .iter()
            .map(|c| {
                if &c.id == id {
                    WatchedCity {
                        weather: Some(weather.clone()),
                        last_updated: now_ms,
                        ..c.clone()
                    }
                } else {
                    c.clone()
                }
            })
            .collect();
        Self { cities }
    }

    pub fn reduce(&self, action: WatchlistAction, now_ms: i64) -> Self {
        match action {
            WatchlistAction::Add(city) => self.add(city),
            WatchlistAction::Remove(id) => self.remove(&id),
            WatchlistAction::UpdateWeather { id, weather } => {
                self.update_weather(&id, weather, now_ms)
            }
        }
    }
}
