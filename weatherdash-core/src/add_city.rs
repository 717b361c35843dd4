//! Turning a picked suggestion into a watched city.
//!
//! `Selected -> CheckingDuplicate -> {Duplicate, Fetching} -> {Added, FetchFailed}`.
//! A duplicate never triggers a fetch, and a failed fetch stores nothing.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    error::FetchError,
    model::{CityId, CitySuggestion, WatchedCity},
    notice::{Notice, Notifier},
    query::{FetchMode, WeatherQuery},
    store::{WatchlistStore, now_ms},
};

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added(WatchedCity),
    Duplicate(CityId),
    FetchFailed(FetchError),
    /// The same suggestion is already being added.
    AlreadyPending,
}

type Callback = Box<dyn FnOnce() + Send>;

/// Hooks for the caller's UI reset. `on_success` also runs for duplicates.
#[derive(Default)]
pub struct AddCallbacks {
    on_success: Option<Callback>,
    on_error: Option<Callback>,
}

impl AddCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    fn succeed(self) {
        if let Some(f) = self.on_success {
            f();
        }
    }

    fn fail(self) {
        if let Some(f) = self.on_error {
            f();
        }
    }
}

pub struct AddCityWorkflow {
    store: WatchlistStore,
    query: Arc<WeatherQuery>,
    notifier: Arc<dyn Notifier>,
    in_progress: Mutex<Vec<CitySuggestion>>,
}

impl std::fmt::Debug for AddCityWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddCityWorkflow")
            .field("notifier", &self.notifier)
            .field("in_progress", &self.in_progress.lock().len())
            .finish_non_exhaustive()
    }
}

/// Releases the per-suggestion gate when the workflow ends or is dropped.
struct InProgress<'a> {
    pending: &'a Mutex<Vec<CitySuggestion>>,
    suggestion: &'a CitySuggestion,
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        if let Some(pos) = pending.iter().position(|s| s == self.suggestion) {
            pending.remove(pos);
        }
    }
}

impl AddCityWorkflow {
    pub fn new(
        store: WatchlistStore,
        query: Arc<WeatherQuery>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            query,
            notifier,
            in_progress: Mutex::new(Vec::new()),
        }
    }

    pub async fn add(&self, suggestion: &CitySuggestion, callbacks: AddCallbacks) -> AddOutcome {
        {
            let mut pending = self.in_progress.lock();
            if pending.contains(suggestion) {
                tracing::debug!("{} is already being added", suggestion.display_name);
                return AddOutcome::AlreadyPending;
            }
            pending.push(suggestion.clone());
        }
        let _gate = InProgress {
            pending: &self.in_progress,
            suggestion,
        };

        let id = suggestion.city_id();
        if self.store.contains(&id) {
            return self.duplicate(suggestion, id, callbacks);
        }

        tracing::debug!("fetching weather for new city {}", id);
        let fetched = self
            .query
            .current_weather(&suggestion.display_name, FetchMode::Cached)
            .await;
        match fetched {
            Ok(weather) => {
                let city = WatchedCity::from_suggestion(suggestion, Some(weather), now_ms());
                if !self.store.add(city.clone()) {
                    // Added by someone else while we were fetching.
                    return self.duplicate(suggestion, id, callbacks);
                }

                tracing::info!("added {} to the watchlist", id);
                self.notifier.notify(Notice::Success(format!(
                    "{} has been added successfully!",
                    city.name
                )));
                callbacks.succeed();
                AddOutcome::Added(city)
            }
            Err(e) => {
                tracing::warn!("could not add {}: {}", id, e);
                self.notifier.notify(Notice::Error(
                    "Failed to get weather data for this city".to_string(),
                ));
                callbacks.fail();
                AddOutcome::FetchFailed(e)
            }
        }
    }

    fn duplicate(
        &self,
        suggestion: &CitySuggestion,
        id: CityId,
        callbacks: AddCallbacks,
    ) -> AddOutcome {
        self.notifier.notify(Notice::Error(format!(
            "{} is already in your cities list!",
            suggestion.name
        )));
        callbacks.succeed();
        AddOutcome::Duplicate(id)
    }
}
