//! Query layer between the weather provider and everything that wants weather.
//!
//! Each key (`weather:<city>`, `forecast:<lat>,<lon>`) has at most one request
//! in flight; later callers for the same key wait on that request instead of
//! issuing their own. Successful results are cached and served without a
//! network call while younger than the stale time.

use std::{collections::HashMap, fmt, future::Future, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{sync::broadcast, time::Instant};

use crate::{
    error::FetchError,
    model::{ForecastRecord, WeatherSnapshot},
    provider::WeatherProvider,
    retry::{RetryConfig, with_retry},
};

/// Age below which a cached response is served without refetching.
pub const STALE_TIME: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn weather(city: &str) -> Self {
        Self(format!("weather:{city}"))
    }

    pub fn forecast(lat: f64, lon: f64) -> Self {
        Self(format!("forecast:{lat},{lon}"))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Serve a fresh cached value if there is one.
    Cached,
    /// Always go to the network (still joins a request already in flight).
    Refetch,
}

type Outcome<T> = Result<T, FetchError>;

struct Slot<T> {
    value: Option<(Instant, T)>,
    in_flight: Option<broadcast::Sender<Outcome<T>>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: None,
            in_flight: None,
        }
    }
}

enum Join<T> {
    Fresh(T),
    Wait(broadcast::Receiver<Outcome<T>>),
    Lead(broadcast::Sender<Outcome<T>>),
}

struct QueryCache<T> {
    slots: Mutex<HashMap<QueryKey, Slot<T>>>,
}

impl<T: Clone> QueryCache<T> {
    fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn is_fetching(&self, key: &QueryKey) -> bool {
        self.slots
            .lock()
            .get(key)
            .is_some_and(|slot| slot.in_flight.is_some())
    }

    fn cached(&self, key: &QueryKey, stale_time: Duration) -> Option<T> {
        let slots = self.slots.lock();
        let (at, value) = slots.get(key)?.value.as_ref()?;
        (at.elapsed() < stale_time).then(|| value.clone())
    }

    async fn run<F, Fut>(
        &self,
        key: &QueryKey,
        mode: FetchMode,
        stale_time: Duration,
        fetch: F,
    ) -> Outcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        let join = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.clone()).or_default();

            let fresh = match (&slot.value, mode) {
                (Some((at, value)), FetchMode::Cached) if at.elapsed() < stale_time => {
                    Some(value.clone())
                }
                _ => None,
            };

            if let Some(value) = fresh {
                Join::Fresh(value)
            } else if let Some(tx) = &slot.in_flight {
                Join::Wait(tx.subscribe())
            } else {
                let (tx, _) = broadcast::channel(1);
                slot.in_flight = Some(tx.clone());
                Join::Lead(tx)
            }
        };

        match join {
            Join::Fresh(value) => {
                tracing::debug!("{} served from cache", key);
                Ok(value)
            }
            Join::Wait(mut rx) => {
                tracing::debug!("{} already in flight, joining", key);
                rx.recv().await.unwrap_or_else(|_| {
                    Err(FetchError::Network("in-flight request was abandoned".to_string()))
                })
            }
            Join::Lead(tx) => {
                let mut guard = InFlightGuard {
                    slots: &self.slots,
                    key,
                    armed: true,
                };
                let result = fetch().await;

                {
                    let mut slots = self.slots.lock();
                    let slot = slots.entry(key.clone()).or_default();
                    slot.in_flight = None;
                    if let Ok(value) = &result {
                        slot.value = Some((Instant::now(), value.clone()));
                    }
                }
                guard.armed = false;

                // Waiters subscribed under the lock before `in_flight` was cleared.
                let _ = tx.send(result.clone());
                result
            }
        }
    }
}

/// Clears the in-flight marker if the leading request is dropped mid-way.
struct InFlightGuard<'a, T> {
    slots: &'a Mutex<HashMap<QueryKey, Slot<T>>>,
    key: &'a QueryKey,
    armed: bool,
}

impl<T> Drop for InFlightGuard<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(slot) = self.slots.lock().get_mut(self.key) {
            slot.in_flight = None;
        }
    }
}

pub struct WeatherQuery {
    provider: Arc<dyn WeatherProvider>,
    retry: RetryConfig,
    stale_time: Duration,
    current: QueryCache<WeatherSnapshot>,
    forecast: QueryCache<ForecastRecord>,
}

impl fmt::Debug for WeatherQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherQuery")
            .field("provider", &self.provider)
            .field("retry", &self.retry)
            .field("stale_time", &self.stale_time)
            .finish_non_exhaustive()
    }
}

impl WeatherQuery {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self {
            provider,
            retry: RetryConfig::default(),
            stale_time: STALE_TIME,
            current: QueryCache::new(),
            forecast: QueryCache::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider(&self) -> &Arc<dyn WeatherProvider> {
        &self.provider
    }

    pub async fn current_weather(
        &self,
        city: &str,
        mode: FetchMode,
    ) -> Result<WeatherSnapshot, FetchError> {
        let key = QueryKey::weather(city);
        self.current
            .run(&key, mode, self.stale_time, || async {
                with_retry(&self.retry, || self.provider.current_weather(city))
                    .await
                    .map(|record| WeatherSnapshot::from(&record))
                    .map_err(FetchError::from)
            })
            .await
    }

    pub async fn hourly_forecast(
        &self,
        lat: f64,
        lon: f64,
        mode: FetchMode,
    ) -> Result<ForecastRecord, FetchError> {
        let key = QueryKey::forecast(lat, lon);
        self.forecast
            .run(&key, mode, self.stale_time, || async {
                with_retry(&self.retry, || self.provider.hourly_forecast(lat, lon))
                    .await
                    .map_err(FetchError::from)
            })
            .await
    }

    pub fn is_fetching_weather(&self, city: &str) -> bool {
        self.current.is_fetching(&QueryKey::weather(city))
    }

    pub fn cached_weather(&self, city: &str) -> Option<WeatherSnapshot> {
        self.current
            .cached(&QueryKey::weather(city), self.stale_time)
    }
}
