//! Freshness policy for watched cities and the background refresh sweep.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{
    model::{CityId, WatchedCity},
    query::{FetchMode, WeatherQuery},
    store::{WatchlistStore, now_ms},
};

pub use crate::query::STALE_TIME;

/// Age after which a watched city's snapshot is refetched from the network.
pub const REFRESH_THRESHOLD: Duration = Duration::from_secs(10 * 60);

/// Shortest tick [`StalenessEngine::run`] accepts; smaller intervals are raised to it.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Stale when there is no snapshot, or it is older than [`REFRESH_THRESHOLD`].
pub fn is_stale(city: &WatchedCity, now_ms: i64) -> bool {
    if city.weather.is_none() {
        return true;
    }
    now_ms.saturating_sub(city.last_updated) > REFRESH_THRESHOLD.as_millis() as i64
}

/// Whether a card should show the automatic-refresh placeholder.
pub fn is_auto_refreshing(is_loading: bool, is_stale: bool) -> bool {
    is_loading && is_stale
}

pub fn stale_cities(cities: &[WatchedCity], now_ms: i64) -> Vec<WatchedCity> {
    cities
        .iter()
        .filter(|c| is_stale(c, now_ms))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub refreshed: Vec<CityId>,
    pub failed: Vec<CityId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.refreshed.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct StalenessEngine {
    store: WatchlistStore,
    query: Arc<WeatherQuery>,
}

impl StalenessEngine {
    pub fn new(store: WatchlistStore, query: Arc<WeatherQuery>) -> Self {
        Self { store, query }
    }

    /// Refresh every stale city concurrently. One city's failure never affects another.
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(now_ms()).await
    }

    pub async fn sweep_at(&self, now_ms: i64) -> SweepReport {
        let stale = stale_cities(self.store.snapshot().cities(), now_ms);
        let mut report = SweepReport::default();
        if stale.is_empty() {
            return report;
        }
        tracing::debug!("sweep: {} stale cities", stale.len());

        let mut tasks = JoinSet::new();
        for city in stale {
            let query = Arc::clone(&self.query);
            tasks.spawn(async move {
                let result = query.current_weather(&city.name, FetchMode::Refetch).await;
                (city, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (city, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::error!("sweep task failed: {}", e);
                    continue;
                }
            };

            match result {
                Ok(snapshot) => {
                    self.store.update_weather(&city.id, snapshot);
                    tracing::info!("refreshed weather for {}", city.id);
                    report.refreshed.push(city.id);
                }
                Err(e) => {
                    tracing::warn!("failed to refresh weather for {}: {}", city.id, e);
                    report.failed.push(city.id);
                }
            }
        }

        report
    }

    /// Sweep now, on every `interval` tick, and whenever the watchlist changes,
    /// until `cancel` fires. `interval` is raised to [`MIN_SWEEP_INTERVAL`].
    pub async fn run(self, interval: Duration, cancel: CancellationToken) {
        let mut changes = self.store.subscribe();
        let mut ticker = tokio::time::interval(interval.max(MIN_SWEEP_INTERVAL));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("staleness engine shutting down");
                    break;
                }
                _ = ticker.tick() => {}
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            let _ = changes.borrow_and_update();
            let report = tokio::select! {
                _ = cancel.cancelled() => break,
                report = self.sweep() => report,
            };
            if !report.is_empty() {
                tracing::info!(
                    "sweep finished: {} refreshed, {} failed",
                    report.refreshed.len(),
                    report.failed.len()
                );
            }
        }
    }
}
