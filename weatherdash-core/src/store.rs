use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    model::{CityId, WatchedCity, WeatherSnapshot},
    watchlist::{Watchlist, WatchlistAction},
};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Shared handle to the watchlist state.
///
/// All mutation goes through [`WatchlistStore::dispatch`], which applies the
/// reducer while holding the channel's write lock, so readers never observe a
/// half-applied update. Subscribers are woken only when the value changed.
#[derive(Debug, Clone)]
pub struct WatchlistStore {
    state: Arc<watch::Sender<Watchlist>>,
}

impl Default for WatchlistStore {
    fn default() -> Self {
        Self::new(Watchlist::new())
    }
}

impl WatchlistStore {
    pub fn new(initial: Watchlist) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Apply `action` at the current time. Returns whether the state changed.
    pub fn dispatch(&self, action: WatchlistAction) -> bool {
        self.dispatch_at(action, now_ms())
    }

    pub fn dispatch_at(&self, action: WatchlistAction, now_ms: i64) -> bool {
        let label = action_label(&action);
        let changed = self.state.send_if_modified(|current| {
            let next = current.reduce(action, now_ms);
            if next == *current {
                false
            } else {
                *current = next;
                true
            }
        });
        tracing::debug!("watchlist {} -> changed={}", label, changed);
        changed
    }

    pub fn add(&self, city: WatchedCity) -> bool {
        self.dispatch(WatchlistAction::Add(city))
    }

    pub fn remove(&self, id: &CityId) -> bool {
        self.dispatch(WatchlistAction::Remove(id.clone()))
    }

    pub fn update_weather(&self, id: &CityId, weather: WeatherSnapshot) -> bool {
        self.dispatch(WatchlistAction::UpdateWeather {
            id: id.clone(),
            weather,
        })
    }

    /// Cloned view of the current state.
    pub fn snapshot(&self) -> Watchlist {
        self.state.borrow().clone()
    }

    pub fn get(&self, id: &CityId) -> Option<WatchedCity> {
        self.state.borrow().get(id).cloned()
    }

    pub fn contains(&self, id: &CityId) -> bool {
        self.state.borrow().contains(id)
    }

    pub fn subscribe(&self) -> watch::Receiver<Watchlist> {
        self.state.subscribe()
    }
}

fn action_label(action: &WatchlistAction) -> String {
    match action {
        WatchlistAction::Add(city) => format!("add {}", city.id),
        WatchlistAction::Remove(id) => format!("remove {id}"),
        WatchlistAction::UpdateWeather { id, .. } => format!("update_weather {id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{snapshot, watched};

    #[test]
    fn dispatch_reports_changes_only() {
        let store = WatchlistStore::default();
        let city = watched("Kyiv", "UA", None, 0);

        assert!(store.add(city.clone()));
        assert!(!store.add(city.clone()));
        assert!(!store.remove(&CityId::from("nowhere-xx")));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn update_weather_stamps_supplied_time() {
        let store = WatchlistStore::default();
        let city = watched("Kyiv", "UA", None, 0);
        store.add(city.clone());

        let update = WatchlistAction::UpdateWeather {
            id: city.id.clone(),
            weather: snapshot(20.0, "clear sky"),
        };
        store.dispatch_at(update, 42);
        assert_eq!(store.get(&city.id).map(|c| c.last_updated), Some(42));
    }

    #[tokio::test]
    async fn subscribers_see_changes_but_not_no_ops() {
        let store = WatchlistStore::default();
        let mut rx = store.subscribe();

        store.remove(&CityId::from("nowhere-xx"));
        assert!(!rx.has_changed().expect("sender alive"));

        store.add(watched("Lima", "PE", None, 0));
        assert!(rx.has_changed().expect("sender alive"));
        rx.changed().await.expect("changed");
        assert_eq!(rx.borrow_and_update().len(), 1);
    }

    #[test]
    fn clones_share_state() {
        let store = WatchlistStore::default();
        let other = store.clone();
        other.add(watched("Lima", "PE", None, 0));
        assert!(store.contains(&CityId::from_parts("Lima", "PE")));
    }
}
