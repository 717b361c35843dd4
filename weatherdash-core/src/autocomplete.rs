//! Debounced, cancelable city search for a single input field.
//!
//! Each input change starts a new *generation*: the previous debounce timer or
//! in-flight search is cancelled through its [`CancellationToken`], and a
//! result is only applied if its token is still live and its generation is
//! still current. Displayed suggestions therefore always belong to the most
//! recent query, whatever order responses arrive in.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    error::Cancelled,
    geocode::{GeocodingClient, MIN_QUERY_LEN},
    model::CitySuggestion,
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutocompleteOptions {
    pub debounce: Duration,
    pub min_query_len: usize,
}

impl Default for AutocompleteOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            min_query_len: MIN_QUERY_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Debouncing,
    Searching,
    Resolved,
    Errored,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("No cities found")]
    NoCitiesFound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutocompleteState {
    pub phase: SearchPhase,
    pub query: String,
    pub suggestions: Vec<CitySuggestion>,
    pub is_loading: bool,
    pub error: Option<SearchError>,
}

impl Default for AutocompleteState {
    fn default() -> Self {
        Self {
            phase: SearchPhase::Idle,
            query: String::new(),
            suggestions: Vec::new(),
            is_loading: false,
            error: None,
        }
    }
}

#[derive(Default)]
struct Pending {
    generation: u64,
    token: Option<CancellationToken>,
    disposed: bool,
}

impl Pending {
    /// Cancel whatever is outstanding and open a new generation.
    fn supersede(&mut self) -> u64 {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        self.generation += 1;
        self.generation
    }

    fn is_current(&self, generation: u64, token: &CancellationToken) -> bool {
        !self.disposed && self.generation == generation && !token.is_cancelled()
    }
}

struct Shared {
    pending: Mutex<Pending>,
    state: watch::Sender<AutocompleteState>,
}

impl Shared {
    fn reset(&self, phase: SearchPhase, query: String) {
        self.state.send_modify(|s| {
            s.phase = phase;
            s.query = query;
            s.suggestions.clear();
            s.is_loading = false;
            s.error = None;
        });
    }

    fn begin_search(&self, generation: u64, token: &CancellationToken) -> bool {
        let pending = self.pending.lock();
        if !pending.is_current(generation, token) {
            return false;
        }
        self.state.send_modify(|s| {
            s.phase = SearchPhase::Searching;
            s.is_loading = true;
            s.error = None;
        });
        true
    }

    fn apply(
        &self,
        generation: u64,
        token: &CancellationToken,
        suggestions: Vec<CitySuggestion>,
    ) {
        let pending = self.pending.lock();
        if !pending.is_current(generation, token) {
            tracing::debug!(
                "discarding superseded search results (generation {})",
                generation
            );
            return;
        }
        self.state.send_modify(|s| {
            s.is_loading = false;
            if suggestions.is_empty() {
                s.phase = SearchPhase::Errored;
                s.suggestions.clear();
                s.error = Some(SearchError::NoCitiesFound);
            } else {
                s.phase = SearchPhase::Resolved;
                s.suggestions = suggestions;
                s.error = None;
            }
        });
    }
}

type SelectCallback = Box<dyn Fn(CitySuggestion) + Send + Sync>;

pub struct AutocompleteController {
    geocoder: GeocodingClient,
    options: AutocompleteOptions,
    shared: Arc<Shared>,
    on_select: SelectCallback,
}

impl std::fmt::Debug for AutocompleteController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutocompleteController")
            .field("options", &self.options)
            .field("state", &*self.shared.state.borrow())
            .finish_non_exhaustive()
    }
}

impl AutocompleteController {
    pub fn new(
        geocoder: GeocodingClient,
        options: AutocompleteOptions,
        on_select: impl Fn(CitySuggestion) + Send + Sync + 'static,
    ) -> Self {
        let (state, _) = watch::channel(AutocompleteState::default());
        Self {
            geocoder,
            options,
            shared: Arc::new(Shared {
                pending: Mutex::new(Pending::default()),
                state,
            }),
            on_select: Box::new(on_select),
        }
    }

    pub fn state(&self) -> AutocompleteState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AutocompleteState> {
        self.shared.state.subscribe()
    }

    /// Feed the current contents of the input field. Must be called inside a tokio runtime.
    pub fn input_changed(&self, value: &str) {
        let mut pending = self.shared.pending.lock();
        if pending.disposed {
            return;
        }
        let generation = pending.supersede();

        if value.trim().chars().count() < self.options.min_query_len {
            self.shared.reset(SearchPhase::Idle, value.to_string());
            return;
        }

        let token = CancellationToken::new();
        pending.token = Some(token.clone());
        self.shared.state.send_modify(|s| {
            s.phase = SearchPhase::Debouncing;
            s.query = value.to_string();
            s.is_loading = false;
            s.error = None;
        });
        drop(pending);

        let shared = Arc::clone(&self.shared);
        let geocoder = self.geocoder.clone();
        let debounce = self.options.debounce;
        let query = value.to_string();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }

            if !shared.begin_search(generation, &token) {
                return;
            }
            tracing::debug!("searching cities for {:?} (generation {})", query, generation);

            match geocoder.suggest(&query, &token).await {
                Ok(suggestions) => shared.apply(generation, &token, suggestions),
                Err(Cancelled) => {
                    tracing::debug!("search for {:?} cancelled", query);
                }
            }
        });
    }

    /// Accept a suggestion: clears all search state, then calls the selection callback once.
    pub fn select(&self, suggestion: CitySuggestion) {
        {
            let mut pending = self.shared.pending.lock();
            if pending.disposed {
                return;
            }
            pending.supersede();
            self.shared.reset(SearchPhase::Idle, String::new());
        }
        (self.on_select)(suggestion);
    }

    pub fn clear(&self) {
        let mut pending = self.shared.pending.lock();
        pending.supersede();
        if !pending.disposed {
            self.shared.reset(SearchPhase::Idle, String::new());
        }
    }

    /// Cancel everything; later input is ignored and no background task touches state again.
    pub fn dispose(&self) {
        let mut pending = self.shared.pending.lock();
        if pending.disposed {
            return;
        }
        pending.supersede();
        pending.disposed = true;
        let query = self.shared.state.borrow().query.clone();
        self.shared.reset(SearchPhase::Cancelled, query);
    }
}

impl Drop for AutocompleteController {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeProvider;

    fn controller(
        provider: &Arc<FakeProvider>,
    ) -> (AutocompleteController, Arc<Mutex<Vec<CitySuggestion>>>) {
        let selected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&selected);
        let controller = AutocompleteController::new(
            GeocodingClient::new(provider.clone()),
            AutocompleteOptions::default(),
            move |city| sink.lock().push(city),
        );
        (controller, selected)
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_typing_fires_a_single_search() {
        let provider = Arc::new(FakeProvider::new().with_geocode(
            "Lond",
            Duration::from_millis(20),
            &[("London", "GB")],
        ));
        let (ac, _) = controller(&provider);

        ac.input_changed("Lo");
        sleep_ms(100).await;
        ac.input_changed("Lon");
        sleep_ms(100).await;
        ac.input_changed("Lond");
        assert_eq!(ac.state().phase, SearchPhase::Debouncing);

        sleep_ms(1_000).await;
        assert_eq!(provider.calls(), vec!["geocode:Lond".to_string()]);

        let state = ac.state();
        assert_eq!(state.phase, SearchPhase::Resolved);
        assert_eq!(state.suggestions.len(), 1);
        assert!(!state.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_of_superseded_search_is_discarded() {
        let provider = Arc::new(
            FakeProvider::new()
                .with_geocode("Lon", Duration::from_millis(1_000), &[("London", "GB")])
                .with_geocode("Par", Duration::from_millis(10), &[("Paris", "FR")]),
        );
        let (ac, _) = controller(&provider);

        ac.input_changed("Lon");
        sleep_ms(400).await;
        assert!(ac.state().is_loading);
        assert_eq!(ac.state().phase, SearchPhase::Searching);

        ac.input_changed("Par");
        sleep_ms(2_000).await;

        let state = ac.state();
        assert_eq!(provider.call_count("geocode:"), 2);
        assert_eq!(state.phase, SearchPhase::Resolved);
        assert_eq!(state.query, "Par");
        assert_eq!(state.suggestions.len(), 1);
        assert_eq!(state.suggestions[0].name, "Paris");
    }

    #[tokio::test(start_paused = true)]
    async fn short_input_clears_immediately_and_cancels_pending_search() {
        let provider = Arc::new(
            FakeProvider::new()
                .with_geocode("Ber", Duration::ZERO, &[("Berlin", "DE")])
                .with_geocode("Bern", Duration::ZERO, &[("Bern", "CH")]),
        );
        let (ac, _) = controller(&provider);

        ac.input_changed("Ber");
        sleep_ms(500).await;
        assert_eq!(ac.state().suggestions.len(), 1);

        ac.input_changed("Bern");
        ac.input_changed("B");
        let state = ac.state();
        assert!(state.suggestions.is_empty());
        assert_eq!(state.error, None);
        assert_eq!(state.phase, SearchPhase::Idle);

        sleep_ms(1_000).await;
        assert_eq!(provider.call_count("geocode:"), 1);
        assert!(ac.state().suggestions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_results_sets_no_cities_found() {
        let provider = Arc::new(FakeProvider::new());
        let (ac, _) = controller(&provider);

        ac.input_changed("Qwxz");
        sleep_ms(500).await;

        let state = ac.state();
        assert_eq!(state.phase, SearchPhase::Errored);
        assert_eq!(state.error, Some(SearchError::NoCitiesFound));
        assert_eq!(state.error.map(|e| e.to_string()).as_deref(), Some("No cities found"));
    }

    #[tokio::test(start_paused = true)]
    async fn select_clears_state_and_calls_back_once() {
        let provider =
            Arc::new(FakeProvider::new().with_geocode("Kyi", Duration::ZERO, &[("Kyiv", "UA")]));
        let (ac, selected) = controller(&provider);

        ac.input_changed("Kyi");
        sleep_ms(500).await;
        let pick = ac.state().suggestions[0].clone();

        ac.select(pick.clone());
        let state = ac.state();
        assert!(state.suggestions.is_empty());
        assert!(!state.is_loading);
        assert_eq!(state.error, None);
        assert_eq!(*selected.lock(), vec![pick]);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_the_debounced_search() {
        let provider =
            Arc::new(FakeProvider::new().with_geocode("Oslo", Duration::ZERO, &[("Oslo", "NO")]));
        let (ac, selected) = controller(&provider);

        ac.input_changed("Oslo");
        ac.clear();
        sleep_ms(1_000).await;

        assert!(provider.calls().is_empty());
        assert_eq!(ac.state(), AutocompleteState::default());
        assert!(selected.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_cancels_pending_work() {
        let provider =
            Arc::new(FakeProvider::new().with_geocode("Lim", Duration::ZERO, &[("Lima", "PE")]));
        let (ac, selected) = controller(&provider);
        let mut rx = ac.subscribe();

        ac.input_changed("Lim");
        ac.dispose();
        let _ = rx.borrow_and_update();

        sleep_ms(1_000).await;
        assert!(provider.calls().is_empty());
        assert!(!rx.has_changed().expect("sender alive"));
        assert_eq!(ac.state().phase, SearchPhase::Cancelled);

        ac.input_changed("Lima");
        ac.select(CitySuggestion::new("Lima", "PE", 0.0, 0.0, None));
        sleep_ms(1_000).await;
        assert!(provider.calls().is_empty());
        assert!(selected.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_discards_in_flight_search() {
        let provider = Arc::new(FakeProvider::new().with_geocode(
            "Rom",
            Duration::from_millis(800),
            &[("Rome", "IT")],
        ));
        let (ac, _) = controller(&provider);

        ac.input_changed("Rom");
        sleep_ms(400).await;
        assert_eq!(provider.call_count("geocode:Rom"), 1);

        ac.dispose();
        sleep_ms(2_000).await;
        assert!(ac.state().suggestions.is_empty());
        assert!(!ac.state().is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn older_generation_is_rejected_even_if_its_token_survived() {
        let provider = Arc::new(FakeProvider::new().with_geocode(
            "Par",
            Duration::from_millis(10),
            &[("Paris", "FR")],
        ));
        let (ac, _) = controller(&provider);

        ac.input_changed("Lon");
        ac.input_changed("Par");
        sleep_ms(1_000).await;
        assert_eq!(ac.state().suggestions[0].name, "Paris");

        // Results for generation 1 arriving through a token nobody cancelled.
        let late = vec![CitySuggestion::new("London", "GB", 51.5, -0.12, None)];
        ac.shared.apply(1, &CancellationToken::new(), late);

        let state = ac.state();
        assert_eq!(state.phase, SearchPhase::Resolved);
        assert_eq!(state.suggestions.len(), 1);
        assert_eq!(state.suggestions[0].name, "Paris");
    }
}
