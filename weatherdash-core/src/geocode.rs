//! City search against the geocoding endpoint.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{error::Cancelled, model::CitySuggestion, provider::WeatherProvider};

pub const MAX_SUGGESTIONS: usize = 5;
pub const MIN_QUERY_LEN: usize = 2;

#[derive(Debug, Clone)]
pub struct GeocodingClient {
    provider: Arc<dyn WeatherProvider>,
}

impl GeocodingClient {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    /// Suggestions for `query`, at most [`MAX_SUGGESTIONS`].
    ///
    /// Queries shorter than [`MIN_QUERY_LEN`] (after trimming) return nothing
    /// without touching the network. Transport and parse failures are logged
    /// and also yield an empty list. Only cancellation is reported as an error,
    /// and the in-flight request is dropped when it happens.
    pub async fn suggest(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CitySuggestion>, Cancelled> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Ok(Vec::new());
        }

        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(Cancelled),
            result = self.provider.geocode(query, MAX_SUGGESTIONS) => match result {
                Ok(records) => Ok(records
                    .into_iter()
                    .take(MAX_SUGGESTIONS)
                    .map(CitySuggestion::from)
                    .collect()),
                Err(e) => {
                    tracing::warn!("error fetching city suggestions for {:?}: {}", query, e);
                    Ok(Vec::new())
                }
            },
        }
    }
}
