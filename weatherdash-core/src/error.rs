//! Error types for the weatherdash core.
//!
//! Transport-level failures (`ClientError`) never leave the client/query
//! boundary as-is: they are normalised into a cloneable [`FetchError`] that
//! store and workflow code can hold, compare and hand to several waiters.

use reqwest::StatusCode;
use thiserror::Error;

use crate::retry::{RetryDecision, is_retryable_status};

/// Raw failure of a single outbound API call.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("OpenWeather request failed with status {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("Failed to parse OpenWeather JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ClientError {
    pub fn retry_decision(&self) -> RetryDecision {
        match self {
            ClientError::Network(e) => crate::retry::is_retryable_error(e),
            ClientError::Api { status, .. } => is_retryable_status(*status),
            ClientError::Parse(_) => RetryDecision::NoRetry,
        }
    }
}

/// Weather/forecast fetch failure as seen by the store, workflows and UI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("weather API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unreadable weather API response: {0}")]
    Parse(String),
}

impl FetchError {
    /// Short, non-technical text for notices.
    pub fn user_message(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "Could not reach the weather service. Check your connection.",
            FetchError::Api { status: 401, .. } => "The weather service rejected the API key.",
            FetchError::Api { status: 404, .. } => "The weather service does not know this city.",
            FetchError::Api { .. } => "The weather service returned an error.",
            FetchError::Parse(_) => "The weather service sent an unexpected response.",
        }
    }
}

impl From<ClientError> for FetchError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Network(e) => FetchError::Network(e.to_string()),
            ClientError::Api { status, body } => FetchError::Api {
                status: status.as_u16(),
                message: body,
            },
            ClientError::Parse(e) => FetchError::Parse(e.to_string()),
        }
    }
}

/// A search was superseded or disposed. Never shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("search cancelled")]
pub struct Cancelled;

/// Failure reading or writing persisted dashboard state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode persisted state: {0}")]
    Encode(#[from] serde_json::Error),
}
