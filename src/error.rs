//! Typed errors for the harvesting library.
//!
//! The binary wraps these in `anyhow`; library code returns them directly.

use thiserror::Error;

/// Failures raised by a [`PageTransport`](crate::scrapers::traits::PageTransport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete within the allotted timeout
    #[error("request timed out")]
    Timeout,

    /// Any other request failure (connect, TLS, body decode)
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Errors surfaced by [`PageFetcher::fetch`](crate::scrapers::PageFetcher::fetch).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetching {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("gave up on {url} after {attempts} timed out attempts")]
    RetriesExhausted { url: String, attempts: u32 },
}

/// Errors while reading the embedded page state.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("embedded state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("embedded state has no `{0}`")]
    MissingPath(String),

    #[error("embedded state has no listing query key")]
    MissingListingQuery,
}
