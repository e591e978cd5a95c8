//! Error types for data feeds and aggregation runs.

use thiserror::Error;

use crate::models::Feed;

/// Failure of a single collaborator fetch.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {endpoint} timed out after {seconds}s")]
    Timeout { endpoint: String, seconds: u64 },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected payload from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed '{0}' is not available")]
    Missing(String),
}

/// Failure of a whole aggregation run. Only mandatory feeds produce one.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Mandatory {feed} feed failed: {error}")]
    Mandatory {
        feed: Feed,
        #[source]
        error: SourceError,
    },
}

impl AggregationError {
    #[allow(dead_code)] // The CLI only shows the message
    pub fn feed(&self) -> Feed {
        match self {
            AggregationError::Mandatory { feed, .. } => *feed,
        }
    }
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;
