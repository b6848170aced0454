// src/errors.rs
use thiserror::Error;

/// Failure taxonomy shared by the acquisition pipeline and the cache router.
///
/// Fallback chains (scrape -> daily CSV, network -> cached copy) branch on
/// these variants instead of downcasting boxed errors, so every recovery
/// path is plain data flow.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network error, timeout, or non-success HTTP status reaching a source.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Source was reachable but its content carried no recognizable data.
    #[error("could not parse upstream data: {0}")]
    ParseFailure(String),

    /// Every quote source reported a date older than the freshness threshold.
    #[error("upstream data is stale: {0}")]
    StaleUpstreamData(String),

    /// Cache store read/write failed. Non-fatal for the router: lookups
    /// degrade to misses and the fresh response is still served.
    #[error("cache store unavailable")]
    StoreUnavailable(#[source] std::io::Error),

    /// Snapshot or history output could not be written.
    #[error("failed to persist {path}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::UpstreamUnavailable(err.to_string())
    }
}

impl From<csv::Error> for FeedError {
    fn from(err: csv::Error) -> Self {
        FeedError::ParseFailure(err.to_string())
    }
}
