// src/handlers/error.rs
use std::fmt;
use warp::http::StatusCode;
use warp::reject::Reject;

use crate::errors::FeedError;

/// Rejection raised when a request cannot be answered from either the
/// network or the cache; carries the status the gateway replies with.
#[derive(Debug, Clone)]
pub struct GatewayError {
    pub status: StatusCode,
    pub message: String,
}

impl GatewayError {
    pub fn from_feed(err: &FeedError) -> Self {
        let status = match err {
            FeedError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            FeedError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        GatewayError {
            status,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for GatewayError {}
impl Reject for GatewayError {}
