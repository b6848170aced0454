// src/router.rs
//! Request classification and the three delivery strategies the gateway
//! applies between clients and the static app origin.

use log::{debug, info, warn};
use reqwest::{header, Client};
use std::path::Path;
use std::time::Duration;
use warp::http::Method;

use crate::errors::FeedError;
use crate::services::store::{self, CacheStore, RequestKey, StoredResponse};

/// Timeout for live-data forwards.
pub const LIVE_DATA_TIMEOUT: Duration = Duration::from_secs(12);
/// Timeout for markup forwards.
pub const MARKUP_TIMEOUT: Duration = Duration::from_secs(8);

/// App-shell paths populated eagerly when a new generation installs.
pub const APP_SHELL: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/icon-192.png",
    "/icon-512.png",
];

/// A same-origin GET the gateway has taken responsibility for answering.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub accept: Option<String>,
}

impl InterceptedRequest {
    pub fn get(path: &str) -> InterceptedRequest {
        InterceptedRequest {
            method: Method::GET,
            path: path.to_string(),
            query: None,
            accept: None,
        }
    }

    pub fn key(&self) -> RequestKey<'_> {
        RequestKey {
            method: self.method.as_str(),
            path: &self.path,
            query: self.query.as_deref(),
        }
    }
}

/// Delivery strategy a request classifies into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Price snapshot / history: network only, cache fallback, never stored.
    LiveData,
    /// HTML: network first so updates reach returning users quickly.
    Markup,
    /// Everything else same-origin: cache first, content-addressed upstream.
    StaticAsset,
}

/// Pure classification over path and Accept header.
pub fn classify(req: &InterceptedRequest) -> RouteClass {
    if req.path.ends_with("/data/price.json") || req.path.ends_with("/data/history.jsonl") {
        return RouteClass::LiveData;
    }

    let accept = req.accept.as_deref().unwrap_or("");
    if accept.contains("text/html")
        || req.path.is_empty()
        || req.path == "/"
        || req.path.ends_with('/')
        || req.path.ends_with(".html")
    {
        return RouteClass::Markup;
    }

    RouteClass::StaticAsset
}

/// Run the strategy for `class` and return the response to deliver.
pub async fn dispatch(
    class: RouteClass,
    client: &Client,
    upstream: &str,
    req: &InterceptedRequest,
    store: &CacheStore,
) -> Result<StoredResponse, FeedError> {
    match class {
        RouteClass::LiveData => network_only_with_fallback(client, upstream, req, store).await,
        RouteClass::Markup => network_first(client, upstream, req, store).await,
        RouteClass::StaticAsset => cache_first(client, upstream, req, store).await,
    }
}

/// Live data: always hit the network with caching disabled; fall back to any
/// previously stored entry for the path (query string ignored) only when the
/// network fails. Fresh responses are never written to the store, so offline
/// reads can only ever see app-shell-era entries, not a frozen price.
pub async fn network_only_with_fallback(
    client: &Client,
    upstream: &str,
    req: &InterceptedRequest,
    store: &CacheStore,
) -> Result<StoredResponse, FeedError> {
    match forward(client, upstream, req, Some(LIVE_DATA_TIMEOUT), true).await {
        Ok(fresh) => Ok(fresh),
        Err(err) => match store.lookup(&req.key(), true) {
            Some(cached) => {
                warn!(
                    "live fetch for {} failed ({}), serving last cached copy",
                    req.path, err
                );
                Ok(cached)
            }
            None => Err(err),
        },
    }
}

/// Markup: prefer the network and keep a copy for offline boots; fall back
/// to the stored copy (query string ignored) when the network fails.
pub async fn network_first(
    client: &Client,
    upstream: &str,
    req: &InterceptedRequest,
    store: &CacheStore,
) -> Result<StoredResponse, FeedError> {
    match forward(client, upstream, req, Some(MARKUP_TIMEOUT), true).await {
        Ok(fresh) => {
            if is_success(fresh.status) {
                if let Err(err) = store.put(&req.key(), &fresh) {
                    warn!("could not cache {}: {}", req.path, err);
                }
            }
            Ok(fresh)
        }
        Err(err) => match store.lookup(&req.key(), true) {
            Some(cached) => {
                warn!(
                    "markup fetch for {} failed ({}), serving last cached copy",
                    req.path, err
                );
                Ok(cached)
            }
            None => Err(err),
        },
    }
}

/// Static assets: serve the stored copy when present, otherwise fetch and
/// store. Assets are content-addressed by build naming upstream, so a stale
/// hit is acceptable.
pub async fn cache_first(
    client: &Client,
    upstream: &str,
    req: &InterceptedRequest,
    store: &CacheStore,
) -> Result<StoredResponse, FeedError> {
    if let Some(cached) = store.lookup(&req.key(), false) {
        debug!("cache hit for {}", req.path);
        return Ok(cached);
    }

    let fresh = forward(client, upstream, req, None, false).await?;
    if is_success(fresh.status) {
        if let Err(err) = store.put(&req.key(), &fresh) {
            warn!("could not cache {}: {}", req.path, err);
        }
    }
    Ok(fresh)
}

/// Eagerly populate the new generation with the app shell. Individual
/// failures are tolerated so one missing asset does not block installation.
pub async fn install(client: &Client, upstream: &str, store: &CacheStore) {
    for path in APP_SHELL {
        let req = InterceptedRequest::get(path);
        match forward(client, upstream, &req, Some(MARKUP_TIMEOUT), false).await {
            Ok(resp) if is_success(resp.status) => {
                if let Err(err) = store.put(&req.key(), &resp) {
                    warn!("shell entry {} not stored: {}", path, err);
                }
            }
            Ok(resp) => warn!("shell fetch {} returned status {}", path, resp.status),
            Err(err) => warn!("shell fetch {} failed: {}", path, err),
        }
    }
    info!("Installed app shell into {}", store.generation());
}

/// Make this generation the only one: purge every other generation under
/// the root. Purge failure is logged, not fatal.
pub fn activate(root: &Path, store: &CacheStore) {
    match store::purge_all_except(root, store.generation()) {
        Ok(removed) if removed.is_empty() => info!("Activated {}", store.generation()),
        Ok(removed) => info!(
            "Activated {}, purged {}",
            store.generation(),
            removed.join(", ")
        ),
        Err(err) => warn!("Activated {}, purge failed: {}", store.generation(), err),
    }
}

/// Forward a GET to the upstream origin, reducing the reply to the stored
/// representation (status, content type, body).
async fn forward(
    client: &Client,
    upstream: &str,
    req: &InterceptedRequest,
    timeout: Option<Duration>,
    no_store: bool,
) -> Result<StoredResponse, FeedError> {
    let url = upstream_url(upstream, &req.path, req.query.as_deref());
    let mut request = client.get(&url);
    if let Some(accept) = &req.accept {
        request = request.header(header::ACCEPT, accept);
    }
    if no_store {
        request = request
            .header(header::CACHE_CONTROL, "no-store")
            .header(header::PRAGMA, "no-cache");
    }
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request.send().await?;
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.bytes().await?.to_vec();

    Ok(StoredResponse {
        status,
        content_type,
        body,
    })
}

pub(crate) fn upstream_url(upstream: &str, path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) => format!("{}{}?{}", upstream, path, q),
        None => format!("{}{}", upstream, path),
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}
