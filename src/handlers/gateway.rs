// src/handlers/gateway.rs
use log::{debug, error};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use warp::http::{Method, Response, StatusCode};
use warp::hyper::body::Bytes;
use warp::path::FullPath;
use warp::Rejection;

use super::error::GatewayError;
use crate::config::GatewayConfig;
use crate::errors::FeedError;
use crate::router::{self, InterceptedRequest};
use crate::services::store::{cache_name, CacheStore, StoredResponse};

/// Upper bound for forwards that carry no tighter per-request timeout
/// (static assets, passthrough traffic).
const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-process gateway state: the forwarding client, the origin it fronts,
/// and the active cache store handle.
pub struct Gateway {
    pub client: Client,
    pub upstream: String,
    pub cache_root: PathBuf,
    pub store: CacheStore,
}

impl Gateway {
    pub fn new(config: &GatewayConfig) -> Result<Gateway, FeedError> {
        let client = Client::builder().timeout(FORWARD_TIMEOUT).build()?;
        let store = CacheStore::open(&config.cache_root, &cache_name(&config.cache_version));
        Ok(Gateway {
            client,
            upstream: config.upstream_origin.clone(),
            cache_root: config.cache_root.clone(),
            store,
        })
    }

    /// Install the app shell into this generation, then purge every other
    /// generation. Runs before the gateway starts answering requests, so the
    /// new generation controls all traffic from the first byte served.
    pub async fn start(&self) {
        router::install(&self.client, &self.upstream, &self.store).await;
        router::activate(&self.cache_root, &self.store);
    }
}

/// Single entry point for all gateway traffic: GETs are classified and
/// dispatched to a delivery strategy; everything else is relayed unmodified.
pub async fn handle_request(
    method: Method,
    path: FullPath,
    query: Option<String>,
    accept: Option<String>,
    body: Bytes,
    gateway: Arc<Gateway>,
) -> Result<Response<Vec<u8>>, Rejection> {
    if method != Method::GET {
        return match passthrough(&gateway, method, path.as_str(), query.as_deref(), body).await {
            Ok(resp) => Ok(into_response(resp)),
            Err(err) => {
                error!("passthrough for {} failed: {}", path.as_str(), err);
                Err(warp::reject::custom(GatewayError::from_feed(&err)))
            }
        };
    }

    let req = InterceptedRequest {
        method,
        path: path.as_str().to_string(),
        query,
        accept,
    };
    let class = router::classify(&req);
    debug!("GET {} classified as {:?}", req.path, class);

    match router::dispatch(class, &gateway.client, &gateway.upstream, &req, &gateway.store).await {
        Ok(resp) => Ok(into_response(resp)),
        Err(err) => {
            error!("GET {} failed: {}", req.path, err);
            Err(warp::reject::custom(GatewayError::from_feed(&err)))
        }
    }
}

async fn passthrough(
    gateway: &Gateway,
    method: Method,
    path: &str,
    query: Option<&str>,
    body: Bytes,
) -> Result<StoredResponse, FeedError> {
    let url = router::upstream_url(&gateway.upstream, path, query);
    let response = gateway
        .client
        .request(method, &url)
        .body(body.to_vec())
        .send()
        .await?;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.bytes().await?.to_vec();

    Ok(StoredResponse {
        status,
        content_type,
        body,
    })
}

fn into_response(resp: StoredResponse) -> Response<Vec<u8>> {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    if let Some(content_type) = &resp.content_type {
        builder = builder.header("content-type", content_type);
    }
    builder
        .body(resp.body)
        .unwrap_or_else(|_| Response::new(Vec::new()))
}
