// src/config.rs
use log::warn;
use std::env;
use std::path::PathBuf;

/// Gateway settings, read from the environment (a `.env` file is honored
/// when present).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port the gateway binds on.
    pub port: u16,
    /// Origin the gateway fronts, e.g. `http://127.0.0.1:8080`.
    pub upstream_origin: String,
    /// Root directory holding the cache generations.
    pub cache_root: PathBuf,
    /// Generation suffix; bump it to force clients onto a fresh cache.
    pub cache_version: String,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let port_str = env::var("PORT").unwrap_or_else(|_| {
            warn!("$PORT not set, defaulting to 3030");
            "3030".to_string()
        });
        let port: u16 = port_str.parse().expect("PORT must be a number");

        let upstream_origin = env::var("UPSTREAM_ORIGIN").unwrap_or_else(|_| {
            warn!("$UPSTREAM_ORIGIN not set, defaulting to http://127.0.0.1:8080");
            "http://127.0.0.1:8080".to_string()
        });

        GatewayConfig {
            port,
            upstream_origin: upstream_origin.trim_end_matches('/').to_string(),
            cache_root: PathBuf::from(env::var("CACHE_DIR").unwrap_or_else(|_| "cache".to_string())),
            cache_version: env::var("CACHE_VERSION").unwrap_or_else(|_| "v4".to_string()),
        }
    }
}

/// Price acquisition settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving `price.json` and `history.jsonl`.
    pub data_dir: PathBuf,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        PipelineConfig {
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string())),
        }
    }
}
