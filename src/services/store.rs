// src/services/store.rs
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::errors::FeedError;

/// Scopes generation directories to this app; anything else under the cache
/// root is left alone.
pub const CACHE_NAME_PREFIX: &str = "gold-portfolio-";

/// Full generation id for a version suffix, e.g. `gold-portfolio-v4`.
pub fn cache_name(version: &str) -> String {
    format!("{}{}", CACHE_NAME_PREFIX, version)
}

/// Normalized request identity used as the cache key.
#[derive(Debug, Clone, Copy)]
pub struct RequestKey<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: Option<&'a str>,
}

impl RequestKey<'_> {
    fn identity(&self) -> String {
        match self.query {
            Some(q) => format!("{} {}?{}", self.method, self.path, q),
            None => format!("{} {}", self.method, self.path),
        }
    }
}

/// A stored response body plus the headers the gateway reproduces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    pub content_type: Option<String>,
    #[serde(with = "body_b64")]
    pub body: Vec<u8>,
}

/// On-disk entry wrapper; one JSON file per entry, replaced whole on write.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    method: String,
    path: String,
    query: Option<String>,
    #[serde(rename = "storedAt")]
    stored_at: DateTime<Utc>,
    response: StoredResponse,
}

/// Handle to one generation of the cache store, a directory of entry files
/// under the cache root.
///
/// Opening never touches the disk; the directory is created on first write,
/// so an inaccessible store degrades per-operation (lookups miss, writes
/// report `StoreUnavailable`) instead of failing the gateway at startup.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    generation: String,
}

impl CacheStore {
    pub fn open(root: &Path, generation: &str) -> CacheStore {
        CacheStore {
            dir: root.join(generation),
            generation: generation.to_string(),
        }
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Look up a stored response. With `ignore_query` the path alone
    /// identifies the entry and the most recently stored match wins.
    /// Unreadable entries count as misses.
    pub fn lookup(&self, key: &RequestKey, ignore_query: bool) -> Option<StoredResponse> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("cache read for {} skipped: {}", key.path, e);
                return None;
            }
        };

        let mut best: Option<CacheEntry> = None;
        for dir_entry in entries.flatten() {
            let content = match fs::read_to_string(dir_entry.path()) {
                Ok(content) => content,
                Err(_) => continue,
            };
            let entry: CacheEntry = match serde_json::from_str(&content) {
                Ok(entry) => entry,
                Err(_) => continue,
            };

            if entry.method != key.method || entry.path != key.path {
                continue;
            }
            if !ignore_query && entry.query.as_deref() != key.query {
                continue;
            }
            match &best {
                Some(current) if current.stored_at >= entry.stored_at => {}
                _ => best = Some(entry),
            }
        }

        best.map(|entry| entry.response)
    }

    /// Store a response under the request identity, replacing any previous
    /// entry for the same identity.
    pub fn put(&self, key: &RequestKey, response: &StoredResponse) -> Result<(), FeedError> {
        fs::create_dir_all(&self.dir).map_err(FeedError::StoreUnavailable)?;

        let entry = CacheEntry {
            method: key.method.to_string(),
            path: key.path.to_string(),
            query: key.query.map(str::to_string),
            stored_at: Utc::now(),
            response: response.clone(),
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            .map_err(FeedError::StoreUnavailable)?;

        fs::write(self.entry_path(key), json).map_err(FeedError::StoreUnavailable)
    }

    fn entry_path(&self, key: &RequestKey) -> PathBuf {
        let name = URL_SAFE_NO_PAD.encode(key.identity());
        self.dir.join(format!("{}.json", name))
    }
}

/// All generation ids belonging to this app under `root`.
pub fn list_generations(root: &Path) -> Result<BTreeSet<String>, FeedError> {
    let mut generations = BTreeSet::new();
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(generations),
        Err(e) => return Err(FeedError::StoreUnavailable(e)),
    };

    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with(CACHE_NAME_PREFIX) {
                generations.insert(name.to_string());
            }
        }
    }
    Ok(generations)
}

/// Delete every generation belonging to this app except `keep`. This is the
/// store's only garbage collection; entries inside a generation never expire.
pub fn purge_all_except(root: &Path, keep: &str) -> Result<Vec<String>, FeedError> {
    let mut removed = Vec::new();
    for name in list_generations(root)? {
        if name == keep {
            continue;
        }
        fs::remove_dir_all(root.join(&name)).map_err(FeedError::StoreUnavailable)?;
        removed.push(name);
    }
    Ok(removed)
}

mod body_b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        STANDARD.decode(raw).map_err(serde::de::Error::custom)
    }
}
