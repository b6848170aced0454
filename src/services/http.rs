// src/services/http.rs
use log::info;
use reqwest::header;
use reqwest::Client;
use std::time::Duration;

use crate::errors::FeedError;

/// Identifying user agent, helpful against basic bot heuristics on the
/// upstream quote pages.
const USER_AGENT: &str =
    "Mozilla/5.0 (Gold-Portfolio-Updater; +https://github.com/konradclos/Gold)";

/// Upper bound for any single upstream request that carries no tighter
/// per-request timeout of its own.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the shared client used for all upstream fetches. Built once per
/// process and passed by reference.
pub fn build_client() -> Result<Client, FeedError> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(CLIENT_TIMEOUT)
        .build()?;
    Ok(client)
}

/// Fetch a document as text with transport caching disabled.
///
/// A non-success status is an `UpstreamUnavailable`: the source exists but
/// is not serving data we can use.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String, FeedError> {
    info!("Fetching {}", url);

    let response = client
        .get(url)
        .header(
            header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header(header::ACCEPT_LANGUAGE, "en,de;q=0.9")
        .header(header::CACHE_CONTROL, "no-store")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::UpstreamUnavailable(format!(
            "fetch failed {} for {}",
            status, url
        )));
    }

    Ok(response.text().await?)
}
