// src/services/ecb.rs
use log::info;
use regex::Regex;
use reqwest::Client;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::FeedError;
use crate::services::http;

const EUROFXREF_DAILY_URL: &str =
    "https://www.ecb.europa.eu/stats/eurofxref/eurofxref-daily.xml";

/// Fetch the daily reference rate for `base`/`quote` (units of `quote` per
/// one `base`) from the ECB table.
pub async fn fetch_rate(client: &Client, base: &str, quote: &str) -> Result<Decimal, FeedError> {
    let xml = http::fetch_text(client, EUROFXREF_DAILY_URL).await?;
    let rate = extract_rate(&xml, base, quote)?;
    info!("ECB reference rate {}/{}: {}", base, quote, rate);
    Ok(rate)
}

/// Extract one rate from the reference table. The table is EUR-based, so a
/// non-EUR base is derived from the two EUR legs.
pub(crate) fn extract_rate(xml: &str, base: &str, quote: &str) -> Result<Decimal, FeedError> {
    let base_per_eur = eur_rate(xml, base)?;
    let quote_per_eur = eur_rate(xml, quote)?;

    let rate = quote_per_eur / base_per_eur;
    if rate <= Decimal::ZERO {
        return Err(FeedError::ParseFailure(format!(
            "reference rate {}/{} is not positive",
            base, quote
        )));
    }
    Ok(rate)
}

/// Units of `currency` per one EUR, looked up by the currency attribute
/// rather than by row position.
fn eur_rate(xml: &str, currency: &str) -> Result<Decimal, FeedError> {
    if currency.eq_ignore_ascii_case("EUR") {
        return Ok(Decimal::ONE);
    }

    let pattern = format!(
        r#"(?i)currency=['"]{}['"]\s+rate=['"]([0-9.]+)['"]"#,
        regex::escape(currency)
    );
    let re = Regex::new(&pattern).map_err(|e| FeedError::ParseFailure(e.to_string()))?;

    let caps = re.captures(xml).ok_or_else(|| {
        FeedError::ParseFailure(format!("{} rate not found in reference table", currency))
    })?;

    let rate = Decimal::from_str(&caps[1])
        .map_err(|e| FeedError::ParseFailure(format!("{} rate: {}", currency, e)))?;
    if rate <= Decimal::ZERO {
        return Err(FeedError::ParseFailure(format!(
            "{} rate '{}' is not positive",
            currency, &caps[1]
        )));
    }
    Ok(rate)
}
