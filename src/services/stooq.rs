// src/services/stooq.rs
use chrono::{NaiveDate, NaiveTime};
use csv::Reader;
use log::{info, warn};
use regex::Regex;
use reqwest::Client;
use rust_decimal::Decimal;
use scraper::Html;
use std::str::FromStr;

use crate::errors::FeedError;
use crate::models::Quote;
use crate::services::http;

/// Symbol backing the displayed EUR/oz price.
pub const PRIMARY_SYMBOL: &str = "xaueur";
/// Symbol backing the independent cross-check (USD/oz, converted via ECB).
pub const CHECK_SYMBOL: &str = "xauusd";

fn summary_url(symbol: &str) -> String {
    format!("https://stooq.com/q/?s={}", symbol)
}

fn daily_csv_url(symbol: &str) -> String {
    format!("https://stooq.com/q/d/l/?s={}&i=d", symbol)
}

/// The two parsing strategies for a quote document.
///
/// The summary scrape is richer (intraday timestamp) but brittle to markup
/// changes; the daily series is stable but carries no clock time. Both
/// return tagged results so the fallback ordering in [`fetch_quote`] stays
/// explicit and each branch is testable without network I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteParser {
    /// `Last <value> ... Date <date> <time>` pattern in the summary page text.
    Scrape,
    /// Last row of the daily `Date,...,Close` series.
    DailyCsv,
}

impl QuoteParser {
    pub fn parse(&self, body: &str) -> Result<Quote, FeedError> {
        match self {
            QuoteParser::Scrape => parse_summary(body),
            QuoteParser::DailyCsv => parse_daily_csv(body),
        }
    }
}

/// Fetch a quote for `symbol`, scraping the summary page first and falling
/// back to the daily series when the page yields no recognizable pattern.
/// Network failures are never masked by the fallback.
pub async fn fetch_quote(client: &Client, symbol: &str) -> Result<Quote, FeedError> {
    let html = http::fetch_text(client, &summary_url(symbol)).await?;
    match QuoteParser::Scrape.parse(&html) {
        Ok(quote) => {
            info!("Parsed {} summary quote: {} @ {}", symbol, quote.value, quote.date);
            Ok(quote)
        }
        Err(FeedError::ParseFailure(reason)) => {
            warn!(
                "Summary parse failed for {} ({}), falling back to daily series",
                symbol, reason
            );
            let csv_text = http::fetch_text(client, &daily_csv_url(symbol)).await?;
            let quote = QuoteParser::DailyCsv.parse(&csv_text)?;
            info!("Parsed {} daily-series quote: {} @ {}", symbol, quote.value, quote.date);
            Ok(quote)
        }
        Err(other) => Err(other),
    }
}

fn parse_summary(html: &str) -> Result<Quote, FeedError> {
    let document = Html::parse_document(html);
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    // Collapse whitespace so the pattern is insensitive to markup layout
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let re = Regex::new(
        r"(?i)Last\s+([0-9]+(?:\.[0-9]+)?)\s+.*?Date\s+(\d{4}-\d{2}-\d{2})\s+(\d{2}:\d{2}:\d{2})",
    )
    .map_err(|e| FeedError::ParseFailure(e.to_string()))?;

    let caps = re.captures(&flat).ok_or_else(|| {
        FeedError::ParseFailure("summary page has no Last/Date/Time block".to_string())
    })?;

    let value = positive_decimal(&caps[1], "summary 'Last'")?;
    let date = NaiveDate::parse_from_str(&caps[2], "%Y-%m-%d")
        .map_err(|e| FeedError::ParseFailure(format!("summary date: {}", e)))?;
    let time = NaiveTime::parse_from_str(&caps[3], "%H:%M:%S")
        .map_err(|e| FeedError::ParseFailure(format!("summary time: {}", e)))?;

    Ok(Quote { value, date, time })
}

/// Parse the last row of the daily series. The tabular format carries no
/// intraday time, so the quote gets the midnight sentinel.
fn parse_daily_csv(text: &str) -> Result<Quote, FeedError> {
    let mut rdr = Reader::from_reader(text.as_bytes());

    let headers = rdr.headers()?.clone();
    let idx_date = headers
        .iter()
        .position(|h| h.trim() == "Date")
        .ok_or_else(|| FeedError::ParseFailure("no 'Date' column in daily series".to_string()))?;
    let idx_close = headers
        .iter()
        .position(|h| h.trim() == "Close")
        .ok_or_else(|| FeedError::ParseFailure("no 'Close' column in daily series".to_string()))?;

    // The series is oldest-first; the last row is the most recent session
    let mut last = None;
    for record in rdr.records() {
        last = Some(record?);
    }
    let row = last
        .ok_or_else(|| FeedError::ParseFailure("no data rows in daily series".to_string()))?;

    let date_cell = row
        .get(idx_date)
        .ok_or_else(|| FeedError::ParseFailure("missing 'Date' field".to_string()))?
        .trim();
    let close_cell = row
        .get(idx_close)
        .ok_or_else(|| FeedError::ParseFailure("missing 'Close' field".to_string()))?
        .trim();

    let date = NaiveDate::parse_from_str(date_cell, "%Y-%m-%d")
        .map_err(|e| FeedError::ParseFailure(format!("daily series date: {}", e)))?;
    let value = positive_decimal(close_cell, "daily series 'Close'")?;

    Ok(Quote {
        value,
        date,
        time: NaiveTime::MIN,
    })
}

fn positive_decimal(cell: &str, what: &str) -> Result<Decimal, FeedError> {
    let value = Decimal::from_str(cell)
        .map_err(|e| FeedError::ParseFailure(format!("{} '{}': {}", what, cell, e)))?;
    if value <= Decimal::ZERO {
        return Err(FeedError::ParseFailure(format!(
            "{} '{}' is not a positive number",
            what, cell
        )));
    }
    Ok(value)
}
