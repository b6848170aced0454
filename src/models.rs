// src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single parsed quote from one upstream source. Immutable once returned
/// by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub value: Decimal,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Quote {
    /// Age of the quote in whole days, measured from its own date field.
    pub fn age_in_days(&self, today: NaiveDate) -> i64 {
        today.signed_duration_since(self.date).num_days()
    }
}

/// The current persisted price record, written to `price.json` and replaced
/// wholesale on every successful pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    #[serde(with = "iso_second")]
    pub as_of: DateTime<Utc>,
    pub primary: PrimaryQuote,
    pub check: CheckQuote,
}

/// Primary leg: the displayed EUR/oz value, rounded to 2 decimal places.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryQuote {
    pub source: String,
    pub eur_per_oz: Decimal,
    pub quote_date: NaiveDate,
    pub quote_time: NaiveTime,
}

/// Cross-check leg: independently derived EUR/oz value at full precision,
/// stored alongside the primary as a sanity signal, never reconciled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckQuote {
    pub source: String,
    pub eur_per_oz: Decimal,
    pub usd_per_eur: Decimal,
    pub usd_per_oz_raw: Decimal,
    pub quote_date: NaiveDate,
    pub quote_time: NaiveTime,
}

/// One line of `history.jsonl`, appended per successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(with = "iso_second", rename = "asOf")]
    pub as_of: DateTime<Utc>,
    #[serde(rename = "eurPerOz_primary")]
    pub eur_per_oz_primary: Decimal,
    #[serde(rename = "eurPerOz_check")]
    pub eur_per_oz_check: Decimal,
}

/// ISO-8601 UTC at second precision, e.g. `2026-02-06T22:05:00Z`.
pub mod iso_second {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
