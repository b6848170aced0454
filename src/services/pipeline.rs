// src/services/pipeline.rs
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::config::PipelineConfig;
use crate::errors::FeedError;
use crate::models::{CheckQuote, HistoryRecord, PriceSnapshot, PrimaryQuote, Quote};
use crate::services::{ecb, http, stooq};

/// A run is rejected when every quote source reports a date older than this.
pub const MAX_QUOTE_AGE_DAYS: i64 = 10;

pub const PRICE_FILE: &str = "price.json";
pub const HISTORY_FILE: &str = "history.jsonl";

/// Fetch both quotes and the reference rate, validate, and persist the
/// snapshot plus one history line. Nothing is written on failure.
pub async fn run(config: &PipelineConfig) -> Result<PriceSnapshot, FeedError> {
    let client = http::build_client()?;

    // Independent fetches; a failure in one does not cancel the others,
    // their results are simply awaited and discarded.
    let (primary, check, usd_per_eur) = tokio::join!(
        stooq::fetch_quote(&client, stooq::PRIMARY_SYMBOL),
        stooq::fetch_quote(&client, stooq::CHECK_SYMBOL),
        ecb::fetch_rate(&client, "EUR", "USD"),
    );
    let primary = primary?;
    let check = check?;
    let usd_per_eur = usd_per_eur?;

    ensure_fresh(&primary, &check, Utc::now().date_naive())?;

    let (snapshot, record) = compose(primary, check, usd_per_eur, Utc::now());
    persist(&config.data_dir, &snapshot, &record)?;

    info!(
        "OK: {} primary {} check {}",
        snapshot.as_of.format("%Y-%m-%dT%H:%M:%SZ"),
        snapshot.primary.eur_per_oz,
        snapshot.check.eur_per_oz,
    );
    Ok(snapshot)
}

/// Displayed values carry 2 decimal places, rounding halves away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Reject the run only when *both* sources are stale; one source briefly
/// behind the other is tolerated.
pub(crate) fn ensure_fresh(
    primary: &Quote,
    check: &Quote,
    today: NaiveDate,
) -> Result<(), FeedError> {
    let primary_age = primary.age_in_days(today);
    let check_age = check.age_in_days(today);
    if primary_age > MAX_QUOTE_AGE_DAYS && check_age > MAX_QUOTE_AGE_DAYS {
        return Err(FeedError::StaleUpstreamData(format!(
            "primary {} ({}d), check {} ({}d)",
            primary.date, primary_age, check.date, check_age
        )));
    }
    Ok(())
}

/// Build the snapshot and its history line. The cross-check value is an
/// independent sanity signal; it never overrides the primary.
pub(crate) fn compose(
    primary: Quote,
    check: Quote,
    usd_per_eur: Decimal,
    as_of: DateTime<Utc>,
) -> (PriceSnapshot, HistoryRecord) {
    let check_eur_per_oz = check.value / usd_per_eur;

    let snapshot = PriceSnapshot {
        as_of,
        primary: PrimaryQuote {
            source: format!("stooq-{}", stooq::PRIMARY_SYMBOL),
            eur_per_oz: round2(primary.value),
            quote_date: primary.date,
            quote_time: primary.time,
        },
        check: CheckQuote {
            source: format!("stooq-{} + ecb-usd-per-eur", stooq::CHECK_SYMBOL),
            eur_per_oz: check_eur_per_oz,
            usd_per_eur,
            usd_per_oz_raw: check.value,
            quote_date: check.date,
            quote_time: check.time,
        },
    };
    let record = HistoryRecord {
        as_of,
        eur_per_oz_primary: snapshot.primary.eur_per_oz,
        eur_per_oz_check: check_eur_per_oz,
    };
    (snapshot, record)
}

/// Snapshot first, then the history line; an interruption between the two
/// leaves a complete snapshot with history lagging one record, never a
/// corrupt snapshot.
pub(crate) fn persist(
    data_dir: &Path,
    snapshot: &PriceSnapshot,
    record: &HistoryRecord,
) -> Result<(), FeedError> {
    fs::create_dir_all(data_dir).map_err(|e| persist_err(data_dir, e))?;

    let price_path = data_dir.join(PRICE_FILE);
    let payload = serde_json::to_string_pretty(snapshot)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        .map_err(|e| persist_err(&price_path, e))?;
    fs::write(&price_path, payload + "\n").map_err(|e| persist_err(&price_path, e))?;

    let history_path = data_dir.join(HISTORY_FILE);
    let line = serde_json::to_string(record)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        .map_err(|e| persist_err(&history_path, e))?;
    let mut history = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&history_path)
        .map_err(|e| persist_err(&history_path, e))?;
    history
        .write_all(format!("{}\n", line).as_bytes())
        .map_err(|e| persist_err(&history_path, e))
}

fn persist_err(path: &Path, source: io::Error) -> FeedError {
    FeedError::Persist {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn quote(value: Decimal, date: NaiveDate) -> Quote {
        Quote {
            value,
            date,
            time: NaiveTime::from_hms_opt(22, 0, 20).unwrap(),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rounds_half_away_from_zero_to_two_places() {
        assert_eq!(round2(dec!(4189.555)), dec!(4189.56));
        assert_eq!(round2(dec!(4189.554)), dec!(4189.55));
        assert_eq!(round2(dec!(4189.5)), dec!(4189.50));
    }

    #[test]
    fn both_sources_stale_aborts_the_run() {
        let today = day(2026, 2, 17);
        let primary = quote(dec!(4189.55), day(2026, 2, 6));
        let check = quote(dec!(4510.00), day(2026, 2, 5));
        let err = ensure_fresh(&primary, &check, today).unwrap_err();
        assert!(matches!(err, FeedError::StaleUpstreamData(_)));
    }

    #[test]
    fn one_fresh_source_keeps_the_run_alive() {
        let today = day(2026, 2, 17);
        let primary = quote(dec!(4189.55), day(2026, 2, 16));
        let check = quote(dec!(4510.00), day(2026, 2, 1));
        assert!(ensure_fresh(&primary, &check, today).is_ok());
    }

    #[test]
    fn exactly_ten_days_old_is_still_fresh() {
        let today = day(2026, 2, 17);
        let primary = quote(dec!(4189.55), day(2026, 2, 7));
        let check = quote(dec!(4510.00), day(2026, 2, 7));
        assert!(ensure_fresh(&primary, &check, today).is_ok());
    }

    #[test]
    fn primary_is_rounded_and_check_kept_at_full_precision() {
        let as_of = Utc.with_ymd_and_hms(2026, 2, 6, 22, 5, 0).unwrap();
        let primary = quote(dec!(4189.555), day(2026, 2, 6));
        let check = quote(dec!(4510.00), day(2026, 2, 6));

        let (snapshot, record) = compose(primary, check, dec!(1.0766), as_of);

        assert_eq!(snapshot.primary.eur_per_oz, dec!(4189.56));
        assert_eq!(snapshot.check.eur_per_oz, dec!(4510.00) / dec!(1.0766));
        assert_eq!(snapshot.check.usd_per_oz_raw, dec!(4510.00));
        assert_eq!(snapshot.check.usd_per_eur, dec!(1.0766));
        assert_eq!(record.eur_per_oz_primary, dec!(4189.56));
        assert_eq!(record.eur_per_oz_check, snapshot.check.eur_per_oz);
    }

    #[test]
    fn history_grows_by_one_line_per_run_and_snapshot_is_replaced() {
        let dir = TempDir::new().unwrap();
        let as_of = Utc.with_ymd_and_hms(2026, 2, 6, 22, 5, 0).unwrap();

        let (first, first_record) = compose(
            quote(dec!(4189.555), day(2026, 2, 6)),
            quote(dec!(4510.00), day(2026, 2, 6)),
            dec!(1.0766),
            as_of,
        );
        persist(dir.path(), &first, &first_record).unwrap();

        let (second, second_record) = compose(
            quote(dec!(4201.10), day(2026, 2, 7)),
            quote(dec!(4522.30), day(2026, 2, 7)),
            dec!(1.0770),
            as_of + chrono::Duration::days(1),
        );
        persist(dir.path(), &second, &second_record).unwrap();

        let history = fs::read_to_string(dir.path().join(HISTORY_FILE)).unwrap();
        let lines: Vec<_> = history.lines().collect();
        assert_eq!(lines.len(), 2);
        // Earlier records are never rewritten
        assert!(lines[0].contains("4189.56"));
        assert!(lines[1].contains("4201.1"));

        let snapshot_text = fs::read_to_string(dir.path().join(PRICE_FILE)).unwrap();
        assert!(snapshot_text.ends_with('\n'));
        let reloaded: PriceSnapshot = serde_json::from_str(&snapshot_text).unwrap();
        assert_eq!(reloaded.primary.eur_per_oz, dec!(4201.10));
        assert!(!snapshot_text.contains("4189.56"));
    }
}
