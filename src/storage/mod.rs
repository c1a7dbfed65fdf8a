pub mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::models::{AnalysisSignal, DailyReport, EconomicEvent, NewsItem, Snapshot, Timeframe};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid stored value in {column}: {value}")]
    InvalidValue { column: &'static str, value: String },
    #[error("store connection lock poisoned")]
    Poisoned,
}

/// Persistence keyed by (date, symbol).
///
/// `replace_*` must delete and insert atomically: a concurrent reader sees
/// either the old row or the new one, never both and never neither.
pub trait Store: Send + Sync {
    fn load_signal(
        &self,
        date: NaiveDate,
        symbol: &str,
        timeframe: Option<Timeframe>,
    ) -> Result<Option<AnalysisSignal>, StoreError>;

    fn replace_signal(
        &self,
        date: NaiveDate,
        symbol: &str,
        timeframe: Option<Timeframe>,
        signal: &AnalysisSignal,
    ) -> Result<(), StoreError>;

    fn load_report(&self, date: NaiveDate, symbol: &str) -> Result<Option<DailyReport>, StoreError>;

    fn replace_report(
        &self,
        date: NaiveDate,
        symbol: &str,
        report: &DailyReport,
    ) -> Result<(), StoreError>;

    fn count_reports(&self, date: NaiveDate, symbol: &str) -> Result<usize, StoreError>;

    /// Events with `start <= event_time_utc < end`, ordered by time.
    fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EconomicEvent>, StoreError>;

    /// News published at or after `cutoff`, in insertion order.
    fn news_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<NewsItem>, StoreError>;

    fn snapshots_between(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>, StoreError>;

    /// Returns true when a new row was inserted, false when an existing
    /// (time, currency, title) row was updated.
    fn upsert_event(&self, event: &EconomicEvent) -> Result<bool, StoreError>;

    /// Returns true when a new row was inserted, false when the url existed.
    fn upsert_news(&self, item: &NewsItem) -> Result<bool, StoreError>;

    fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

/// UTC bounds of a calendar day, end exclusive.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + chrono::Duration::days(1))
}

/// UTC bounds of a calendar day in `tz`, end exclusive.
pub fn local_day_bounds(date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = |d: NaiveDate| {
        let naive = d.and_time(NaiveTime::MIN);
        tz.from_local_datetime(&naive)
            .earliest()
            .map_or_else(|| naive.and_utc(), |t| t.with_timezone(&Utc))
    };
    let next = date.succ_opt().unwrap_or(date);
    (midnight(date), midnight(next))
}

/// A day's calendar, optionally restricted to some currencies.
pub fn events_for_day<S: Store + ?Sized>(
    store: &S,
    date: NaiveDate,
    currencies: Option<&[String]>,
) -> Result<Vec<EconomicEvent>, StoreError> {
    let (start, end) = day_bounds(date);
    let mut events = store.events_between(start, end)?;
    if let Some(currencies) = currencies {
        events.retain(|e| currencies.iter().any(|c| c.eq_ignore_ascii_case(&e.currency)));
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Impact;
    use crate::test_helpers::{make_event, test_date, utc};

    #[test]
    fn day_bounds_are_utc_midnights() {
        let (start, end) = day_bounds(test_date());
        assert_eq!(start, utc("2025-01-10T00:00:00Z"));
        assert_eq!(end, utc("2025-01-11T00:00:00Z"));
    }

    #[test]
    fn local_day_bounds_follow_the_zone() {
        let (start, end) = local_day_bounds(test_date(), chrono_tz::America::New_York);
        assert_eq!(start, utc("2025-01-10T05:00:00Z"));
        assert_eq!(end, utc("2025-01-11T05:00:00Z"));

        // spring-forward day is 23 hours long
        let dst = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let (start, end) = local_day_bounds(dst, chrono_tz::America::New_York);
        assert_eq!(start, utc("2025-03-09T05:00:00Z"));
        assert_eq!(end, utc("2025-03-10T04:00:00Z"));
    }

    #[test]
    fn events_for_day_filters_currencies() {
        let store = SqliteStore::open_in_memory().unwrap();
        for e in [
            make_event("2025-01-10T13:30:00Z", "USD", Impact::High, "Non-Farm Payrolls"),
            make_event("2025-01-10T07:00:00Z", "GBP", Impact::Medium, "GDP m/m"),
            make_event("2025-01-10T10:00:00Z", "EUR", Impact::Low, "Retail Sales"),
        ] {
            store.upsert_event(&e).unwrap();
        }

        let all = events_for_day(&store, test_date(), None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].currency, "GBP");

        let watched = ["usd".to_string(), "eur".to_string()];
        let some = events_for_day(&store, test_date(), Some(&watched)).unwrap();
        let titles: Vec<&str> = some.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Retail Sales", "Non-Farm Payrolls"]);
    }
}
