//! SQLite-backed [`Store`].
//!
//! Structured fields are kept as JSON text. Timestamps are RFC 3339 UTC with
//! second precision so string comparison orders them correctly.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::models::{
    AnalysisSignal, Bias, DailyReport, EconomicEvent, Impact, NewsItem, Snapshot, Stance, Timeframe,
};
use crate::storage::{Store, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ta_signals (
    id               INTEGER PRIMARY KEY,
    date             TEXT    NOT NULL,
    symbol           TEXT    NOT NULL,
    timeframe        TEXT,
    bias             TEXT    NOT NULL,
    confidence       REAL    NOT NULL,
    levels_json      TEXT,
    ict_notes        TEXT,
    turtle_soup_json TEXT,
    trade_plan_json  TEXT,
    created_at       TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_ta_signals_key ON ta_signals (date, symbol);

CREATE TABLE IF NOT EXISTS daily_reports (
    id          INTEGER PRIMARY KEY,
    date        TEXT NOT NULL,
    symbol      TEXT NOT NULL,
    report_json TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_daily_reports_key ON daily_reports (date, symbol);

CREATE TABLE IF NOT EXISTS economic_events (
    id             INTEGER PRIMARY KEY,
    event_time_utc TEXT NOT NULL,
    currency       TEXT NOT NULL,
    impact         TEXT NOT NULL,
    title          TEXT NOT NULL,
    forecast       TEXT,
    previous       TEXT,
    actual         TEXT
);
CREATE INDEX IF NOT EXISTS ix_economic_events_time ON economic_events (event_time_utc);

CREATE TABLE IF NOT EXISTS news_items (
    id           INTEGER PRIMARY KEY,
    published_at TEXT NOT NULL,
    source       TEXT NOT NULL,
    title        TEXT NOT NULL,
    url          TEXT NOT NULL UNIQUE,
    summary      TEXT,
    stance       TEXT,
    confidence   REAL
);

CREATE TABLE IF NOT EXISTS snapshots (
    id          INTEGER PRIMARY KEY,
    symbol      TEXT NOT NULL,
    timeframe   TEXT NOT NULL,
    captured_at TEXT NOT NULL,
    file_path   TEXT NOT NULL
);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(column: &'static str, s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidValue {
            column,
            value: s.to_string(),
        })
}

fn opt_json<T: serde::Serialize>(v: &Option<T>) -> Result<Option<String>, StoreError> {
    v.as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(StoreError::from)
}

fn from_opt_json<T: serde::de::DeserializeOwned>(s: Option<String>) -> Result<Option<T>, StoreError> {
    s.map(|s| serde_json::from_str(&s)).transpose().map_err(StoreError::from)
}

struct SignalRow {
    bias: String,
    confidence: f64,
    levels: Option<String>,
    notes: Option<String>,
    turtle_soup: Option<String>,
    trade_plan: Option<String>,
}

impl SignalRow {
    fn into_signal(self) -> Result<AnalysisSignal, StoreError> {
        Ok(AnalysisSignal {
            bias: Bias::from_str_loose(&self.bias),
            confidence: self.confidence,
            levels: from_opt_json(self.levels)?.unwrap_or_default(),
            notes: self.notes.unwrap_or_default(),
            turtle_soup: from_opt_json(self.turtle_soup)?,
            trade_plan: from_opt_json(self.trade_plan)?,
        })
    }
}

impl Store for SqliteStore {
    fn load_signal(
        &self,
        date: NaiveDate,
        symbol: &str,
        timeframe: Option<Timeframe>,
    ) -> Result<Option<AnalysisSignal>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT bias, confidence, levels_json, ict_notes, turtle_soup_json, trade_plan_json
                 FROM ta_signals
                 WHERE date = ?1 AND symbol = ?2 AND timeframe IS ?3
                 ORDER BY id DESC LIMIT 1",
                params![date.to_string(), symbol, timeframe.map(|tf| tf.as_str())],
                |row| {
                    Ok(SignalRow {
                        bias: row.get(0)?,
                        confidence: row.get(1)?,
                        levels: row.get(2)?,
                        notes: row.get(3)?,
                        turtle_soup: row.get(4)?,
                        trade_plan: row.get(5)?,
                    })
                },
            )
            .optional()?;

        row.map(SignalRow::into_signal).transpose()
    }

    fn replace_signal(
        &self,
        date: NaiveDate,
        symbol: &str,
        timeframe: Option<Timeframe>,
        signal: &AnalysisSignal,
    ) -> Result<(), StoreError> {
        let levels = serde_json::to_string(&signal.levels)?;
        let turtle_soup = opt_json(&signal.turtle_soup)?;
        let trade_plan = opt_json(&signal.trade_plan)?;
        let date = date.to_string();
        let timeframe = timeframe.map(|tf| tf.as_str());

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM ta_signals WHERE date = ?1 AND symbol = ?2 AND timeframe IS ?3",
            params![date, symbol, timeframe],
        )?;
        tx.execute(
            "INSERT INTO ta_signals
                (date, symbol, timeframe, bias, confidence, levels_json, ict_notes,
                 turtle_soup_json, trade_plan_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                date,
                symbol,
                timeframe,
                signal.bias.as_str(),
                signal.confidence,
                levels,
                signal.notes,
                turtle_soup,
                trade_plan,
                ts(Utc::now()),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn load_report(&self, date: NaiveDate, symbol: &str) -> Result<Option<DailyReport>, StoreError> {
        let conn = self.lock()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT report_json FROM daily_reports
                 WHERE date = ?1 AND symbol = ?2
                 ORDER BY id DESC LIMIT 1",
                params![date.to_string(), symbol],
                |row| row.get(0),
            )
            .optional()?;

        from_opt_json(json)
    }

    fn replace_report(
        &self,
        date: NaiveDate,
        symbol: &str,
        report: &DailyReport,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(report)?;
        let date = date.to_string();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM daily_reports WHERE date = ?1 AND symbol = ?2",
            params![date, symbol],
        )?;
        tx.execute(
            "INSERT INTO daily_reports (date, symbol, report_json, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![date, symbol, json, ts(Utc::now())],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn count_reports(&self, date: NaiveDate, symbol: &str) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM daily_reports WHERE date = ?1 AND symbol = ?2",
            params![date.to_string(), symbol],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EconomicEvent>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT event_time_utc, currency, impact, title, forecast, previous, actual
             FROM economic_events
             WHERE event_time_utc >= ?1 AND event_time_utc < ?2
             ORDER BY event_time_utc, id",
        )?;
        let rows = stmt.query_map(params![ts(start), ts(end)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (time, currency, impact, title, forecast, previous, actual) = row?;
            let impact = Impact::from_str_loose(&impact).ok_or(StoreError::InvalidValue {
                column: "economic_events.impact",
                value: impact.clone(),
            })?;
            events.push(EconomicEvent {
                event_time_utc: parse_ts("economic_events.event_time_utc", &time)?,
                currency,
                impact,
                title,
                forecast,
                previous,
                actual,
            });
        }
        Ok(events)
    }

    fn news_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<NewsItem>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT published_at, source, title, url, summary, stance, confidence
             FROM news_items
             WHERE published_at >= ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![ts(cutoff)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<f64>>(6)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (published_at, source, title, url, summary, stance, confidence) = row?;
            items.push(NewsItem {
                published_at: parse_ts("news_items.published_at", &published_at)?,
                source,
                title,
                url,
                summary,
                stance: stance.as_deref().and_then(Stance::from_str_loose),
                confidence,
            });
        }
        Ok(items)
    }

    fn snapshots_between(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT symbol, timeframe, captured_at, file_path
             FROM snapshots
             WHERE symbol = ?1 AND captured_at >= ?2 AND captured_at < ?3
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![symbol, ts(start), ts(end)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut snapshots = Vec::new();
        for row in rows {
            let (symbol, timeframe, captured_at, file_path) = row?;
            let timeframe = Timeframe::from_str_loose(&timeframe).ok_or(StoreError::InvalidValue {
                column: "snapshots.timeframe",
                value: timeframe.clone(),
            })?;
            snapshots.push(Snapshot {
                symbol,
                timeframe,
                captured_at: parse_ts("snapshots.captured_at", &captured_at)?,
                file_path,
            });
        }
        Ok(snapshots)
    }

    fn upsert_event(&self, event: &EconomicEvent) -> Result<bool, StoreError> {
        let time = ts(event.event_time_utc);

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM economic_events
                 WHERE event_time_utc = ?1 AND currency = ?2 AND title = ?3",
                params![time, event.currency, event.title],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE economic_events
                     SET impact = ?1, forecast = ?2, previous = ?3, actual = ?4
                     WHERE id = ?5",
                    params![
                        event.impact.as_str(),
                        event.forecast,
                        event.previous,
                        event.actual,
                        id
                    ],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO economic_events
                        (event_time_utc, currency, impact, title, forecast, previous, actual)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        time,
                        event.currency,
                        event.impact.as_str(),
                        event.title,
                        event.forecast,
                        event.previous,
                        event.actual
                    ],
                )?;
            }
        }
        tx.commit()?;
        Ok(existing.is_none())
    }

    fn upsert_news(&self, item: &NewsItem) -> Result<bool, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let exists = tx
            .query_row(
                "SELECT 1 FROM news_items WHERE url = ?1",
                params![item.url],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        if exists {
            tx.execute(
                "UPDATE news_items
                 SET summary = COALESCE(?1, summary), stance = ?2, confidence = ?3
                 WHERE url = ?4",
                params![
                    item.summary,
                    item.stance.map(|s| s.as_str()),
                    item.confidence,
                    item.url
                ],
            )?;
        } else {
            tx.execute(
                "INSERT INTO news_items
                    (published_at, source, title, url, summary, stance, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    ts(item.published_at),
                    item.source,
                    item.title,
                    item.url,
                    item.summary,
                    item.stance.map(|s| s.as_str()),
                    item.confidence
                ],
            )?;
        }
        tx.commit()?;
        Ok(!exists)
    }

    fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO snapshots (symbol, timeframe, captured_at, file_path)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                snapshot.symbol,
                snapshot.timeframe.as_str(),
                ts(snapshot.captured_at),
                snapshot.file_path
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, TurtleSoup};
    use crate::storage::day_bounds;
    use crate::test_helpers::{make_event, make_news, make_snapshot, test_date, utc};

    #[test]
    fn replace_signal_supersedes_previous() {
        let store = SqliteStore::open_in_memory().unwrap();
        let date = test_date();

        let mut first = AnalysisSignal::default();
        first.bias = Bias::Bullish;
        store.replace_signal(date, "XAUUSD", None, &first).unwrap();

        let mut second = AnalysisSignal::default();
        second.bias = Bias::Bearish;
        second.confidence = 81.0;
        second.turtle_soup = Some(TurtleSoup {
            detected: true,
            direction: Some(Direction::Short),
            entry: Some(2630.0),
            ..Default::default()
        });
        store.replace_signal(date, "XAUUSD", None, &second).unwrap();

        let loaded = store.load_signal(date, "XAUUSD", None).unwrap().unwrap();
        assert_eq!(loaded, second);

        let n: i64 = store
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM ta_signals", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn timeframe_signals_are_separate_from_aggregate() {
        let store = SqliteStore::open_in_memory().unwrap();
        let date = test_date();

        let mut h4 = AnalysisSignal::default();
        h4.bias = Bias::Bullish;
        store.replace_signal(date, "EURUSD", Some(Timeframe::H4), &h4).unwrap();

        assert!(store.load_signal(date, "EURUSD", None).unwrap().is_none());
        assert_eq!(
            store.load_signal(date, "EURUSD", Some(Timeframe::H4)).unwrap().unwrap().bias,
            Bias::Bullish
        );
    }

    #[test]
    fn events_are_filtered_by_day_and_upserted() {
        let store = SqliteStore::open_in_memory().unwrap();
        let nfp = make_event("2025-01-10T13:30:00Z", "USD", Impact::High, "Non-Farm Payrolls");
        assert!(store.upsert_event(&nfp).unwrap());

        let mut revised = nfp.clone();
        revised.actual = Some("256K".to_string());
        assert!(!store.upsert_event(&revised).unwrap());

        store
            .upsert_event(&make_event("2025-01-11T00:30:00Z", "AUD", Impact::Low, "Retail"))
            .unwrap();

        let (start, end) = day_bounds(test_date());
        let events = store.events_between(start, end).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actual.as_deref(), Some("256K"));
        assert_eq!(events[0].event_time_utc, utc("2025-01-10T13:30:00Z"));
    }

    #[test]
    fn news_url_is_unique() {
        let store = SqliteStore::open_in_memory().unwrap();
        let item = make_news("2025-01-10T08:00:00Z", "Fed holds rates", 70.0);
        assert!(store.upsert_news(&item).unwrap());
        assert!(!store.upsert_news(&item).unwrap());

        let items = store.news_since(utc("2025-01-09T00:00:00Z")).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].stance, item.stance);
        assert!(store.news_since(utc("2025-01-10T09:00:00Z")).unwrap().is_empty());
    }

    #[test]
    fn snapshots_by_symbol_and_day() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_snapshot(&make_snapshot("XAUUSD", Timeframe::H1, "2025-01-10T06:00:00Z")).unwrap();
        store.insert_snapshot(&make_snapshot("XAUUSD", Timeframe::D1, "2025-01-09T06:00:00Z")).unwrap();
        store.insert_snapshot(&make_snapshot("EURUSD", Timeframe::H4, "2025-01-10T06:00:00Z")).unwrap();

        let (start, end) = day_bounds(test_date());
        let snaps = store.snapshots_between("XAUUSD", start, end).unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].timeframe, Timeframe::H1);
    }

    #[test]
    fn missing_report_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load_report(test_date(), "XAUUSD").unwrap().is_none());
        assert_eq!(store.count_reports(test_date(), "XAUUSD").unwrap(), 0);
    }
}
