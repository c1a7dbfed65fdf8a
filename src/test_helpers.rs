use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

use crate::config::Config;
use crate::ingest::Clock;
use crate::models::{EconomicEvent, Impact, NewsItem, Snapshot, Stance, Timeframe};

pub fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
}

pub fn default_test_config() -> Config {
    config_in(PathBuf::from("/tmp/ict-daily-advisor-test"))
}

/// Config rooted in a fresh temp dir with its directories created.
pub fn scratch_config() -> (TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path().to_path_buf());
    cfg.ensure_dirs().unwrap();
    (dir, cfg)
}

fn config_in(data_dir: PathBuf) -> Config {
    Config {
        responses_dir: data_dir.join("responses"),
        reports_dir: data_dir.join("reports"),
        db_path: data_dir.join("advisor.db"),
        data_dir,
        timezone: chrono_tz::America::New_York,
        symbols: vec!["XAUUSD".into(), "EURUSD".into()],
        required_timeframes: vec![Timeframe::W1, Timeframe::D1, Timeframe::H4, Timeframe::H1],
        danger_window_minutes: 30,
        danger_currencies: vec!["USD".into(), "EUR".into()],
        news_recency_hours: 48,
        news_driver_limit: 3,
        strong_bias_confidence: 70.0,
        missing_timeframe_penalty: 10.0,
        confidence_floor: 30.0,
        poll_interval: Duration::from_secs(2),
        watch_timeout: Duration::from_secs(10),
        log_level: "debug".into(),
    }
}

pub fn make_event(time: &str, currency: &str, impact: Impact, title: &str) -> EconomicEvent {
    EconomicEvent {
        event_time_utc: utc(time),
        currency: currency.to_string(),
        impact,
        title: title.to_string(),
        forecast: None,
        previous: None,
        actual: None,
    }
}

pub fn make_news(time: &str, title: &str, confidence: f64) -> NewsItem {
    let slug: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    NewsItem {
        published_at: utc(time),
        source: "Federal Reserve".to_string(),
        title: title.to_string(),
        url: format!("https://example.com/news/{}", slug),
        summary: None,
        stance: Some(Stance::Hawkish),
        confidence: Some(confidence),
    }
}

pub fn make_snapshot(symbol: &str, timeframe: Timeframe, time: &str) -> Snapshot {
    Snapshot {
        symbol: symbol.to_string(),
        timeframe,
        captured_at: utc(time),
        file_path: format!("snapshots/{}_{}.png", symbol, timeframe),
    }
}

/// Clock whose `sleep` advances `now` instantly.
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
}

impl FakeClock {
    pub fn at(s: &str) -> Self {
        Self {
            now: Mutex::new(utc(s)),
        }
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, d: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(d).unwrap();
    }
}
