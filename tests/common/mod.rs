use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use ict_daily_advisor::config::Config;
use ict_daily_advisor::ingest::Clock;
use ict_daily_advisor::models::{
    EconomicEvent, Impact, NewsItem, Snapshot, Stance, Timeframe,
};

pub fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// Config rooted at `dir`, directories created.
pub fn test_config(dir: &Path) -> Config {
    let data_dir = dir.to_path_buf();
    let cfg = Config {
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
        watch_timeout: Duration::from_secs(20),
        log_level: "debug".into(),
    };
    cfg.ensure_dirs().unwrap();
    cfg
}

pub fn event(time: &str, currency: &str, impact: Impact, title: &str) -> EconomicEvent {
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

pub fn news(time: &str, title: &str, stance: Stance, confidence: f64) -> NewsItem {
    NewsItem {
        published_at: utc(time),
        source: "Federal Reserve".to_string(),
        title: title.to_string(),
        url: format!("https://example.com/{}", title.len()),
        summary: None,
        stance: Some(stance),
        confidence: Some(confidence),
    }
}

pub fn snapshot(symbol: &str, timeframe: Timeframe, time: &str) -> Snapshot {
    Snapshot {
        symbol: symbol.to_string(),
        timeframe,
        captured_at: utc(time),
        file_path: format!("snapshots/{}_{}.png", symbol, timeframe),
    }
}

type SleepHook = Box<dyn Fn(usize) + Send + Sync>;

/// Clock whose `sleep` advances `now` instantly and can run a hook, which
/// lets a test drop a file "while" the watcher waits.
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<usize>,
    on_sleep: Option<SleepHook>,
}

impl FakeClock {
    pub fn at(s: &str) -> Self {
        Self {
            now: Mutex::new(utc(s)),
            sleeps: Mutex::new(0),
            on_sleep: None,
        }
    }

    /// `hook` receives the 1-based sleep count.
    pub fn with_hook(s: &str, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        Self {
            on_sleep: Some(Box::new(hook)),
            ..Self::at(s)
        }
    }

    pub fn sleeps(&self) -> usize {
        *self.sleeps.lock().unwrap()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, d: Duration) {
        *self.now.lock().unwrap() += chrono::Duration::from_std(d).unwrap();
        let n = {
            let mut sleeps = self.sleeps.lock().unwrap();
            *sleeps += 1;
            *sleeps
        };
        if let Some(hook) = &self.on_sleep {
            hook(n);
        }
    }
}
