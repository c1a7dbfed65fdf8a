use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::Timeframe;

pub const WATCH_FILE: &str = "latest.json";

#[derive(Debug, Clone)]
pub struct Config {
    // Paths
    pub data_dir: PathBuf,
    pub responses_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub db_path: PathBuf,

    // Trading day is reckoned in this zone
    pub timezone: Tz,

    // Symbols accepted from analysis payloads
    pub symbols: Vec<String>,
    pub required_timeframes: Vec<Timeframe>,

    // Calendar risk
    pub danger_window_minutes: i64,
    pub danger_currencies: Vec<String>,

    // News drivers
    pub news_recency_hours: i64,
    pub news_driver_limit: usize,

    // Composer
    pub strong_bias_confidence: f64,
    pub missing_timeframe_penalty: f64,
    pub confidence_floor: f64,

    // Watcher
    pub poll_interval: Duration,
    pub watch_timeout: Duration,

    // Logging
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        let list = |key: &str, default: &str| -> Vec<String> {
            env(key, default)
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect()
        };

        let data_dir = PathBuf::from(env("DATA_DIR", "./data"));

        let timezone = env("TIMEZONE", "America/New_York")
            .parse::<Tz>()
            .unwrap_or(chrono_tz::America::New_York);

        let mut required_timeframes: Vec<Timeframe> = list("REQUIRED_TIMEFRAMES", "1W,1D,4H,1H")
            .iter()
            .filter_map(|s| Timeframe::from_str_loose(s))
            .collect();
        required_timeframes.sort();
        required_timeframes.dedup();

        Config {
            responses_dir: data_dir.join("responses"),
            reports_dir: data_dir.join("reports"),
            db_path: data_dir.join("advisor.db"),
            data_dir,
            timezone,
            symbols: list("SYMBOLS", "XAUUSD,EURUSD"),
            required_timeframes,
            danger_window_minutes: bounded(&env("DANGER_WINDOW_MINUTES", "30"), 30, 0, 24 * 60),
            danger_currencies: list("DANGER_CURRENCIES", "USD,EUR"),
            news_recency_hours: bounded(&env("NEWS_RECENCY_HOURS", "48"), 48, 1, 24 * 365),
            news_driver_limit: env("NEWS_DRIVER_LIMIT", "3").parse().unwrap_or(3),
            strong_bias_confidence: 70.0,
            missing_timeframe_penalty: 10.0,
            confidence_floor: 30.0,
            poll_interval: Duration::from_secs(env("POLL_INTERVAL_SECS", "2").parse().unwrap_or(2)),
            watch_timeout: Duration::from_secs(
                env("WATCH_TIMEOUT_SECS", "600").parse().unwrap_or(600),
            ),
            log_level: env("LOG_LEVEL", "info"),
        }
    }

    pub fn watch_file(&self) -> PathBuf {
        self.responses_dir.join(WATCH_FILE)
    }

    pub fn is_known_symbol(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.data_dir, &self.responses_dir, &self.reports_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Parse with fallback, clamped to `[min, max]`.
fn bounded(raw: &str, default: i64, min: i64, max: i64) -> i64 {
    raw.trim().parse::<i64>().unwrap_or(default).clamp(min, max)
}
