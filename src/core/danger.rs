use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::models::{EconomicEvent, Impact};

#[derive(Debug, Clone, PartialEq)]
pub struct DangerWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub event: EconomicEvent,
}

impl DangerWindow {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }

    /// Stand-down line used in composed reports.
    pub fn stand_down_condition(&self) -> String {
        format!(
            "High-impact event: {} ({}) - avoid trading {}-{} UTC",
            self.event.title,
            self.event.currency,
            self.start.format("%H:%M"),
            self.end.format("%H:%M"),
        )
    }
}

/// Builds risk windows around high-impact releases. Overlapping windows are
/// kept as-is, one per event.
pub struct DangerWindowCalculator {
    currencies: Vec<String>,
}

impl DangerWindowCalculator {
    pub fn new(cfg: &Config) -> Self {
        Self::with_currencies(&cfg.danger_currencies)
    }

    pub fn with_currencies(currencies: &[String]) -> Self {
        Self {
            currencies: currencies.iter().map(|c| c.to_uppercase()).collect(),
        }
    }

    pub fn windows(&self, events: &[EconomicEvent], window_minutes: i64) -> Vec<DangerWindow> {
        let delta = Duration::minutes(window_minutes);

        events
            .iter()
            .filter(|e| e.impact == Impact::High)
            .filter(|e| self.currencies.iter().any(|c| c.eq_ignore_ascii_case(&e.currency)))
            .map(|e| DangerWindow {
                start: e.event_time_utc - delta,
                end: e.event_time_utc + delta,
                event: e.clone(),
            })
            .collect()
    }
}
