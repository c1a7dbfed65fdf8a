use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use tracing::debug;

use crate::config::Config;
use crate::core::danger::DangerWindowCalculator;
use crate::core::drivers::{evidence_line, top_drivers};
use crate::models::{
    AnalysisSignal, DailyReport, EconomicEvent, EntryZone, NewsItem, PlanDirection, Timeframe,
};
use crate::storage::{day_bounds, local_day_bounds, Store, StoreError};

const TURTLE_CONTEXT_CHARS: usize = 100;

/// Merges an analysis signal with calendar risk and news drivers into a
/// single [`DailyReport`].
pub struct TradePlanComposer {
    danger: DangerWindowCalculator,
    window_minutes: i64,
    news_recency_hours: i64,
    news_limit: usize,
    strong_bias_confidence: f64,
    missing_timeframe_penalty: f64,
    confidence_floor: f64,
    required_timeframes: BTreeSet<Timeframe>,
    timezone: Tz,
}

impl TradePlanComposer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            danger: DangerWindowCalculator::new(cfg),
            window_minutes: cfg.danger_window_minutes,
            news_recency_hours: cfg.news_recency_hours,
            news_limit: cfg.news_driver_limit,
            strong_bias_confidence: cfg.strong_bias_confidence,
            missing_timeframe_penalty: cfg.missing_timeframe_penalty,
            confidence_floor: cfg.confidence_floor,
            required_timeframes: cfg.required_timeframes.iter().copied().collect(),
            timezone: cfg.timezone,
        }
    }

    /// Pure composition. `now` anchors the news recency window.
    pub fn compose(
        &self,
        signal: &AnalysisSignal,
        events: &[EconomicEvent],
        news: &[NewsItem],
        timeframes_present: &BTreeSet<Timeframe>,
        required_timeframes: &BTreeSet<Timeframe>,
        now: DateTime<Utc>,
    ) -> DailyReport {
        let mut report = DailyReport {
            direction: PlanDirection::NoTrade,
            entry_zone: None,
            invalidation: None,
            tp1: None,
            tp2: None,
            stand_down_conditions: Vec::new(),
            supporting_evidence: Vec::new(),
            missing_data: Vec::new(),
            confidence: signal.confidence,
            bias: signal.bias,
            notes: signal.notes.clone(),
            levels: signal.levels.clone(),
            turtle_soup: signal.turtle_soup.clone(),
            primary_snapshot: None,
        };

        self.select_direction(signal, &mut report);

        for window in self.danger.windows(events, self.window_minutes) {
            report.stand_down_conditions.push(window.stand_down_condition());
        }

        for item in top_drivers(news, now, self.news_recency_hours, self.news_limit) {
            report.supporting_evidence.push(evidence_line(&item));
        }

        self.apply_missing_data_penalty(&mut report, timeframes_present, required_timeframes);

        report
    }

    /// Trade plan, then turtle soup, then strong bias. First match wins.
    fn select_direction(&self, signal: &AnalysisSignal, report: &mut DailyReport) {
        let plan = signal
            .trade_plan
            .as_ref()
            .and_then(|p| p.direction.and_then(PlanDirection::to_direction).map(|d| (p, d)));

        if let Some((plan, direction)) = plan {
            report.direction = direction.into();
            report.entry_zone = plan.entry_zone;
            report.invalidation = plan.invalidation;
            report.tp1 = plan.tp1;
            report.tp2 = plan.tp2;
            report.stand_down_conditions = plan.stand_down_if.clone();
            report.supporting_evidence.push(format!(
                "Trade plan: {} with {} bias at {:.0}% confidence",
                direction.as_str().to_uppercase(),
                signal.bias,
                signal.confidence
            ));

            if let Some(ts) = signal.turtle_soup.as_ref().filter(|ts| ts.detected) {
                let desc: String = ts.description.chars().take(TURTLE_CONTEXT_CHARS).collect();
                report.supporting_evidence.push(format!(
                    "Turtle Soup {} setup also detected (counter-trend scalp): {}...",
                    ts.direction.map_or("none", |d| d.as_str()),
                    if desc.is_empty() { "N/A".to_string() } else { desc }
                ));
            }
            return;
        }

        let turtle = signal
            .turtle_soup
            .as_ref()
            .filter(|ts| ts.detected)
            .and_then(|ts| ts.direction.map(|d| (ts, d)));

        if let Some((ts, direction)) = turtle {
            report.direction = direction.into();
            report.entry_zone = ts.entry.map(|value| EntryZone::Point { value });
            report.invalidation = ts.invalidation;
            report.tp1 = ts.tp1;
            report.tp2 = ts.tp2;
            report.supporting_evidence.push(format!(
                "Turtle Soup {} setup detected: {}",
                direction,
                if ts.description.is_empty() { "N/A" } else { ts.description.as_str() }
            ));
            return;
        }

        if signal.confidence >= self.strong_bias_confidence {
            if let Some(direction) = signal.bias.to_direction() {
                report.direction = direction.into();
                report.supporting_evidence.push(format!(
                    "Strong {} bias ({:.0}% confidence)",
                    signal.bias, signal.confidence
                ));
            }
        }
    }

    fn apply_missing_data_penalty(
        &self,
        report: &mut DailyReport,
        present: &BTreeSet<Timeframe>,
        required: &BTreeSet<Timeframe>,
    ) {
        let mut missing: Vec<&str> = required.difference(present).map(|tf| tf.as_str()).collect();
        if missing.is_empty() {
            return;
        }
        missing.sort_unstable();

        report
            .missing_data
            .push(format!("Missing timeframes: {}", missing.join(", ")));
        report.confidence = (report.confidence
            - self.missing_timeframe_penalty * missing.len() as f64)
            .max(self.confidence_floor);
    }

    /// Build and persist the report for (date, symbol) from stored state.
    ///
    /// Returns `Ok(None)` when no aggregate signal exists for the key yet.
    pub fn compose_and_store<S: Store + ?Sized>(
        &self,
        store: &S,
        date: NaiveDate,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DailyReport>, StoreError> {
        let Some(signal) = store.load_signal(date, symbol, None)? else {
            debug!("No signal for {} on {}", symbol, date);
            return Ok(None);
        };

        let (day_start, day_end) = day_bounds(date);
        let events = store.events_between(day_start, day_end)?;
        // Charts are captured on the local trading day.
        let (local_start, local_end) = local_day_bounds(date, self.timezone);
        let news = store.news_since(now - Duration::hours(self.news_recency_hours))?;
        let snapshots = store.snapshots_between(symbol, local_start, local_end)?;

        let present: BTreeSet<Timeframe> = snapshots.iter().map(|s| s.timeframe).collect();

        let mut report = self.compose(
            &signal,
            &events,
            &news,
            &present,
            &self.required_timeframes,
            now,
        );
        report.primary_snapshot = snapshots
            .iter()
            .find(|s| s.timeframe.is_primary_candidate())
            .map(|s| s.file_path.clone());

        store.replace_report(date, symbol, &report)?;
        Ok(Some(report))
    }
}
