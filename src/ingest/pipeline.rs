use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::normalize;
use crate::ingest::clock::Clock;
use crate::ingest::payload::ResponsePayload;
use crate::ingest::watcher::ResponseHandler;
use crate::models::DailyReport;
use crate::report::{export_report, TradePlanComposer};
use crate::storage::Store;

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    /// Signal stored and a report composed.
    Reported,
    /// Signal stored, report composition failed.
    ReportFailed(String),
    /// Symbol is not in the configured set.
    Skipped,
    /// Signal could not be stored.
    Failed(String),
}

impl SymbolOutcome {
    pub fn stored(&self) -> bool {
        matches!(self, SymbolOutcome::Reported | SymbolOutcome::ReportFailed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolResult {
    pub symbol: String,
    pub outcome: SymbolOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    pub date: NaiveDate,
    pub results: Vec<SymbolResult>,
}

impl IngestSummary {
    pub fn stored_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.stored()).count()
    }

    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.results
            .iter()
            .find(|r| r.symbol == symbol)
            .map(|r| &r.outcome)
    }
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.date)?;
        for r in &self.results {
            write!(f, " {}={:?}", r.symbol, r.outcome)?;
        }
        Ok(())
    }
}

/// Stores each symbol's signal and composes its report. Both payload shapes
/// go through the same per-symbol path.
pub struct Ingestor<'a, S: Store + ?Sized> {
    store: &'a S,
    cfg: &'a Config,
    composer: TradePlanComposer,
    clock: Arc<dyn Clock>,
}

impl<'a, S: Store + ?Sized> Ingestor<'a, S> {
    pub fn new(store: &'a S, cfg: &'a Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            cfg,
            composer: TradePlanComposer::new(cfg),
            clock,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today(self.cfg.timezone)
    }

    pub fn ingest(&self, payload: &ResponsePayload) -> IngestSummary {
        self.ingest_for_date(payload, self.today())
    }

    pub fn ingest_for_date(&self, payload: &ResponsePayload, date: NaiveDate) -> IngestSummary {
        if let Some(ctx) = payload.market_context() {
            info!("Market context: {}", ctx);
        }
        if let Some(impact) = payload.news_impact() {
            info!("News impact: {}", impact);
        }

        let results = payload
            .records()
            .into_iter()
            .map(|(symbol, record)| SymbolResult {
                symbol: symbol.to_string(),
                outcome: self.process_symbol(date, symbol, record),
            })
            .collect();

        IngestSummary { date, results }
    }

    fn process_symbol(&self, date: NaiveDate, symbol: &str, record: &Value) -> SymbolOutcome {
        if !self.cfg.is_known_symbol(symbol) {
            warn!("Skipping unknown symbol: {}", symbol);
            return SymbolOutcome::Skipped;
        }

        let signal = normalize(record);
        if let Err(e) = self.store.replace_signal(date, symbol, None, &signal) {
            error!("Failed to store {} signal: {}", symbol, e);
            return SymbolOutcome::Failed(e.to_string());
        }
        info!(
            "Stored signal for {}: {} ({:.0}%)",
            symbol, signal.bias, signal.confidence
        );

        match self.compose_symbol(date, symbol) {
            Ok(Some(_)) => SymbolOutcome::Reported,
            Ok(None) => SymbolOutcome::ReportFailed("signal not found after store".to_string()),
            Err(e) => {
                error!("Error generating report for {}: {:#}", symbol, e);
                SymbolOutcome::ReportFailed(format!("{:#}", e))
            }
        }
    }

    /// Compose, persist, and export the report for one symbol.
    pub fn compose_symbol(&self, date: NaiveDate, symbol: &str) -> Result<Option<DailyReport>> {
        let now = self.clock.now();
        let Some(report) = self.composer.compose_and_store(self.store, date, symbol, now)? else {
            warn!("Could not generate report for {}: no signal for {}", symbol, date);
            return Ok(None);
        };

        let path = export_report(&self.cfg.reports_dir, date, symbol, &report, now)?;
        info!(
            "Generated report for {}: {} ({:.0}%) -> {}",
            symbol,
            report.direction,
            report.confidence,
            path.display()
        );
        Ok(Some(report))
    }

    /// Re-compose reports for every configured symbol. One symbol's failure
    /// does not stop the rest.
    pub fn compose_all(&self, date: NaiveDate) -> Vec<(String, Result<Option<DailyReport>>)> {
        self.cfg
            .symbols
            .iter()
            .map(|symbol| (symbol.clone(), self.compose_symbol(date, symbol)))
            .collect()
    }
}

impl<S: Store + ?Sized> ResponseHandler for Ingestor<'_, S> {
    type Output = IngestSummary;

    fn handle(&mut self, payload: ResponsePayload) -> Result<IngestSummary> {
        let summary = self.ingest(&payload);
        if summary.stored_count() == 0 {
            bail!("no signal stored from response ({})", summary);
        }
        Ok(summary)
    }
}
