use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{DailyReport, EntryZone, PlanDirection};

#[derive(Serialize)]
struct ExportedReport<'a> {
    date: String,
    symbol: &'a str,
    generated_at: String,
    #[serde(flatten)]
    report: &'a DailyReport,
}

/// Write the report to `{dir}/{date}_{symbol}.json`, overwriting any earlier
/// export for the same key.
pub fn export_report(
    dir: &Path,
    date: NaiveDate,
    symbol: &str,
    report: &DailyReport,
    generated_at: DateTime<Utc>,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(format!("{}_{}.json", date, symbol));

    let exported = ExportedReport {
        date: date.to_string(),
        symbol,
        generated_at: generated_at.to_rfc3339(),
        report,
    };
    let json = serde_json::to_string_pretty(&exported)?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;

    Ok(path)
}

/// Condensed view of a report for terminal display.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub direction: PlanDirection,
    pub confidence: f64,
    pub entry_zone: Option<EntryZone>,
    pub invalidation: Option<f64>,
    pub tp1: Option<f64>,
    pub tp2: Option<f64>,
    pub stand_down_count: usize,
    pub has_turtle_soup: bool,
}

impl ReportSummary {
    pub fn from_report(report: &DailyReport) -> Self {
        Self {
            direction: report.direction,
            confidence: report.confidence,
            entry_zone: report.entry_zone,
            invalidation: report.invalidation,
            tp1: report.tp1,
            tp2: report.tp2,
            stand_down_count: report.stand_down_conditions.len(),
            has_turtle_soup: report.turtle_soup.as_ref().is_some_and(|ts| ts.detected),
        }
    }

    pub fn direction_display(&self) -> &'static str {
        match self.direction {
            PlanDirection::Long => "LONG",
            PlanDirection::Short => "SHORT",
            PlanDirection::NoTrade => "NO TRADE",
        }
    }

    pub fn print(&self, symbol: &str, date: NaiveDate) {
        println!("\n{}", "=".repeat(50));
        println!("  {} {}", symbol, date);
        println!("{}", "=".repeat(50));
        println!("  Direction:   {}", self.direction_display());
        println!("  Confidence:  {:.0}%", self.confidence);
        println!("  Entry:       {}", fmt_entry(self.entry_zone));
        println!("  Invalidate:  {}", fmt_price(self.invalidation));
        println!("  TP1 / TP2:   {} / {}", fmt_price(self.tp1), fmt_price(self.tp2));
        println!("  Stand-downs: {}", self.stand_down_count);
        if self.has_turtle_soup {
            println!("  Turtle soup detected");
        }
    }
}

fn fmt_price(p: Option<f64>) -> String {
    p.map_or_else(|| "-".to_string(), |p| format!("{}", p))
}

fn fmt_entry(zone: Option<EntryZone>) -> String {
    match zone {
        Some(EntryZone::Range { low, high }) => format!("{} - {}", low, high),
        Some(EntryZone::Point { value }) => format!("{}", value),
        None => "-".to_string(),
    }
}
