use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use ict_daily_advisor::config::Config;
use ict_daily_advisor::core::{DangerWindowCalculator, StanceClassifier};
use ict_daily_advisor::ingest::{
    clear_pending_response, extract_json, submit_response, Clock, Ingestor, ResponsePayload,
    ResponseWatcher, SystemClock, WatchOutcome,
};
use ict_daily_advisor::models::{EconomicEvent, NewsItem, Snapshot};
use ict_daily_advisor::report::ReportSummary;
use ict_daily_advisor::storage::{events_for_day, SqliteStore, Store};

#[derive(Parser)]
#[command(
    name = "ict-advisor",
    about = "Daily ICT trade plans from analysis responses, calendar risk and news"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for a response file, ingest it, and archive it.
    Watch {
        /// Seconds to wait before giving up. Defaults to WATCH_TIMEOUT_SECS.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Ingest a response file directly, without the watcher.
    Ingest { file: PathBuf },
    /// Copy a response into the watched location.
    Submit { file: PathBuf },
    /// Remove an unprocessed response from the watched location.
    Clear,
    /// Recompose reports from stored signals.
    Compose {
        #[arg(long)]
        symbol: Option<String>,
        /// Trading date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,
    },
    /// Print a stored report.
    Show {
        symbol: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// List the day's calendar with danger windows.
    Calendar {
        #[arg(long)]
        date: Option<String>,
        /// Show every currency, not only the watched ones.
        #[arg(long, default_value_t = false)]
        all: bool,
    },
    /// Load economic events from a JSON array.
    ImportEvents { file: PathBuf },
    /// Load news items from a JSON array. Items without a stance are classified.
    ImportNews { file: PathBuf },
    /// Register chart snapshots from a JSON array.
    ImportSnapshots { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = Config::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    cfg.ensure_dirs().context("creating data directories")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Commands::Watch { timeout } => {
            if let Some(secs) = timeout {
                cfg.watch_timeout = Duration::from_secs(secs);
            }
            run_watch(&cfg, clock).await
        }
        Commands::Ingest { file } => run_ingest(&cfg, clock, &file),
        Commands::Submit { file } => {
            let text = read(&file)?;
            let value: serde_json::Value = serde_json::from_str(extract_json(&text)?)?;
            let path = submit_response(&cfg.watch_file(), &value)?;
            println!("Response written to {}", path.display());
            Ok(())
        }
        Commands::Clear => {
            if clear_pending_response(&cfg.watch_file())? {
                println!("Cleared pending response");
            } else {
                println!("No pending response");
            }
            Ok(())
        }
        Commands::Compose { symbol, date } => run_compose(&cfg, clock, symbol, date),
        Commands::Show { symbol, date } => run_show(&cfg, clock.as_ref(), &symbol, date),
        Commands::Calendar { date, all } => run_calendar(&cfg, clock.as_ref(), date, all),
        Commands::ImportEvents { file } => {
            let store = SqliteStore::open(&cfg.db_path)?;
            let events: Vec<EconomicEvent> = read_json(&file)?;
            let mut inserted = 0;
            for event in &events {
                if store.upsert_event(event)? {
                    inserted += 1;
                }
            }
            println!(
                "{} events ({} new, {} updated)",
                events.len(),
                inserted,
                events.len() - inserted
            );
            Ok(())
        }
        Commands::ImportNews { file } => {
            let store = SqliteStore::open(&cfg.db_path)?;
            let classifier = StanceClassifier::default();
            let items: Vec<NewsItem> = read_json(&file)?;
            let mut inserted = 0;
            let mut categories: BTreeMap<&'static str, usize> = BTreeMap::new();
            for mut item in items {
                *categories
                    .entry(classifier.categorize(&item.title).as_str())
                    .or_default() += 1;
                if item.stance.is_none() {
                    let text = format!("{} {}", item.title, item.summary.as_deref().unwrap_or(""));
                    let (stance, confidence) = classifier.classify(&text);
                    item.stance = Some(stance);
                    if item.confidence.is_none() {
                        item.confidence = Some(confidence);
                    }
                }
                if store.upsert_news(&item)? {
                    inserted += 1;
                }
            }
            println!("{} new news items", inserted);
            for (category, n) in &categories {
                println!("  {:<14} {}", category, n);
            }
            Ok(())
        }
        Commands::ImportSnapshots { file } => {
            let store = SqliteStore::open(&cfg.db_path)?;
            let snapshots: Vec<Snapshot> = read_json(&file)?;
            for snapshot in &snapshots {
                store.insert_snapshot(snapshot)?;
            }
            println!("{} snapshots registered", snapshots.len());
            Ok(())
        }
    }
}

async fn run_watch(cfg: &Config, clock: Arc<dyn Clock>) -> Result<()> {
    let store = SqliteStore::open(&cfg.db_path)?;
    let mut ingestor = Ingestor::new(&store, cfg, clock.clone());
    let mut watcher = ResponseWatcher::new(cfg, clock);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, pending response left in place");
            Ok(())
        }
        outcome = watcher.run(&mut ingestor) => {
            match outcome? {
                WatchOutcome::Processed(processed) => {
                    let summary = processed.output;
                    info!("Processed response: {}", summary);
                    print_reports(&store, summary.date, summary.results.iter().map(|r| r.symbol.as_str()))?;
                    Ok(())
                }
                WatchOutcome::TimedOut => bail!("no response received within {}s", cfg.watch_timeout.as_secs()),
            }
        }
    }
}

fn run_ingest(cfg: &Config, clock: Arc<dyn Clock>, file: &Path) -> Result<()> {
    let store = SqliteStore::open(&cfg.db_path)?;
    let payload = ResponsePayload::parse(&read(file)?)?;
    let ingestor = Ingestor::new(&store, cfg, clock);

    let summary = ingestor.ingest(&payload);
    if summary.stored_count() == 0 {
        bail!("no signal stored: {}", summary);
    }
    print_reports(&store, summary.date, summary.results.iter().map(|r| r.symbol.as_str()))
}

fn run_compose(
    cfg: &Config,
    clock: Arc<dyn Clock>,
    symbol: Option<String>,
    date: Option<String>,
) -> Result<()> {
    let store = SqliteStore::open(&cfg.db_path)?;
    let date = resolve_date(date, cfg, clock.as_ref())?;
    let ingestor = Ingestor::new(&store, cfg, clock);

    let results = match symbol {
        Some(s) => {
            let s = s.to_uppercase();
            let report = ingestor.compose_symbol(date, &s);
            vec![(s, report)]
        }
        None => ingestor.compose_all(date),
    };

    for (symbol, result) in results {
        match result {
            Ok(Some(report)) => ReportSummary::from_report(&report).print(&symbol, date),
            Ok(None) => println!("{}: no signal for {}", symbol, date),
            Err(e) => println!("{}: failed: {:#}", symbol, e),
        }
    }
    Ok(())
}

fn run_show(cfg: &Config, clock: &dyn Clock, symbol: &str, date: Option<String>) -> Result<()> {
    let store = SqliteStore::open(&cfg.db_path)?;
    let date = resolve_date(date, cfg, clock)?;
    let symbol = symbol.to_uppercase();

    let Some(report) = store.load_report(date, &symbol)? else {
        bail!("no report for {} on {}", symbol, date);
    };
    ReportSummary::from_report(&report).print(&symbol, date);

    for (title, lines) in [
        ("Stand down if", &report.stand_down_conditions),
        ("Evidence", &report.supporting_evidence),
        ("Missing", &report.missing_data),
    ] {
        if !lines.is_empty() {
            println!("\n  {}:", title);
            for line in lines {
                println!("    - {}", line);
            }
        }
    }
    if let Some(path) = &report.primary_snapshot {
        println!("\n  Chart: {}", path);
    }
    Ok(())
}

fn run_calendar(cfg: &Config, clock: &dyn Clock, date: Option<String>, all: bool) -> Result<()> {
    let store = SqliteStore::open(&cfg.db_path)?;
    let date = resolve_date(date, cfg, clock)?;
    let currencies = (!all).then_some(cfg.danger_currencies.as_slice());
    let events = events_for_day(&store, date, currencies)?;

    println!("\n{}", "=".repeat(60));
    println!("  Economic calendar {}", date);
    println!("{}", "=".repeat(60));
    if events.is_empty() {
        println!("  No events");
        return Ok(());
    }
    for e in &events {
        println!(
            "  {} UTC  {:<4} {:<7} {}",
            e.event_time_utc.format("%H:%M"),
            e.currency,
            e.impact,
            e.title
        );
    }

    let windows = DangerWindowCalculator::new(cfg).windows(&events, cfg.danger_window_minutes);
    if !windows.is_empty() {
        println!("\n  Danger windows:");
        let now = clock.now();
        for w in &windows {
            let active = if w.contains(now) { "  <- now" } else { "" };
            println!("    {}{}", w.stand_down_condition(), active);
        }
    }
    Ok(())
}

fn print_reports<'a>(
    store: &dyn Store,
    date: NaiveDate,
    symbols: impl Iterator<Item = &'a str>,
) -> Result<()> {
    for symbol in symbols {
        if let Some(report) = store.load_report(date, symbol)? {
            ReportSummary::from_report(&report).print(symbol, date);
        }
    }
    Ok(())
}

fn resolve_date(date: Option<String>, cfg: &Config, clock: &dyn Clock) -> Result<NaiveDate> {
    match date {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", s)),
        None => Ok(clock.today(cfg.timezone)),
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    serde_json::from_str(&read(path)?).with_context(|| format!("parsing {}", path.display()))
}
