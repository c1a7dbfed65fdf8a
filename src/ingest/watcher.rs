use anyhow::Context;
use chrono_tz::Tz;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::ingest::clock::Clock;
use crate::ingest::payload::ResponsePayload;

const PROGRESS_EVERY: Duration = Duration::from_secs(30);

/// Consumes a parsed response. The watcher archives the file only when this
/// returns `Ok`.
pub trait ResponseHandler {
    type Output;

    fn handle(&mut self, payload: ResponsePayload) -> anyhow::Result<Self::Output>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Waiting,
    Found,
    Processing,
    Archived,
    TimedOut,
}

#[derive(Debug)]
pub struct Processed<T> {
    pub archived_to: PathBuf,
    pub output: T,
}

#[derive(Debug)]
pub enum WatchOutcome<T> {
    Processed(Processed<T>),
    /// No new response before the deadline.
    TimedOut,
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("processing failed: {0:#}")]
    Processing(anyhow::Error),
}

pub struct ResponseWatcher {
    path: PathBuf,
    poll_interval: Duration,
    timeout: Duration,
    timezone: Tz,
    clock: Arc<dyn Clock>,
    last_seen: Option<SystemTime>,
    state: WatchState,
}

impl ResponseWatcher {
    pub fn new(cfg: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::with_path(cfg.watch_file(), cfg, clock)
    }

    /// A file already present at construction counts as seen.
    pub fn with_path(path: PathBuf, cfg: &Config, clock: Arc<dyn Clock>) -> Self {
        let last_seen = fs::metadata(&path).and_then(|m| m.modified()).ok();
        Self {
            path,
            poll_interval: cfg.poll_interval,
            timeout: cfg.watch_timeout,
            timezone: cfg.timezone,
            clock,
            last_seen,
            state: WatchState::Idle,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// One poll. Returns `Some` once a new response has been handled and
    /// archived. Unparseable content is left in place.
    pub fn tick<H: ResponseHandler>(
        &mut self,
        handler: &mut H,
    ) -> Result<Option<Processed<H::Output>>, WatchError> {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(WatchError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if self.last_seen.is_some_and(|seen| modified <= seen) {
            return Ok(None);
        }

        self.state = WatchState::Found;
        info!("Found new response: {}", self.path.display());

        let payload = match fs::read_to_string(&self.path)
            .context("reading response")
            .and_then(|text| ResponsePayload::parse(&text).context("parsing response"))
        {
            Ok(p) => p,
            Err(e) => {
                warn!("Ignoring response at {}: {:#}", self.path.display(), e);
                self.state = WatchState::Waiting;
                return Ok(None);
            }
        };

        self.state = WatchState::Processing;
        let output = handler.handle(payload).map_err(|e| {
            self.state = WatchState::Waiting;
            WatchError::Processing(e)
        })?;

        let archived_to = self.archive()?;
        // The path is empty after archiving; anything written there next is new.
        self.last_seen = None;
        self.state = WatchState::Archived;
        info!("Archived response to {}", archived_to.display());

        Ok(Some(Processed {
            archived_to,
            output,
        }))
    }

    /// Poll until a response is processed or the timeout elapses.
    pub async fn run<H: ResponseHandler>(
        &mut self,
        handler: &mut H,
    ) -> Result<WatchOutcome<H::Output>, WatchError> {
        let started = self.clock.now();
        let mut last_progress = Duration::ZERO;
        self.state = WatchState::Waiting;
        info!(
            "Watching {} (timeout {}s)",
            self.path.display(),
            self.timeout.as_secs()
        );

        loop {
            if let Some(processed) = self.tick(handler)? {
                return Ok(WatchOutcome::Processed(processed));
            }

            let elapsed = (self.clock.now() - started).to_std().unwrap_or_default();
            if elapsed >= self.timeout {
                self.state = WatchState::TimedOut;
                info!("No response after {}s", elapsed.as_secs());
                return Ok(WatchOutcome::TimedOut);
            }
            if elapsed >= last_progress + PROGRESS_EVERY {
                last_progress = elapsed;
                info!("Still waiting for response... {}s elapsed", elapsed.as_secs());
            }

            self.clock.sleep(self.poll_interval).await;
        }
    }

    fn archive(&self) -> Result<PathBuf, WatchError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let now = self.clock.now().with_timezone(&self.timezone);
        let stem = format!("{}_{}", now.format("%Y-%m-%d"), now.format("%H%M%S"));

        let mut target = dir.join(format!("{}_response.json", stem));
        let mut n = 1;
        while target.exists() {
            target = dir.join(format!("{}_{}_response.json", stem, n));
            n += 1;
        }

        fs::rename(&self.path, &target).map_err(|source| WatchError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!("Renamed {} -> {}", self.path.display(), target.display());
        Ok(target)
    }
}

/// Write a response for the watcher to pick up.
pub fn submit_response(path: &Path, response: &Value) -> anyhow::Result<PathBuf> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(response)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path.to_path_buf())
}

/// Remove an unprocessed response. Returns false if there was none.
pub fn clear_pending_response(path: &Path) -> anyhow::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{scratch_config, FakeClock};
    use serde_json::json;

    /// Records the symbols it was handed.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
        fail: bool,
    }

    impl ResponseHandler for Recorder {
        type Output = usize;

        fn handle(&mut self, payload: ResponsePayload) -> anyhow::Result<usize> {
            if self.fail {
                anyhow::bail!("store unavailable");
            }
            let n = payload.records().len();
            self.seen
                .extend(payload.records().into_iter().map(|(s, _)| s.to_string()));
            Ok(n)
        }
    }

    #[test]
    fn tick_archives_then_finds_nothing() {
        let (_dir, cfg) = scratch_config();
        let clock = Arc::new(FakeClock::at("2025-01-10T14:05:09Z"));
        let mut watcher = ResponseWatcher::new(&cfg, clock);
        let mut handler = Recorder::default();

        assert!(watcher.tick(&mut handler).unwrap().is_none());

        submit_response(
            &cfg.watch_file(),
            &json!({"symbol": "XAUUSD", "bias": "bullish", "confidence": 70}),
        )
        .unwrap();

        let processed = watcher.tick(&mut handler).unwrap().unwrap();
        assert_eq!(processed.output, 1);
        assert_eq!(watcher.state(), WatchState::Archived);
        // 14:05:09 UTC is 09:05:09 in New York
        assert!(processed
            .archived_to
            .ends_with("2025-01-10_090509_response.json"));
        assert!(processed.archived_to.exists());
        assert!(!cfg.watch_file().exists());

        assert!(watcher.tick(&mut handler).unwrap().is_none());
        assert_eq!(handler.seen, vec!["XAUUSD"]);
    }

    #[test]
    fn archive_name_collision_gets_suffix() {
        let (_dir, cfg) = scratch_config();
        let clock = Arc::new(FakeClock::at("2025-01-10T14:05:09Z"));
        let mut watcher = ResponseWatcher::new(&cfg, clock);
        let mut handler = Recorder::default();
        let body = json!({"symbol": "EURUSD", "bias": "bearish"});

        submit_response(&cfg.watch_file(), &body).unwrap();
        let first = watcher.tick(&mut handler).unwrap().unwrap();
        submit_response(&cfg.watch_file(), &body).unwrap();
        let second = watcher.tick(&mut handler).unwrap().unwrap();

        assert_ne!(first.archived_to, second.archived_to);
        assert!(second
            .archived_to
            .ends_with("2025-01-10_090509_1_response.json"));
    }

    #[test]
    fn invalid_content_stays_in_place() {
        let (_dir, cfg) = scratch_config();
        let clock = Arc::new(FakeClock::at("2025-01-10T14:00:00Z"));
        let mut watcher = ResponseWatcher::new(&cfg, clock);
        let mut handler = Recorder::default();

        fs::write(cfg.watch_file(), "the model refused to answer").unwrap();
        assert!(watcher.tick(&mut handler).unwrap().is_none());
        assert!(watcher.tick(&mut handler).unwrap().is_none());
        assert!(cfg.watch_file().exists());
        assert_eq!(watcher.state(), WatchState::Waiting);
        assert!(handler.seen.is_empty());
    }

    #[test]
    fn resaved_response_is_picked_up() {
        let (_dir, cfg) = scratch_config();
        let clock = Arc::new(FakeClock::at("2025-01-10T14:00:00Z"));
        let mut watcher = ResponseWatcher::new(&cfg, clock);
        let mut handler = Recorder::default();

        fs::write(cfg.watch_file(), "{\"symbol\": \"XAUUSD\", \"bias\": ").unwrap();
        assert!(watcher.tick(&mut handler).unwrap().is_none());
        assert!(cfg.watch_file().exists());

        submit_response(&cfg.watch_file(), &json!({"symbol": "XAUUSD", "bias": "bullish"}))
            .unwrap();
        let processed = watcher.tick(&mut handler).unwrap().unwrap();
        assert_eq!(handler.seen, vec!["XAUUSD"]);
        assert!(processed.archived_to.exists());
        assert!(!cfg.watch_file().exists());
        assert_eq!(watcher.state(), WatchState::Archived);
    }

    #[test]
    fn handler_failure_leaves_file_unarchived() {
        let (_dir, cfg) = scratch_config();
        let clock = Arc::new(FakeClock::at("2025-01-10T14:00:00Z"));
        let mut watcher = ResponseWatcher::new(&cfg, clock);
        let mut handler = Recorder {
            fail: true,
            ..Default::default()
        };

        submit_response(&cfg.watch_file(), &json!({"symbol": "XAUUSD", "bias": "bullish"}))
            .unwrap();
        let err = watcher.tick(&mut handler).unwrap_err();
        assert!(matches!(err, WatchError::Processing(_)));
        assert!(cfg.watch_file().exists());
    }

    #[test]
    fn preexisting_file_is_not_new() {
        let (_dir, cfg) = scratch_config();
        submit_response(&cfg.watch_file(), &json!({"symbol": "XAUUSD", "bias": "bullish"}))
            .unwrap();

        let clock = Arc::new(FakeClock::at("2025-01-10T14:00:00Z"));
        let mut watcher = ResponseWatcher::new(&cfg, clock);
        assert!(watcher.tick(&mut Recorder::default()).unwrap().is_none());
    }

    #[tokio::test]
    async fn run_times_out_without_response() {
        let (_dir, cfg) = scratch_config();
        let clock = Arc::new(FakeClock::at("2025-01-10T14:00:00Z"));
        let mut watcher = ResponseWatcher::new(&cfg, clock.clone());

        let outcome = watcher.run(&mut Recorder::default()).await.unwrap();
        assert!(matches!(outcome, WatchOutcome::TimedOut));
        assert_eq!(watcher.state(), WatchState::TimedOut);
        assert!(clock.now() - crate::test_helpers::utc("2025-01-10T14:00:00Z")
            >= chrono::Duration::from_std(cfg.watch_timeout).unwrap());
    }

    #[test]
    fn clear_removes_pending_file() {
        let (_dir, cfg) = scratch_config();
        assert!(!clear_pending_response(&cfg.watch_file()).unwrap());
        submit_response(&cfg.watch_file(), &json!({})).unwrap();
        assert!(clear_pending_response(&cfg.watch_file()).unwrap());
        assert!(!cfg.watch_file().exists());
    }
}
