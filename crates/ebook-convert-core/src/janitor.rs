//! Periodic sweep of the shared scratch directory.
//!
//! Requests clean up after themselves, but a crash or a killed connection
//! can leave files behind. The janitor deletes every entry older than a
//! fixed age, whatever its name, on a fixed interval. It shares nothing with
//! request handlers except the directory itself.

use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::converter::CONVERTER_LOG;
use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct JanitorConfig {
    /// Directory to sweep.
    pub dir: PathBuf,
    /// Time between sweeps.
    pub interval: Duration,
    /// Entries older than this are deleted.
    pub max_age: Duration,
    /// Paths deleted on every sweep regardless of age, in addition to the
    /// converter log inside `dir`.
    pub extra_paths: Vec<PathBuf>,
}

/// Counters for one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    /// Entries that vanished before they could be inspected or removed.
    pub skipped: usize,
    pub failed: usize,
}

impl SweepReport {
    /// Fold the result of sweeping one entry into the counters.
    fn record(&mut self, path: &Path, result: std::io::Result<bool>) {
        match result {
            Ok(true) => {
                debug!(path = %path.display(), "stale entry removed");
                self.removed += 1;
            }
            Ok(false) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => self.skipped += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to sweep entry");
                self.failed += 1;
            }
        }
    }
}

/// Delete every entry of `dir` whose age at `now` exceeds `max_age`.
///
/// Only a failure to open `dir` itself is returned. Per-entry problems are
/// logged and counted; a listing error part-way through ends the pass with
/// whatever was swept so far.
pub async fn sweep(dir: &Path, max_age: Duration, now: SystemTime) -> Result<SweepReport, CoreError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut report = SweepReport::default();

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "listing interrupted; ending sweep early");
                report.failed += 1;
                break;
            }
        };
        report.scanned += 1;
        let path = entry.path();
        let result = sweep_entry(&path, max_age, now).await;
        report.record(&path, result);
    }

    Ok(report)
}

async fn sweep_entry(path: &Path, max_age: Duration, now: SystemTime) -> std::io::Result<bool> {
    let metadata = tokio::fs::symlink_metadata(path).await?;
    let Some(age) = entry_age(&metadata, now) else {
        return Ok(false);
    };
    if age <= max_age {
        return Ok(false);
    }

    if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await?;
    } else {
        tokio::fs::remove_file(path).await?;
    }
    Ok(true)
}

/// Age from the modification time, falling back to the creation time on
/// platforms that do not report one.
fn entry_age(metadata: &Metadata, now: SystemTime) -> Option<Duration> {
    let stamp = metadata
        .modified()
        .or_else(|_| metadata.created())
        .ok()?;
    Some(now.duration_since(stamp).unwrap_or(Duration::ZERO))
}

/// Background task running [`sweep`] on a timer.
#[derive(Debug, Clone)]
pub struct Janitor {
    config: JanitorConfig,
}

impl Janitor {
    pub fn new(config: JanitorConfig) -> Self {
        Self { config }
    }

    /// One full pass: the converter log and the extra paths first, then the
    /// aged directory sweep.
    ///
    /// The log is rewritten by every conversion, so under steady traffic it
    /// never ages past `max_age` and has to be dropped unconditionally.
    pub async fn run_once(&self) -> Result<SweepReport, CoreError> {
        let converter_log = self.config.dir.join(CONVERTER_LOG);
        for path in std::iter::once(&converter_log).chain(&self.config.extra_paths) {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(path = %path.display(), "extra path removed"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove extra path"),
            }
        }
        sweep(&self.config.dir, self.config.max_age, SystemTime::now()).await
    }

    /// Run until `cancel` fires. The first sweep happens immediately.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                dir = %self.config.dir.display(),
                interval_secs = self.config.interval.as_secs(),
                max_age_secs = self.config.max_age.as_secs(),
                "janitor started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => match self.run_once().await {
                        Ok(report) => info!(
                            scanned = report.scanned,
                            removed = report.removed,
                            skipped = report.skipped,
                            failed = report.failed,
                            "temp files swept"
                        ),
                        Err(e) => warn!(error = %e, "temp file sweep failed"),
                    },
                }
            }

            info!("janitor stopped");
        })
    }
}
