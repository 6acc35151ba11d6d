//! Periodic reclamation of orphaned workspaces
//!
//! Workspaces are normally removed by the execution that created them. A crash
//! between running and cleanup leaves the directory behind; the sweeper removes
//! any direct child of the workspace root that has not been modified for longer
//! than `max_age`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::workspace::remove_tree;

/// Counts from one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Directory entries inspected
    pub scanned: usize,
    /// Stale workspaces removed by this pass
    pub removed: usize,
    /// Entries that could not be inspected or removed
    pub failed: usize,
}

/// Deletes stale workspace directories under a root
#[derive(Debug, Clone)]
pub struct Sweeper {
    root: PathBuf,
    interval: Duration,
    max_age: Duration,
}

impl Sweeper {
    pub fn new(root: impl Into<PathBuf>, interval: Duration, max_age: Duration) -> Self {
        Self {
            root: root.into(),
            interval,
            max_age,
        }
    }

    /// Build a sweeper for the configured workspace root and sweeper settings
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.workspace_root.clone(),
            config.sweeper.interval(),
            config.sweeper.max_age(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Run one pass over the root
    ///
    /// A missing root is an empty sweep. Errors on individual entries are logged
    /// and counted; they never stop the pass.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("workspace root does not exist, nothing to sweep");
                return report;
            }
            Err(e) => {
                warn!(error = %e, "failed to read workspace root");
                report.failed += 1;
                return report;
            }
        };

        let now = SystemTime::now();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to read directory entry");
                    report.failed += 1;
                    break;
                }
            };
            report.scanned += 1;

            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to stat entry");
                    report.failed += 1;
                    continue;
                }
            };

            if !metadata.is_dir() {
                continue;
            }

            let age = match metadata.modified() {
                // Modification times in the future count as fresh
                Ok(modified) => now.duration_since(modified).unwrap_or(Duration::ZERO),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "modification time unavailable");
                    report.failed += 1;
                    continue;
                }
            };

            if age <= self.max_age {
                continue;
            }

            reclaim(&path, age, &mut report).await;
        }

        debug!(
            scanned = report.scanned,
            removed = report.removed,
            failed = report.failed,
            "sweep complete"
        );
        report
    }

    /// Start sweeping in the background
    ///
    /// The first pass runs immediately, then once per interval until
    /// [`SweeperHandle::stop`] is called. Must be called within a tokio runtime.
    pub fn start(self) -> SweeperHandle {
        let shutdown = Arc::new(Notify::new());
        let signal = shutdown.clone();

        info!(
            root = %self.root.display(),
            interval_secs = self.interval.as_secs(),
            max_age_secs = self.max_age.as_secs(),
            "starting workspace sweeper"
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = signal.notified() => break,
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                }
            }

            debug!("workspace sweeper stopped");
        });

        SweeperHandle { shutdown, task }
    }
}

/// Remove one stale workspace and record the outcome
///
/// A directory that vanished in the meantime was reclaimed by its owner and is
/// not counted.
async fn reclaim(path: &Path, age: Duration, report: &mut SweepReport) {
    match remove_tree(path).await {
        Ok(true) => {
            info!(
                path = %path.display(),
                age_secs = age.as_secs(),
                "removed stale workspace"
            );
            report.removed += 1;
        }
        Ok(false) => debug!(path = %path.display(), "stale workspace already gone"),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to remove stale workspace");
            report.failed += 1;
        }
    }
}

/// Handle to a running sweeper task
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for an in-flight pass to finish
    pub async fn stop(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            warn!(error = %e, "sweeper task ended abnormally");
        }
    }
}
