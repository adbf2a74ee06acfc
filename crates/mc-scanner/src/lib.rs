//! Scan orchestration for mediacheck.
//!
//! This crate walks the configured library roots, decides which files need
//! checking, applies the integrity policy and hands bad files to the media
//! managers that own them.
//!
//! # Overview
//!
//! The main entry point is [`Scanner`], which combines:
//!
//! - [`FileWalker`] / [`IgnoreRules`]: Directory traversal and skip rules
//! - [`PolicyEngine`]: Codec, language and decode-error rules
//! - [`RemediationDispatcher`]: First-owner-wins reacquisition
//! - [`RunStats`]: Atomic per-run counters
//! - [`AuditLog`]: Optional CSV of bad files
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mc_core::Config;
//! use mc_probe::FfmpegProber;
//! use mc_scanner::{RunOutcome, ScanContext, Scanner};
//! use mc_store::Store;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! let store = Arc::new(Store::open(&config.store.path)?);
//! let prober = Arc::new(FfmpegProber::from_config(&config.probe));
//! let scanner = Scanner::new(ScanContext::new(&config, store, prober));
//!
//! if let RunOutcome::Completed(report) = scanner.run(CancellationToken::new()).await? {
//!     println!("checked {} files", report.stats.files_checked);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Scanner (one run at a time)
//!     │
//!     ├── FileWalker (per root, blocking thread)
//!     │
//!     ├── FilePipeline (sequential, per file)
//!     │       │
//!     │       ├── Store (fingerprints)
//!     │       ├── ContainerProber (probe + decode)
//!     │       ├── PolicyEngine
//!     │       └── RemediationDispatcher ──► owners, notifications
//!     │
//!     ├── RunStats (atomic counters, persisted at start and end)
//!     │
//!     └── AuditLog (csv)
//! ```
//!
//! Files are processed one at a time. Cancellation is checked before each
//! file and interrupts the checking tools, but a file already handed to its
//! owners is always recorded before the run stops. A cancelled run still
//! persists its statistics.

#![deny(clippy::all)]
#![warn(missing_docs)]

mod audit;
mod dispatcher;
mod error;
mod pipeline;
mod policy;
mod stats;
mod walker;

pub use audit::AuditLog;
pub use dispatcher::{OwnerOutcome, RemediationDispatcher};
pub use error::ScanError;
pub use pipeline::{FileOutcome, FileState};
pub use policy::{PolicyEngine, ProbeOutcome, decode_verdict};
pub use stats::RunStats;
pub use walker::{FileWalker, IgnoreReason, IgnoreRules, WalkOutcome};

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use camino::Utf8PathBuf;
use chrono::Utc;
use mc_connect::{Notification, NotificationSender, OwnerRegistry};
use mc_core::{Config, EventKind, StatsSnapshot};
use mc_probe::{ContainerProber, DecodeMode};
use mc_store::Store;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::pipeline::FilePipeline;

/// Everything a [`Scanner`] needs.
pub struct ScanContext {
    config: Config,
    store: Arc<Store>,
    prober: Arc<dyn ContainerProber>,
    owners: OwnerRegistry,
    notifications: NotificationSender,
}

impl ScanContext {
    /// Creates a context with no owners and notifications disabled.
    #[must_use]
    pub fn new(config: &Config, store: Arc<Store>, prober: Arc<dyn ContainerProber>) -> Self {
        Self {
            config: config.clone(),
            store,
            prober,
            owners: OwnerRegistry::new(),
            notifications: NotificationSender::disabled(),
        }
    }

    /// Sets the connected owners, in priority order.
    #[must_use]
    pub fn with_owners(mut self, owners: OwnerRegistry) -> Self {
        self.owners = owners;
        self
    }

    /// Sets the notification queue handle.
    #[must_use]
    pub fn with_notifications(mut self, notifications: NotificationSender) -> Self {
        self.notifications = notifications;
        self
    }
}

impl fmt::Debug for ScanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanContext")
            .field("roots", &self.config.check.paths)
            .field("owners", &self.owners.len())
            .finish_non_exhaustive()
    }
}

/// The summary of a finished run.
#[derive(Debug)]
pub struct RunReport {
    /// Final counters.
    pub stats: StatsSnapshot,
    /// Roots whose walk ended early.
    pub walk_failures: Vec<ScanError>,
    /// `true` if the run was cancelled before every file was processed.
    pub interrupted: bool,
}

/// The result of [`Scanner::run`].
#[derive(Debug)]
pub enum RunOutcome {
    /// The run finished or was cancelled cleanly.
    Completed(RunReport),
    /// Another run was already in progress; nothing was done.
    Busy,
}

/// The result of [`Scanner::trigger`].
#[derive(Debug)]
pub enum TriggerOutcome {
    /// A run was started in the background.
    Started(JoinHandle<Result<RunReport, ScanError>>),
    /// Another run was already in progress.
    Busy,
}

/// Runs scans over the configured roots. At most one run is active per
/// scanner; clones share that guard.
#[derive(Clone)]
pub struct Scanner {
    inner: Arc<Inner>,
}

struct Inner {
    pipeline: FilePipeline,
    roots: Vec<Utf8PathBuf>,
    follow_links: bool,
    csv_file: Option<Utf8PathBuf>,
    store: Arc<Store>,
    stats: Arc<RunStats>,
    notifications: NotificationSender,
    running: AtomicBool,
}

impl Scanner {
    /// Builds a scanner from its context.
    #[must_use]
    pub fn new(ctx: ScanContext) -> Self {
        let ScanContext {
            config,
            store,
            prober,
            owners,
            notifications,
        } = ctx;
        let stats = Arc::new(RunStats::new());

        let dispatcher = RemediationDispatcher::new(
            owners,
            Arc::clone(&store),
            Arc::clone(&stats),
            notifications.clone(),
        )
        .with_remove_unknown_files(config.check.remove_unknown_files);

        let pipeline = FilePipeline {
            rules: IgnoreRules::from_config(&config.check),
            policy: PolicyEngine::new(&config.policy),
            store: Arc::clone(&store),
            prober,
            dispatcher,
            stats: Arc::clone(&stats),
            notifications: notifications.clone(),
            ffprobe: config.probe.ffprobe,
            decode_modes: decode_modes(&config),
        };

        Self {
            inner: Arc::new(Inner {
                pipeline,
                roots: config.check.paths,
                follow_links: config.check.follow_links,
                csv_file: config.check.csv_file,
                store,
                stats,
                notifications,
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Returns `true` while a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Returns the live counters of the current or last run.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Runs one scan to completion, or until `token` is cancelled.
    ///
    /// Returns [`RunOutcome::Busy`] without doing anything if a run is
    /// already in progress.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`ScanError`] (a store failure) that stopped the run.
    /// Statistics are persisted before returning.
    pub async fn run(&self, token: CancellationToken) -> Result<RunOutcome, ScanError> {
        match RunGuard::acquire(&self.inner) {
            Some(guard) => execute(guard, token).await.map(RunOutcome::Completed),
            None => Ok(RunOutcome::Busy),
        }
    }

    /// Starts a run in the background.
    #[must_use]
    pub fn trigger(&self, token: CancellationToken) -> TriggerOutcome {
        let Some(guard) = RunGuard::acquire(&self.inner) else {
            info!("Scan already running; trigger ignored");
            return TriggerOutcome::Busy;
        };
        TriggerOutcome::Started(tokio::spawn(execute(guard, token)))
    }
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("roots", &self.inner.roots)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn decode_modes(config: &Config) -> Vec<DecodeMode> {
    let mut modes = Vec::with_capacity(2);
    if config.probe.quick_scan {
        modes.push(DecodeMode::Quick {
            seconds: config.probe.quick_scan_seconds,
        });
    }
    if config.probe.full_scan {
        modes.push(DecodeMode::Full {
            timeout: config.probe.full_scan_timeout_secs.map(Duration::from_secs),
        });
    }
    modes
}

/// Holds the single-run flag for the lifetime of a run.
struct RunGuard {
    inner: Arc<Inner>,
}

impl RunGuard {
    fn acquire(inner: &Arc<Inner>) -> Option<Self> {
        inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                inner: Arc::clone(inner),
            })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.inner.running.store(false, Ordering::Release);
    }
}

async fn execute(guard: RunGuard, token: CancellationToken) -> Result<RunReport, ScanError> {
    let inner = &*guard.inner;

    inner.stats.start();
    info!(roots = inner.roots.len(), "Scan started");
    inner.persist_current(&inner.stats.snapshot());
    inner.notifications.enqueue(Notification::new(
        EventKind::StartRun,
        "Scan started",
        format!("Checking {} path(s)", inner.roots.len()),
    ));

    let mut audit = inner.open_audit();
    let mut walk_failures = Vec::new();
    let mut interrupted = false;
    let mut fatal = None;

    'roots: for root in &inner.roots {
        if token.is_cancelled() {
            interrupted = true;
            break;
        }

        let walker = FileWalker::new(root).with_follow_links(inner.follow_links);
        let walk = tokio::task::spawn_blocking(move || walker.collect())
            .await
            .unwrap_or_else(|err| WalkOutcome {
                files: Vec::new(),
                error: Some(ScanError::walk(root, ignore::Error::Io(io::Error::other(err)))),
            });
        info!(root = %root, files = walk.files.len(), "Walked root");

        for path in &walk.files {
            if token.is_cancelled() {
                interrupted = true;
                break 'roots;
            }

            match inner.pipeline.process(path, &mut audit, &token).await {
                Ok(FileOutcome::Cancelled) => {
                    debug!(path = %path, "Checks cancelled; file left for the next run");
                    interrupted = true;
                    break 'roots;
                }
                Ok(outcome) => trace!(path = %path, ?outcome, "Processed"),
                Err(err) if err.is_fatal() => {
                    error!(path = %path, error = %err, "Fatal error; stopping scan");
                    fatal = Some(err);
                    break 'roots;
                }
                Err(err) => warn!(path = %path, error = %err, "Skipping file"),
            }
        }

        if let Some(err) = walk.error {
            warn!(root = %root, error = %err, "Walk ended early; remaining files under this root skipped");
            walk_failures.push(err);
        }
    }

    if interrupted {
        info!("Scan cancelled");
    }
    let stats = inner.finish(audit);

    match fatal {
        Some(err) => Err(err),
        None => Ok(RunReport {
            stats,
            walk_failures,
            interrupted,
        }),
    }
}

impl Inner {
    fn open_audit(&self) -> Option<AuditLog> {
        let path = self.csv_file.as_deref()?;
        match AuditLog::create(path) {
            Ok(log) => Some(log),
            Err(err) => {
                warn!(error = %err, "Audit file unavailable; continuing without it");
                None
            }
        }
    }

    fn persist_current(&self, snapshot: &StatsSnapshot) {
        if let Err(err) = self.store.put_current_stats(snapshot) {
            warn!(error = %err, "Failed to persist current stats");
        }
    }

    fn finish(&self, audit: Option<AuditLog>) -> StatsSnapshot {
        let stats = self.stats.stop();
        self.persist_current(&stats);
        if let Err(err) = self.store.append_history(Utc::now(), &stats) {
            warn!(error = %err, "Failed to append stats history");
        }
        if let Some(log) = audit {
            if let Err(err) = log.close() {
                warn!(error = %err, "Failed to flush audit file");
            }
        }

        info!(
            files = stats.files_checked,
            hash_matches = stats.hash_matches,
            submissions = stats.total_submissions(),
            elapsed = ?stats.elapsed(),
            "Scan finished"
        );
        self.notifications.enqueue(Notification::new(
            EventKind::EndRun,
            "Scan finished",
            format!(
                "Checked {} file(s) in {:.1}s; {} submitted for reacquisition",
                stats.files_checked,
                stats.elapsed().as_secs_f64(),
                stats.total_submissions()
            ),
        ));
        stats
    }
}
