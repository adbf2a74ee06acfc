//! The per-file pipeline.
//!
//! Every walked file moves through the same states:
//!
//! ```text
//! path ──► ignored? ──yes──► Ignored
//!            │no
//!            ▼
//!        fingerprint? ──none──────────────► Unseen ─┐
//!            │ stored                               │
//!            ▼                                      │
//!        rehash == stored? ──yes──► HashMatch       │
//!            │no                                    │
//!            ▼                                      ▼
//!        SeenChanged ─────────────────────────► classify ──► probe ──► policy ──► decode
//!                                                                                  │
//!                                       Pass ──► record fingerprint ◄──────────────┤
//!                                       Fail ──► remediate + audit row ◄───────────┘
//! ```
//!
//! Only a store failure aborts the run. Everything else is scoped to the
//! file it happened on.
//!
//! Cancellation is honoured while the external checking tools run. Once a
//! file has a failing verdict, remediation and its bookkeeping always finish.

use std::io;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use mc_connect::{Notification, NotificationSender};
use mc_core::{ContentHash, ContentKind, EventKind, FailureReason, Verdict};
use mc_probe::{ContainerProber, DecodeMode, DecodeOutcome};
use mc_store::Store;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audit::AuditLog;
use crate::dispatcher::{OwnerOutcome, RemediationDispatcher};
use crate::error::ScanError;
use crate::policy::{PolicyEngine, ProbeOutcome, decode_verdict};
use crate::stats::RunStats;
use crate::walker::{IgnoreReason, IgnoreRules};

/// Where a file stands before content checks begin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    /// An ignore rule matched.
    Ignored(IgnoreReason),
    /// No fingerprint is stored for the path.
    Unseen,
    /// The stored fingerprint matches the file.
    SeenUnchanged,
    /// The stored fingerprint differs; carries the fresh hash.
    SeenChanged(ContentHash),
}

/// What the pipeline did with one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Skipped by an ignore rule.
    Ignored(IgnoreReason),
    /// Unchanged since it last passed.
    HashMatch,
    /// Passed every check; its fingerprint was stored.
    Verified(ContentKind),
    /// An image, document or text file. Counted, never fingerprinted.
    NonMedia(ContentKind),
    /// Failed a check and went through remediation.
    Remediated {
        /// The first failing rule.
        reason: FailureReason,
        /// What the owners did with it.
        outcome: OwnerOutcome,
    },
    /// A checking tool could not run; the file is retried next run.
    Unverified,
    /// The run was cancelled while the file was being checked. Nothing was
    /// recorded or remediated.
    Cancelled,
}

/// Result of the content checks on a media file.
enum Check {
    Done(Verdict),
    Unverified,
    Cancelled,
}

/// Drives single files from path to outcome.
pub(crate) struct FilePipeline {
    pub(crate) rules: IgnoreRules,
    pub(crate) policy: PolicyEngine,
    pub(crate) store: Arc<Store>,
    pub(crate) prober: Arc<dyn ContainerProber>,
    pub(crate) dispatcher: RemediationDispatcher,
    pub(crate) stats: Arc<RunStats>,
    pub(crate) notifications: NotificationSender,
    pub(crate) ffprobe: bool,
    pub(crate) decode_modes: Vec<DecodeMode>,
}

impl FilePipeline {
    /// Processes one file.
    ///
    /// # Errors
    ///
    /// [`ScanError::Store`] when the fingerprint lookup fails (fatal) and
    /// [`ScanError::Read`] when the file cannot be read (skip).
    pub(crate) async fn process(
        &self,
        path: &Utf8Path,
        audit: &mut Option<AuditLog>,
        token: &CancellationToken,
    ) -> Result<FileOutcome, ScanError> {
        let known = match self.state(path).await? {
            FileState::Ignored(reason) => {
                debug!(path = %path, ?reason, "Ignored");
                return Ok(FileOutcome::Ignored(reason));
            }
            FileState::SeenUnchanged => {
                self.stats.increment_hash_matches();
                debug!(path = %path, "Unchanged since last pass");
                return Ok(FileOutcome::HashMatch);
            }
            FileState::SeenChanged(hash) => {
                self.stats.increment_hash_mismatches();
                info!(path = %path, "Contents changed since last pass");
                Some(hash)
            }
            FileState::Unseen => None,
        };

        let kind = self.classify(path).await?;
        let verdict = if kind.is_media() {
            match self.verify(path, kind, token).await {
                Check::Done(verdict) => verdict,
                Check::Unverified => return Ok(FileOutcome::Unverified),
                Check::Cancelled => return Ok(FileOutcome::Cancelled),
            }
        } else {
            self.policy.evaluate(kind, &ProbeOutcome::Skipped)
        };

        match verdict {
            Verdict::Pass if kind.is_non_media() => Ok(FileOutcome::NonMedia(kind)),
            Verdict::Pass => {
                let hash = match known {
                    Some(hash) => hash,
                    None => hash_file(path).await?,
                };
                if let Err(err) = self.store.record(path, &hash) {
                    warn!(path = %path, error = %err, "Failed to store fingerprint");
                }
                Ok(FileOutcome::Verified(kind))
            }
            Verdict::Fail(reason) => {
                warn!(path = %path, reason = %reason, "Bad file");
                let outcome = self.dispatcher.remediate(path, reason.clone()).await;
                if let Some(log) = audit.as_mut() {
                    if let Err(err) = log.write(path, outcome.owner_kind()) {
                        warn!(error = %err, "Failed to write audit row");
                    }
                }
                Ok(FileOutcome::Remediated { reason, outcome })
            }
        }
    }

    async fn state(&self, path: &Utf8Path) -> Result<FileState, ScanError> {
        if let Some(reason) = self.rules.check(path) {
            return Ok(FileState::Ignored(reason));
        }
        self.stats.increment_files_checked();

        let Some(stored) = self.store.lookup(path)? else {
            return Ok(FileState::Unseen);
        };
        let current = hash_file(path).await?;
        if current == stored {
            Ok(FileState::SeenUnchanged)
        } else {
            Ok(FileState::SeenChanged(current))
        }
    }

    async fn classify(&self, path: &Utf8Path) -> Result<ContentKind, ScanError> {
        let owned = path.to_owned();
        let prefix = blocking(path, move || mc_probe::read_prefix(&owned)).await?;
        if prefix.is_empty() {
            return Err(ScanError::read(
                path,
                io::Error::new(io::ErrorKind::UnexpectedEof, "file is empty"),
            ));
        }

        let kind = mc_probe::classify(&prefix);
        match kind {
            ContentKind::Video => self.stats.increment_video(),
            ContentKind::Audio => self.stats.increment_audio(),
            ContentKind::Unknown => {
                self.stats.increment_unknown();
                self.notifications.enqueue(
                    Notification::new(EventKind::UnknownDetected, "Unknown file", "File type not recognized")
                        .with_path(path),
                );
            }
            ContentKind::Image | ContentKind::Document | ContentKind::PlainText => {
                self.stats.increment_non_media();
            }
        }
        debug!(path = %path, kind = kind.label(), "Classified");
        Ok(kind)
    }

    /// Probes, applies policy, then decodes. Only the tool invocations race
    /// against `token`.
    async fn verify(&self, path: &Utf8Path, kind: ContentKind, token: &CancellationToken) -> Check {
        let probe = if self.ffprobe {
            let result = tokio::select! {
                biased;
                () = token.cancelled() => return Check::Cancelled,
                result = self.prober.probe(path) => result,
            };
            match result {
                Ok(metadata) => ProbeOutcome::Metadata(metadata),
                Err(err) if err.is_tool_failure() => {
                    warn!(path = %path, error = %err, "Prober unavailable; file left unverified");
                    return Check::Unverified;
                }
                Err(err) => {
                    info!(path = %path, error = %err, "Prober rejected file");
                    ProbeOutcome::Failed
                }
            }
        } else {
            ProbeOutcome::Skipped
        };

        let verdict = self.policy.evaluate(kind, &probe);
        if !verdict.is_pass() {
            return Check::Done(verdict);
        }

        for &mode in &self.decode_modes {
            let result = tokio::select! {
                biased;
                () = token.cancelled() => return Check::Cancelled,
                result = self.prober.decode_scan(path, mode) => result,
            };
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(path = %path, mode = mode.label(), error = %err, "Decode scan could not run; file left unverified");
                    return Check::Unverified;
                }
            };
            if outcome == (DecodeOutcome::TimedOut { diagnostics: None }) {
                info!(path = %path, mode = mode.label(), "Decode scan timed out without output");
            }
            let verdict = decode_verdict(&outcome);
            if !verdict.is_pass() {
                if let Some(text) = outcome.diagnostics() {
                    info!(
                        path = %path,
                        mode = mode.label(),
                        lines = text.lines().count(),
                        first = text.lines().next().unwrap_or_default(),
                        "Decoder reported errors"
                    );
                }
                return Check::Done(verdict);
            }
        }
        Check::Done(Verdict::Pass)
    }
}

async fn hash_file(path: &Utf8Path) -> Result<ContentHash, ScanError> {
    let owned: Utf8PathBuf = path.to_owned();
    blocking(path, move || ContentHash::of_file(&owned)).await
}

/// Runs blocking file I/O off the async workers.
async fn blocking<T, F>(path: &Utf8Path, f: F) -> Result<T, ScanError>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(io::Error::other)
        .and_then(|result| result)
        .map_err(|source| ScanError::read(path, source))
}
