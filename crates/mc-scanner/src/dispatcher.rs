//! The remediation dispatcher.
//!
//! On a failed verdict the dispatcher walks the owner registry in priority
//! order and stops at the first owner that both claims the path and actually
//! deletes something. Without such an owner the file is recorded as unknown
//! and, only when configured, removed from disk.
//!
//! ```text
//! owner 1: claims? ──no──► owner 2: claims? ──yes──► remove_and_research
//!                                                      │ Ok(true)  ──► Submitted
//!                                                      │ Ok(false) ──► next owner
//!                                                      │ Err       ──► next owner
//! ...no owner left ──► Unclaimed (record as unknown, optional local delete)
//! ```

use std::sync::Arc;

use camino::Utf8Path;
use mc_connect::{Notification, NotificationSender, OwnerRegistry};
use mc_core::{BadFileRecord, EventKind, FailureReason, OwnerKind};
use mc_store::Store;
use tracing::{info, warn};

use crate::stats::RunStats;

/// What remediation did with a bad file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerOutcome {
    /// An owner deleted the file and queued a search for a replacement.
    Submitted {
        /// The owner's service kind.
        kind: OwnerKind,
        /// The owner's configured name.
        owner: String,
    },
    /// No owner acted on the file.
    Unclaimed {
        /// Whether the file was removed from local disk.
        deleted_locally: bool,
    },
}

impl OwnerOutcome {
    /// Returns the service recorded for this outcome.
    #[must_use]
    pub const fn owner_kind(&self) -> OwnerKind {
        match self {
            Self::Submitted { kind, .. } => *kind,
            Self::Unclaimed { .. } => OwnerKind::Unknown,
        }
    }
}

/// Maps bad files onto at most one owner and records the outcome.
#[derive(Debug, Clone)]
pub struct RemediationDispatcher {
    owners: OwnerRegistry,
    store: Arc<Store>,
    stats: Arc<RunStats>,
    notifications: NotificationSender,
    remove_unknown_files: bool,
}

impl RemediationDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        owners: OwnerRegistry,
        store: Arc<Store>,
        stats: Arc<RunStats>,
        notifications: NotificationSender,
    ) -> Self {
        Self {
            owners,
            store,
            stats,
            notifications,
            remove_unknown_files: false,
        }
    }

    /// Enables deleting unclaimed bad files from local disk.
    #[must_use]
    pub const fn with_remove_unknown_files(mut self, remove: bool) -> Self {
        self.remove_unknown_files = remove;
        self
    }

    /// Remediates one bad file.
    ///
    /// Owner failures, store write failures and notification problems are
    /// logged; remediation itself never fails.
    pub async fn remediate(&self, path: &Utf8Path, reason: FailureReason) -> OwnerOutcome {
        for owner in self.owners.iter() {
            match owner.claims(path).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    warn!(owner = %owner.name(), path = %path, error = %err, "Ownership check failed");
                    continue;
                }
            }

            match owner.remove_and_research(path).await {
                Ok(true) => {
                    let kind = owner.kind();
                    info!(owner = %owner.name(), path = %path, reason = %reason, "Submitted for reacquisition");
                    self.record(path, reason.clone(), kind);
                    self.stats.record_submission(kind);
                    self.notifications.enqueue(
                        Notification::new(
                            EventKind::Reacquire,
                            "Reacquire",
                            format!("{} ({}) asked to replace a file: {reason}", owner.name(), kind.as_str()),
                        )
                        .with_path(path),
                    );
                    return OwnerOutcome::Submitted {
                        kind,
                        owner: owner.name().to_owned(),
                    };
                }
                Ok(false) => {
                    info!(owner = %owner.name(), path = %path, "Owner claimed the path but had nothing to delete");
                }
                Err(err) => {
                    warn!(owner = %owner.name(), path = %path, error = %err, "Owner failed to remove file");
                }
            }
        }

        info!(path = %path, reason = %reason, "No owner acted on bad file");
        self.record(path, reason.clone(), OwnerKind::Unknown);
        self.notifications.enqueue(
            Notification::new(EventKind::ManualReview, "Manual review", format!("No media manager took the file: {reason}"))
                .with_path(path),
        );

        let deleted_locally = self.remove_unknown_files && self.delete_local(path).await;
        OwnerOutcome::Unclaimed { deleted_locally }
    }

    fn record(&self, path: &Utf8Path, reason: FailureReason, kind: OwnerKind) {
        let record = BadFileRecord::new(path, reason, kind);
        if let Err(err) = self.store.record_bad_file(path, &record) {
            warn!(path = %path, error = %err, "Failed to record bad file");
        }
    }

    async fn delete_local(&self, path: &Utf8Path) -> bool {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                warn!(path = %path, "Deleted unclaimed bad file from disk");
                self.stats.increment_unknown_deleted();
                true
            }
            Err(err) => {
                warn!(path = %path, error = %err, "Failed to delete unclaimed bad file");
                false
            }
        }
    }
}
