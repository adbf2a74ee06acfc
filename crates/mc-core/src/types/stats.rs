//! Persisted run statistics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::record::OwnerKind;

/// A point-in-time view of one scan run's counters.
///
/// This is the shape written to the store's `current` slot and history log,
/// so field names are kept compatible with existing databases.
///
/// # Examples
///
/// ```
/// use mc_core::{OwnerKind, StatsSnapshot};
///
/// let snap = StatsSnapshot {
///     files_checked: 10,
///     sonarr_submissions: 2,
///     radarr_submissions: 1,
///     ..StatsSnapshot::default()
/// };
/// assert_eq!(snap.submissions(OwnerKind::Sonarr), 2);
/// assert_eq!(snap.total_submissions(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsSnapshot {
    /// Files handed to Sonarr for reacquisition.
    pub sonarr_submissions: u64,
    /// Files handed to Radarr for reacquisition.
    pub radarr_submissions: u64,
    /// Files handed to Lidarr for reacquisition.
    pub lidarr_submissions: u64,
    /// Files that passed the ignore rules.
    pub files_checked: u64,
    /// Fingerprinted files found unchanged.
    pub hash_matches: u64,
    /// Fingerprinted files whose content changed.
    pub hash_mismatches: u64,
    /// Files classified as video.
    pub video_files: u64,
    /// Files classified as audio.
    pub audio_files: u64,
    /// Files whose content type was not recognized.
    #[serde(rename = "unknownFileCount")]
    pub unknown_files: u64,
    /// Images, documents and text files.
    #[serde(rename = "nonVideo")]
    pub non_media_files: u64,
    /// Unclaimed bad files deleted from disk.
    pub unknown_files_deleted: u64,
    /// Whether the run is still in progress.
    pub running: bool,
    /// Elapsed run time in nanoseconds.
    #[serde(rename = "timeDiff")]
    pub elapsed_nanos: u64,
}

impl StatsSnapshot {
    /// Returns the submission counter for an owner kind.
    #[must_use]
    pub const fn submissions(&self, kind: OwnerKind) -> u64 {
        match kind {
            OwnerKind::Sonarr => self.sonarr_submissions,
            OwnerKind::Radarr => self.radarr_submissions,
            OwnerKind::Lidarr => self.lidarr_submissions,
            OwnerKind::Unknown => 0,
        }
    }

    /// Returns the number of files handed to any media manager.
    #[inline]
    #[must_use]
    pub const fn total_submissions(&self) -> u64 {
        self.sonarr_submissions + self.radarr_submissions + self.lidarr_submissions
    }

    /// Returns the elapsed run time.
    #[inline]
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos)
    }
}
