//! Run statistics with atomic counters.
//!
//! [`RunStats`] is the live, run-scoped counter set; [`StatsSnapshot`] is
//! the copy that gets persisted and rendered.
//!
//! # Thread Safety
//!
//! All counters use [`AtomicU64`] with [`Relaxed`](std::sync::atomic::Ordering::Relaxed)
//! ordering. The values are informational and read in one pass by
//! [`snapshot()`](RunStats::snapshot).
//!
//! # Examples
//!
//! ```
//! use mc_scanner::RunStats;
//!
//! let stats = RunStats::new();
//! stats.start();
//! stats.increment_files_checked();
//! stats.increment_video();
//!
//! let snapshot = stats.stop();
//! assert!(!snapshot.running);
//! assert_eq!(snapshot.files_checked, 1);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use mc_core::{OwnerKind, StatsSnapshot};
use parking_lot::Mutex;

/// Live counters for one scan run.
#[derive(Debug, Default)]
pub struct RunStats {
    sonarr_submissions: AtomicU64,
    radarr_submissions: AtomicU64,
    lidarr_submissions: AtomicU64,
    files_checked: AtomicU64,
    hash_matches: AtomicU64,
    hash_mismatches: AtomicU64,
    video_files: AtomicU64,
    audio_files: AtomicU64,
    unknown_files: AtomicU64,
    non_media_files: AtomicU64,
    unknown_files_deleted: AtomicU64,
    running: AtomicBool,
    started_at: Mutex<Option<Instant>>,
    elapsed_nanos: AtomicU64,
}

impl RunStats {
    /// Creates a new [`RunStats`] with all counters at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every counter and starts the run timer.
    pub fn start(&self) {
        for counter in self.counters() {
            counter.store(0, Ordering::Relaxed);
        }
        self.elapsed_nanos.store(0, Ordering::Relaxed);
        *self.started_at.lock() = Some(Instant::now());
        self.running.store(true, Ordering::Relaxed);
    }

    /// Stops the run timer and returns the final snapshot.
    pub fn stop(&self) -> StatsSnapshot {
        if let Some(started) = self.started_at.lock().take() {
            self.elapsed_nanos
                .store(duration_nanos(started), Ordering::Relaxed);
        }
        self.running.store(false, Ordering::Relaxed);
        self.snapshot()
    }

    /// Returns `true` between [`start`](Self::start) and [`stop`](Self::stop).
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Increments the checked-files counter.
    #[inline]
    pub fn increment_files_checked(&self) {
        self.files_checked.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the hash-match counter.
    #[inline]
    pub fn increment_hash_matches(&self) {
        self.hash_matches.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the hash-mismatch counter.
    #[inline]
    pub fn increment_hash_mismatches(&self) {
        self.hash_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the video-files counter.
    #[inline]
    pub fn increment_video(&self) {
        self.video_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the audio-files counter.
    #[inline]
    pub fn increment_audio(&self) {
        self.audio_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the unknown-files counter.
    #[inline]
    pub fn increment_unknown(&self) {
        self.unknown_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the non-media counter.
    #[inline]
    pub fn increment_non_media(&self) {
        self.non_media_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the locally-deleted unknown files counter.
    #[inline]
    pub fn increment_unknown_deleted(&self) {
        self.unknown_files_deleted.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a reacquisition request accepted by an owner of `kind`.
    pub fn record_submission(&self, kind: OwnerKind) {
        let counter = match kind {
            OwnerKind::Sonarr => &self.sonarr_submissions,
            OwnerKind::Radarr => &self.radarr_submissions,
            OwnerKind::Lidarr => &self.lidarr_submissions,
            OwnerKind::Unknown => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot.
    ///
    /// While running, the elapsed time is measured up to now.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let elapsed_nanos = match *self.started_at.lock() {
            Some(started) => duration_nanos(started),
            None => self.elapsed_nanos.load(Ordering::Relaxed),
        };
        StatsSnapshot {
            sonarr_submissions: self.sonarr_submissions.load(Ordering::Relaxed),
            radarr_submissions: self.radarr_submissions.load(Ordering::Relaxed),
            lidarr_submissions: self.lidarr_submissions.load(Ordering::Relaxed),
            files_checked: self.files_checked.load(Ordering::Relaxed),
            hash_matches: self.hash_matches.load(Ordering::Relaxed),
            hash_mismatches: self.hash_mismatches.load(Ordering::Relaxed),
            video_files: self.video_files.load(Ordering::Relaxed),
            audio_files: self.audio_files.load(Ordering::Relaxed),
            unknown_files: self.unknown_files.load(Ordering::Relaxed),
            non_media_files: self.non_media_files.load(Ordering::Relaxed),
            unknown_files_deleted: self.unknown_files_deleted.load(Ordering::Relaxed),
            running: self.running.load(Ordering::Relaxed),
            elapsed_nanos,
        }
    }

    fn counters(&self) -> [&AtomicU64; 11] {
        [
            &self.sonarr_submissions,
            &self.radarr_submissions,
            &self.lidarr_submissions,
            &self.files_checked,
            &self.hash_matches,
            &self.hash_mismatches,
            &self.video_files,
            &self.audio_files,
            &self.unknown_files,
            &self.non_media_files,
            &self.unknown_files_deleted,
        ]
    }
}

fn duration_nanos(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX)
}
