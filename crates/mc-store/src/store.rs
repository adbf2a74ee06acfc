//! The `SQLite`-backed store.
//!
//! # Concurrency
//!
//! The single connection sits behind a mutex: every operation, read or
//! write, runs with exclusive access, and multi-statement operations run in
//! one transaction. This gives the one-writer discipline the scanner relies
//! on while keeping [`Store`] `Send + Sync`.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, SecondsFormat, Utc};
use mc_core::{BadFileEntry, BadFileRecord, ContentHash, StatsSnapshot};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::StoreError;

/// Key of the in-progress/most recent run statistics.
const CURRENT_KEY: &str = "current";

/// Maximum number of history entries returned by [`Store::stats_history`].
pub const HISTORY_LIMIT: u32 = 30;

/// One finished run in the statistics history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// RFC 3339 UTC timestamp the run was recorded at.
    pub timestamp: String,
    /// Counters of that run.
    pub stats: StatsSnapshot,
}

/// Durable fingerprint, bad-file and statistics store.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use mc_core::ContentHash;
/// use mc_store::Store;
///
/// let store = Store::open_in_memory()?;
/// let path = Utf8Path::new("/tv/Show/S01E01.mkv");
/// let hash = ContentHash::of_bytes(b"episode");
///
/// assert_eq!(store.lookup(path)?, None);
/// store.record(path, &hash)?;
/// assert_eq!(store.lookup(path)?, Some(hash));
/// # Ok::<(), mc_store::StoreError>(())
/// ```
#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (creating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the file cannot be opened or the schema
    /// cannot be initialized.
    pub fn open(path: &Utf8Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::open(path, source))?;
        Self::init(conn).map_err(|source| StoreError::open(path, source))
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the schema cannot be initialized.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|source| StoreError::open(":memory:", source))?;
        Self::init(conn).map_err(|source| StoreError::open(":memory:", source))
    }

    fn init(conn: Connection) -> rusqlite::Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(include_str!("schema.sql"))?;
        debug!("Store schema initialized");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Returns the stored fingerprint for `path`.
    ///
    /// A stored value of the wrong length (written by an incompatible
    /// version) reads as absent so the file is classified afresh.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the read fails.
    pub fn lookup(&self, path: &Utf8Path) -> Result<Option<ContentHash>, StoreError> {
        let conn = self.conn.lock();
        let bytes: Option<Vec<u8>> = conn
            .query_row(
                "SELECT hash FROM fingerprints WHERE path = ?1",
                [path.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(bytes.and_then(|bytes| {
            let hash = ContentHash::from_slice(&bytes);
            if hash.is_none() {
                debug!(path = %path, len = bytes.len(), "Ignoring fingerprint of unexpected length");
            }
            hash
        }))
    }

    /// Stores the fingerprint of a healthy file, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    pub fn record(&self, path: &Utf8Path, hash: &ContentHash) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO fingerprints (path, hash) VALUES (?1, ?2)",
            params![path.as_str(), &hash.as_bytes()[..]],
        )?;
        Ok(())
    }

    /// Stores the bad-file record for `path`, replacing any previous one.
    ///
    /// The path's fingerprint is dropped in the same transaction: a file
    /// that failed must be re-verified if it ever reappears.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub fn record_bad_file(&self, path: &Utf8Path, record: &BadFileRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO bad_files (path, record) VALUES (?1, ?2)",
            params![path.as_str(), json],
        )?;
        tx.execute("DELETE FROM fingerprints WHERE path = ?1", [path.as_str()])?;
        tx.commit()?;
        Ok(())
    }

    /// Returns the bad-file record for `path`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or decoding fails.
    pub fn bad_file(&self, path: &Utf8Path) -> Result<Option<BadFileRecord>, StoreError> {
        let json: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT record FROM bad_files WHERE path = ?1",
                [path.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(json.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    /// Lists every bad-file record, ordered by path.
    ///
    /// The order is stable between calls as long as no records are added or
    /// removed, which is what [`delete_bad_files`](Self::delete_bad_files)
    /// indices refer to.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or decoding fails.
    pub fn list_bad_files(&self) -> Result<Vec<BadFileEntry>, StoreError> {
        let conn = self.conn.lock();
        list_bad_files(&conn)
    }

    /// Deletes bad-file records by 1-based index into [`list_bad_files`](Self::list_bad_files).
    ///
    /// Every index is validated before anything is removed; duplicates are
    /// ignored. Returns the removed entries in listing order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IndexOutOfRange`] for an index of 0 or past the
    /// end of the listing, in which case nothing is deleted.
    pub fn delete_bad_files(&self, indices: &[usize]) -> Result<Vec<BadFileEntry>, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let listing = list_bad_files(&tx)?;

        if let Some(&index) = indices.iter().find(|&&i| i == 0 || i > listing.len()) {
            return Err(StoreError::IndexOutOfRange {
                index,
                len: listing.len(),
            });
        }

        let mut removed = Vec::with_capacity(indices.len());
        for (position, entry) in listing.into_iter().enumerate() {
            if indices.contains(&(position + 1)) {
                tx.execute("DELETE FROM bad_files WHERE path = ?1", [entry.path.as_str()])?;
                removed.push(entry);
            }
        }
        tx.commit()?;

        info!(removed = removed.len(), "Deleted bad-file records");
        Ok(removed)
    }

    /// Overwrites the `current` statistics record.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub fn put_current_stats(&self, stats: &StatsSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_string(stats)?;
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO run_stats (key, stats) VALUES (?1, ?2)",
            params![CURRENT_KEY, json],
        )?;
        Ok(())
    }

    /// Appends a finished run to the statistics history.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub fn append_history(&self, at: DateTime<Utc>, stats: &StatsSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_string(stats)?;
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO run_stats (key, stats) VALUES (?1, ?2)",
            params![history_key(at), json],
        )?;
        Ok(())
    }

    /// Returns the `current` statistics record, if one was ever written.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or decoding fails.
    pub fn current_stats(&self) -> Result<Option<StatsSnapshot>, StoreError> {
        let conn = self.conn.lock();
        current_stats(&conn)
    }

    /// Returns the most recent [`HISTORY_LIMIT`] history entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or decoding fails.
    pub fn stats_history(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT key, stats FROM run_stats WHERE key <> ?1 ORDER BY key DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![CURRENT_KEY, HISTORY_LIMIT], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (timestamp, json) = row?;
            entries.push(HistoryEntry {
                timestamp,
                stats: serde_json::from_str(&json)?,
            });
        }
        entries.reverse();
        Ok(entries)
    }

    /// Repairs the statistics left behind by a run that never finished.
    ///
    /// If the `current` record is still marked running, it is flipped to not
    /// running, rewritten, and preserved in the history under the time of
    /// recovery. Returns the repaired snapshot, or `None` if nothing needed
    /// repair.
    ///
    /// # Errors
    ///
    /// Returns an error if the read, decoding or write fails.
    pub fn recover_interrupted_run(&self) -> Result<Option<StatsSnapshot>, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let Some(mut stats) = current_stats(&tx)? else {
            return Ok(None);
        };
        if !stats.running {
            return Ok(None);
        }

        stats.running = false;
        let json = serde_json::to_string(&stats)?;
        tx.execute(
            "INSERT OR REPLACE INTO run_stats (key, stats) VALUES (?1, ?2)",
            params![CURRENT_KEY, json],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO run_stats (key, stats) VALUES (?1, ?2)",
            params![history_key(Utc::now()), json],
        )?;
        tx.commit()?;

        warn!(
            files_checked = stats.files_checked,
            "Recovered statistics of an interrupted run"
        );
        Ok(Some(stats))
    }
}

fn history_key(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn current_stats(conn: &Connection) -> Result<Option<StatsSnapshot>, StoreError> {
    let json: Option<String> = conn
        .query_row(
            "SELECT stats FROM run_stats WHERE key = ?1",
            [CURRENT_KEY],
            |row| row.get(0),
        )
        .optional()?;
    Ok(json.map(|json| serde_json::from_str(&json)).transpose()?)
}

fn list_bad_files(conn: &Connection) -> Result<Vec<BadFileEntry>, StoreError> {
    let mut stmt = conn.prepare("SELECT path, record FROM bad_files ORDER BY path")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (path, json) = row?;
        entries.push(BadFileEntry {
            path: Utf8PathBuf::from(path),
            record: serde_json::from_str(&json)?,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use mc_core::{FailureReason, OwnerKind};

    use super::*;

    fn record(reason: FailureReason, owner: OwnerKind) -> BadFileRecord {
        BadFileRecord {
            file_extension: ".mkv".to_owned(),
            reacquire_requested: owner.is_service(),
            owner_service: owner,
            timestamp: 1_700_000_000,
            reason,
        }
    }

    fn seeded_bad_files(store: &Store) {
        for name in ["/m/c.mkv", "/m/a.mkv", "/m/b.mkv"] {
            store
                .record_bad_file(Utf8Path::new(name), &record(FailureReason::VideoCodec, OwnerKind::Radarr))
                .unwrap();
        }
    }

    #[test]
    fn test_fingerprint_upsert() {
        let store = Store::open_in_memory().unwrap();
        let path = Utf8Path::new("/tv/a.mkv");
        let first = ContentHash::of_bytes(b"one");
        let second = ContentHash::of_bytes(b"two");

        store.record(path, &first).unwrap();
        store.record(path, &first).unwrap();
        assert_eq!(store.lookup(path).unwrap(), Some(first));

        store.record(path, &second).unwrap();
        assert_eq!(store.lookup(path).unwrap(), Some(second));
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db = Utf8PathBuf::from_path_buf(dir.path().join("state.db")).unwrap();
        let path = Utf8Path::new("/music/track.flac");
        let hash = ContentHash::of_bytes(b"track");

        {
            let store = Store::open(&db).unwrap();
            store.record(path, &hash).unwrap();
        }

        let store = Store::open(&db).unwrap();
        assert_eq!(store.lookup(path).unwrap(), Some(hash));
    }

    #[test]
    fn test_bad_file_replaces_fingerprint_and_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let path = Utf8Path::new("/tv/a.mkv");
        store.record(path, &ContentHash::of_bytes(b"a")).unwrap();

        store
            .record_bad_file(path, &record(FailureReason::DataProblem, OwnerKind::Unknown))
            .unwrap();
        store
            .record_bad_file(path, &record(FailureReason::VideoCodec, OwnerKind::Sonarr))
            .unwrap();

        assert_eq!(store.lookup(path).unwrap(), None);
        let listing = store.list_bad_files().unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].record.reason, FailureReason::VideoCodec);
        assert_eq!(
            store.bad_file(path).unwrap().map(|r| r.owner_service),
            Some(OwnerKind::Sonarr)
        );
    }

    #[test]
    fn test_list_bad_files_is_ordered_by_path() {
        let store = Store::open_in_memory().unwrap();
        seeded_bad_files(&store);

        let paths: Vec<String> = store
            .list_bad_files()
            .unwrap()
            .into_iter()
            .map(|entry| entry.path.into_string())
            .collect();
        assert_eq!(paths, ["/m/a.mkv", "/m/b.mkv", "/m/c.mkv"]);
    }

    #[test]
    fn test_delete_bad_files_by_index() {
        let store = Store::open_in_memory().unwrap();
        seeded_bad_files(&store);

        let removed = store.delete_bad_files(&[3, 1, 1]).unwrap();
        let removed: Vec<&str> = removed.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(removed, ["/m/a.mkv", "/m/c.mkv"]);

        let remaining = store.list_bad_files().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].path, "/m/b.mkv");
    }

    #[test]
    fn test_delete_bad_files_rejects_bad_index_atomically() {
        let store = Store::open_in_memory().unwrap();
        seeded_bad_files(&store);

        let err = store.delete_bad_files(&[1, 4]).unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfRange { index: 4, len: 3 }));
        assert!(matches!(
            store.delete_bad_files(&[0]),
            Err(StoreError::IndexOutOfRange { index: 0, .. })
        ));
        assert_eq!(store.list_bad_files().unwrap().len(), 3);
    }

    #[test]
    fn test_bad_file_listing_json_shape() {
        let store = Store::open_in_memory().unwrap();
        store
            .record_bad_file(
                Utf8Path::new("/movies/Film (2001)/film.avi"),
                &record(FailureReason::AudioLanguage, OwnerKind::Radarr),
            )
            .unwrap();

        insta::assert_json_snapshot!(store.list_bad_files().unwrap(), @r#"
        [
          {
            "path": "/movies/Film (2001)/film.avi",
            "data": {
              "fileExt": ".mkv",
              "reacquire": true,
              "service": "radarr",
              "date": 1700000000,
              "reason": "audio lang"
            }
          }
        ]
        "#);
    }

    #[test]
    fn test_history_is_capped_and_oldest_first() {
        let store = Store::open_in_memory().unwrap();
        store
            .put_current_stats(&StatsSnapshot {
                running: true,
                ..StatsSnapshot::default()
            })
            .unwrap();

        for minute in 0..35u32 {
            let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap();
            let stats = StatsSnapshot {
                files_checked: u64::from(minute),
                ..StatsSnapshot::default()
            };
            store.append_history(at, &stats).unwrap();
        }

        let history = store.stats_history().unwrap();
        assert_eq!(history.len(), 30);
        assert_eq!(history[0].stats.files_checked, 5);
        assert_eq!(history[29].stats.files_checked, 34);
        assert_eq!(history[29].timestamp, "2024-05-01T12:34:00.000000000Z");
    }

    #[test]
    fn test_recover_interrupted_run() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.recover_interrupted_run().unwrap(), None);

        let crashed = StatsSnapshot {
            files_checked: 120,
            hash_matches: 100,
            sonarr_submissions: 2,
            running: true,
            ..StatsSnapshot::default()
        };
        store.put_current_stats(&crashed).unwrap();

        let recovered = store.recover_interrupted_run().unwrap().unwrap();
        assert!(!recovered.running);
        assert_eq!(recovered.files_checked, 120);

        let current = store.current_stats().unwrap().unwrap();
        assert!(!current.running);
        assert_eq!(current.hash_matches, 100);
        assert_eq!(current.sonarr_submissions, 2);

        let history = store.stats_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].stats, current);

        // Already repaired.
        assert_eq!(store.recover_interrupted_run().unwrap(), None);
    }
}
