//! Persisted bad-file records.
//!
//! A [`BadFileRecord`] is written the first time a path fails classification
//! and overwritten on later failures. Records are keyed by path in the store;
//! the path itself is not part of the JSON value.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use super::status::FailureReason;

/// The external service that took responsibility for a bad file.
///
/// # Examples
///
/// ```
/// use mc_core::OwnerKind;
///
/// assert_eq!(OwnerKind::Radarr.as_str(), "radarr");
/// assert!(!OwnerKind::Unknown.is_service());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    /// A Sonarr (TV) instance.
    Sonarr,
    /// A Radarr (movies) instance.
    Radarr,
    /// A Lidarr (music) instance.
    Lidarr,
    /// No service claimed the file.
    Unknown,
}

impl OwnerKind {
    /// Returns the persisted string form.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sonarr => "sonarr",
            Self::Radarr => "radarr",
            Self::Lidarr => "lidarr",
            Self::Unknown => "unknown",
        }
    }

    /// Returns `true` for real media-manager services.
    #[inline]
    #[must_use]
    pub const fn is_service(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// The persisted audit entry for a file that failed classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadFileRecord {
    /// File extension including the leading dot, or empty.
    #[serde(rename = "fileExt")]
    pub file_extension: String,
    /// Whether a media manager was asked to reacquire the file.
    #[serde(rename = "reacquire")]
    pub reacquire_requested: bool,
    /// The service that acted on the file.
    #[serde(rename = "service")]
    pub owner_service: OwnerKind,
    /// When the record was written, in Unix seconds (UTC).
    #[serde(rename = "date")]
    pub timestamp: i64,
    /// Why the file was judged bad.
    pub reason: FailureReason,
}

impl BadFileRecord {
    /// Creates a record stamped with the current time.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use mc_core::{BadFileRecord, FailureReason, OwnerKind};
    ///
    /// let record = BadFileRecord::new(
    ///     Utf8Path::new("/tv/Show/S01E01.mkv"),
    ///     FailureReason::VideoCodec,
    ///     OwnerKind::Sonarr,
    /// );
    /// assert_eq!(record.file_extension, ".mkv");
    /// assert!(record.reacquire_requested);
    /// ```
    #[must_use]
    pub fn new(path: &Utf8Path, reason: FailureReason, owner: OwnerKind) -> Self {
        Self {
            file_extension: path
                .extension()
                .map(|ext| format!(".{ext}"))
                .unwrap_or_default(),
            reacquire_requested: owner.is_service(),
            owner_service: owner,
            timestamp: chrono::Utc::now().timestamp(),
            reason,
        }
    }
}

/// A bad-file record together with the path it is keyed by.
///
/// This is the element type of the bad-file listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadFileEntry {
    /// The file path.
    pub path: Utf8PathBuf,
    /// The stored record.
    #[serde(rename = "data")]
    pub record: BadFileRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_for_unknown_owner_does_not_request_reacquire() {
        let record = BadFileRecord::new(
            Utf8Path::new("/downloads/mystery.bin"),
            FailureReason::NotRecognized,
            OwnerKind::Unknown,
        );
        assert!(!record.reacquire_requested);
        assert_eq!(record.owner_service, OwnerKind::Unknown);
        assert_eq!(record.file_extension, ".bin");
    }

    #[test]
    fn test_record_without_extension() {
        let record = BadFileRecord::new(
            Utf8Path::new("/music/README"),
            FailureReason::NotRecognized,
            OwnerKind::Lidarr,
        );
        assert_eq!(record.file_extension, "");
    }

    #[test]
    fn test_record_json_shape() {
        let record = BadFileRecord {
            file_extension: ".mkv".to_owned(),
            reacquire_requested: true,
            owner_service: OwnerKind::Sonarr,
            timestamp: 1_700_000_000,
            reason: FailureReason::VideoCodec,
        };
        insta::assert_json_snapshot!(record, @r#"
        {
          "fileExt": ".mkv",
          "reacquire": true,
          "service": "sonarr",
          "date": 1700000000,
          "reason": "video codec"
        }
        "#);
    }

    #[test]
    fn test_owner_kind_ordering_matches_dispatch_priority() {
        let mut kinds = vec![OwnerKind::Lidarr, OwnerKind::Sonarr, OwnerKind::Radarr];
        kinds.sort();
        assert_eq!(kinds, [OwnerKind::Sonarr, OwnerKind::Radarr, OwnerKind::Lidarr]);
    }
}
