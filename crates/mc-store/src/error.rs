//! Error types for the mc-store crate.

use camino::Utf8PathBuf;

/// Errors that can occur while reading or writing the store.
///
/// # Error Recovery Strategy
///
/// - **Open failures** ([`StoreError::Open`]): fatal at startup.
/// - **Database failures** ([`StoreError::Database`]): fatal during a
///   fingerprint lookup, logged during record writes.
/// - **Bad index** ([`StoreError::IndexOutOfRange`]): a caller error; nothing
///   was changed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database could not be opened or initialized.
    #[error("failed to open store at {path}: {source}")]
    Open {
        /// Database location.
        path: Utf8PathBuf,
        /// The underlying database error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database operation failed.
    #[error("store operation failed: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored JSON value could not be encoded or decoded.
    #[error("failed to encode or decode stored record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A bad-file index does not refer to a listed entry.
    #[error("bad-file index {index} is out of range (1..={len})")]
    IndexOutOfRange {
        /// The offending 1-based index.
        index: usize,
        /// Number of listed entries.
        len: usize,
    },
}

impl StoreError {
    /// Creates a new [`StoreError::Open`] error.
    #[inline]
    pub fn open(path: impl Into<Utf8PathBuf>, source: rusqlite::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the store can no longer be trusted.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::Database(_))
    }
}
