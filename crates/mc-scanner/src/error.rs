//! Error types for the mc-scanner crate.
//!
//! This module provides the [`ScanError`] type for errors raised while
//! walking configured roots and driving files through the pipeline.

use camino::Utf8PathBuf;

/// Errors that can occur during a scan run.
///
/// # Error Recovery Strategy
///
/// - **Store errors** ([`ScanError::Store`]): Fatal - the fingerprint state
///   can no longer be trusted, the run stops
/// - **Configuration errors** ([`ScanError::Config`]): Fatal - raised before
///   a run starts
/// - **Walk errors** ([`ScanError::Walk`]): Stop the affected root only;
///   sibling roots still run
/// - **File errors** ([`ScanError::Read`], [`ScanError::NonUtf8Path`]): Log
///   warning, skip file, continue scan
/// - **Audit errors** ([`ScanError::Audit`]): Log warning, continue without
///   the audit sink
///
/// # Examples
///
/// ```
/// use mc_scanner::ScanError;
///
/// fn handle(err: &ScanError) -> &'static str {
///     if err.is_fatal() { "abort" } else { "continue" }
/// }
///
/// let err = ScanError::read("/tv/a.mkv", std::io::Error::other("gone"));
/// assert_eq!(handle(&err), "continue");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Traversal of a configured root failed.
    #[error("failed to walk {root}: {source}")]
    Walk {
        /// The configured root being walked.
        root: Utf8PathBuf,
        /// The underlying walker error.
        #[source]
        source: ignore::Error,
    },

    /// A file could not be read for hashing or classification.
    #[error("failed to read file {path}: {source}")]
    Read {
        /// The file that could not be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// The fingerprint store failed.
    #[error(transparent)]
    Store(#[from] mc_store::StoreError),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] mc_core::ConfigError),

    /// The audit CSV could not be opened or written.
    #[error("audit file {path}: {source}")]
    Audit {
        /// The audit file path.
        path: Utf8PathBuf,
        /// The underlying CSV error.
        #[source]
        source: csv::Error,
    },
}

impl ScanError {
    /// Creates a new [`ScanError::Read`] error.
    #[inline]
    pub fn read(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`ScanError::Walk`] error.
    #[inline]
    pub fn walk(root: impl Into<Utf8PathBuf>, source: ignore::Error) -> Self {
        Self::Walk {
            root: root.into(),
            source,
        }
    }

    /// Creates a new [`ScanError::Audit`] error.
    #[inline]
    pub fn audit(path: impl Into<Utf8PathBuf>, source: csv::Error) -> Self {
        Self::Audit {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this error stops the run.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Config(_))
    }

    /// Returns `true` if scanning can continue past this error.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Walk { root: path, .. } | Self::Read { path, .. } | Self::Audit { path, .. } => {
                Some(path)
            }
            Self::NonUtf8Path(_) | Self::Store(_) | Self::Config(_) => None,
        }
    }
}
