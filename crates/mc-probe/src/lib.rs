//! Content classification and container probing for mediacheck.
//!
//! This crate answers two questions about a file:
//!
//! 1. **What is it?** [`classify`] sniffs a bounded prefix and returns a
//!    [`ContentKind`](mc_core::ContentKind).
//! 2. **What is inside?** A [`ContainerProber`] extracts container and stream
//!    metadata, and can decode the stream looking for decoder errors.
//!
//! [`FfmpegProber`] implements [`ContainerProber`] on top of the `ffprobe` and
//! `ffmpeg` command-line tools.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────────────┐
//! │ read_prefix  │───►│ classify             │──► ContentKind
//! └──────────────┘    └──────────────────────┘
//!
//! ┌──────────────────────────────────────────┐
//! │ ContainerProber (trait)                  │
//! │  probe(path)        ──► MediaMetadata    │
//! │  decode_scan(path)  ──► DecodeOutcome    │
//! └──────────────────────────────────────────┘
//!                ▲
//!                │
//!        FfmpegProber (ffprobe / ffmpeg)
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod classify;
pub mod error;
pub mod ffprobe;

use std::time::Duration;

use async_trait::async_trait;
use camino::Utf8Path;
use mc_core::MediaMetadata;

pub use classify::{PREFIX_LEN, classify, read_prefix};
pub use error::ProbeError;
pub use ffprobe::FfmpegProber;

/// Extra time allowed beyond the decoded duration of a quick scan.
pub const QUICK_SCAN_GRACE: Duration = Duration::from_secs(10);

/// How much of a stream a decode scan covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Decode the first `seconds` of the stream.
    Quick {
        /// Decoded duration.
        seconds: u64,
    },
    /// Decode the whole stream.
    Full {
        /// Optional time box; unbounded when `None`.
        timeout: Option<Duration>,
    },
}

impl DecodeMode {
    /// Returns the time box for this mode, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use mc_probe::DecodeMode;
    ///
    /// assert_eq!(DecodeMode::Quick { seconds: 30 }.time_box(), Some(Duration::from_secs(40)));
    /// assert_eq!(DecodeMode::Full { timeout: None }.time_box(), None);
    /// ```
    #[must_use]
    pub fn time_box(self) -> Option<Duration> {
        match self {
            Self::Quick { seconds } => Some(Duration::from_secs(seconds) + QUICK_SCAN_GRACE),
            Self::Full { timeout } => timeout,
        }
    }

    /// Returns a short label for logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Quick { .. } => "quick",
            Self::Full { .. } => "full",
        }
    }
}

/// The result of a decode scan that ran to completion or was time-boxed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// The decoder finished without reporting anything.
    Clean,
    /// The decoder reported errors.
    Diagnostics(String),
    /// The time box expired and the decoder was killed.
    TimedOut {
        /// Error text the decoder flushed before it was killed.
        diagnostics: Option<String>,
    },
}

impl DecodeOutcome {
    /// Returns the decoder's error text, if any was produced.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Clean | Self::TimedOut { diagnostics: None } => None,
            Self::Diagnostics(text) | Self::TimedOut { diagnostics: Some(text) } => Some(text),
        }
    }
}

/// Extracts container metadata and checks decodability.
///
/// Implementations must be cheap to share: the scanner holds one behind an
/// `Arc` for the lifetime of the process.
#[async_trait]
pub trait ContainerProber: Send + Sync {
    /// Reads container format and stream metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] if the tool cannot be run or rejects the file.
    async fn probe(&self, path: &Utf8Path) -> Result<MediaMetadata, ProbeError>;

    /// Decodes the stream and reports any decoder error output.
    ///
    /// A time box that expires yields [`DecodeOutcome::TimedOut`], not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] if the decoder cannot be started or its output
    /// cannot be trusted.
    async fn decode_scan(&self, path: &Utf8Path, mode: DecodeMode) -> Result<DecodeOutcome, ProbeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_scan_time_box() {
        let mode = DecodeMode::Full {
            timeout: Some(Duration::from_secs(600)),
        };
        assert_eq!(mode.time_box(), Some(Duration::from_secs(600)));
        assert_eq!(mode.label(), "full");
    }

    #[test]
    fn test_outcome_diagnostics() {
        assert_eq!(DecodeOutcome::Clean.diagnostics(), None);
        assert_eq!(DecodeOutcome::TimedOut { diagnostics: None }.diagnostics(), None);
        assert_eq!(
            DecodeOutcome::Diagnostics("bad frame".to_owned()).diagnostics(),
            Some("bad frame")
        );
        assert_eq!(
            DecodeOutcome::TimedOut {
                diagnostics: Some("partial".to_owned())
            }
            .diagnostics(),
            Some("partial")
        );
    }
}
