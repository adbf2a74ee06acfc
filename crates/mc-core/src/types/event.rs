//! Notification event kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of an outbound notification.
///
/// Notification channels are configured with an allow-list of these kinds.
/// The string forms are stable because they appear in configuration files
/// and webhook payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A scan run started.
    StartRun,
    /// A scan run finished.
    EndRun,
    /// A media manager was asked to reacquire a file.
    Reacquire,
    /// A file with an unrecognized content type was found.
    UnknownDetected,
    /// A bad file was recorded but no media manager acted on it.
    ManualReview,
}

impl EventKind {
    /// Returns the configuration/payload string form.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartRun => "startrun",
            Self::EndRun => "endrun",
            Self::Reacquire => "reacquire",
            Self::UnknownDetected => "unknowndetected",
            Self::ManualReview => "manualreview",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
