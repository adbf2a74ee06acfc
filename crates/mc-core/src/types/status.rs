//! Policy verdicts and failure reasons.
//!
//! [`FailureReason`] is a closed set internally. It crosses the storage and
//! notification boundaries as its legacy string form (`"video codec"`,
//! `"audio lang"`, ...) so existing databases keep reading back.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a file was judged bad.
///
/// # Examples
///
/// ```
/// use mc_core::FailureReason;
///
/// assert_eq!(FailureReason::VideoCodec.as_str(), "video codec");
/// assert_eq!(FailureReason::from("audio lang"), FailureReason::AudioLanguage);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FailureReason {
    /// The container could not be probed.
    DataProblem,
    /// Audio is required but the container has no audio stream.
    NoAudioStreams,
    /// A stream uses a banned video codec.
    VideoCodec,
    /// A stream uses a banned audio codec.
    AudioCodec,
    /// A stream carries a banned language tag.
    AudioLanguage,
    /// An audio file has no audio stream at all.
    NoAudioInVideo,
    /// The content type could not be recognized.
    NotRecognized,
    /// The decoder reported errors while decoding the stream.
    DecodeError,
    /// A reason string this build does not know (read back from storage).
    Other(String),
}

impl FailureReason {
    /// Returns the persisted string form of this reason.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::DataProblem => "data problem",
            Self::NoAudioStreams => "no audio streams",
            Self::VideoCodec => "video codec",
            Self::AudioCodec => "audio codec",
            Self::AudioLanguage => "audio lang",
            Self::NoAudioInVideo => "no audio in video",
            Self::NotRecognized => "not recognized",
            Self::DecodeError => "decode error",
            Self::Other(reason) => reason,
        }
    }
}

impl From<String> for FailureReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "data problem" => Self::DataProblem,
            "no audio streams" => Self::NoAudioStreams,
            "video codec" => Self::VideoCodec,
            "audio codec" => Self::AudioCodec,
            "audio lang" => Self::AudioLanguage,
            "no audio in video" => Self::NoAudioInVideo,
            "not recognized" => Self::NotRecognized,
            "decode error" => Self::DecodeError,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for FailureReason {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<FailureReason> for String {
    fn from(value: FailureReason) -> Self {
        match value {
            FailureReason::Other(reason) => reason,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of evaluating one file against the configured policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The file is healthy (or intentionally not checked).
    Pass,
    /// The file is bad for the given reason.
    Fail(FailureReason),
}

impl Verdict {
    /// Returns `true` for [`Verdict::Pass`].
    #[inline]
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Returns the failure reason, if any.
    #[must_use]
    pub const fn reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Pass => None,
            Self::Fail(reason) => Some(reason),
        }
    }
}
