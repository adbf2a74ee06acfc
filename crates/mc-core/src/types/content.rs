//! Content kind sniffed from a file's leading bytes.

use serde::{Deserialize, Serialize};

/// The broad type of a file, decided from its header bytes alone.
///
/// # Examples
///
/// ```
/// use mc_core::ContentKind;
///
/// assert!(ContentKind::Video.is_media());
/// assert!(ContentKind::PlainText.is_non_media());
/// assert!(!ContentKind::Unknown.is_non_media());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// A video container (Matroska, MP4, AVI, MPEG-TS, ...).
    Video,
    /// An audio container (MP3, FLAC, Ogg, ...).
    Audio,
    /// A still image.
    Image,
    /// An office document or ebook.
    Document,
    /// Human-readable text (subtitles, NFO files, ...).
    PlainText,
    /// Nothing recognizable.
    Unknown,
}

impl ContentKind {
    /// Returns `true` for kinds that are probed and policy-checked.
    #[inline]
    #[must_use]
    pub const fn is_media(self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }

    /// Returns `true` for recognized kinds that are never policy-checked.
    #[inline]
    #[must_use]
    pub const fn is_non_media(self) -> bool {
        matches!(self, Self::Image | Self::Document | Self::PlainText)
    }

    /// Returns a human-readable label for this kind.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Video => "Video",
            Self::Audio => "Audio",
            Self::Image => "Image",
            Self::Document => "Document",
            Self::PlainText => "Text",
            Self::Unknown => "Unknown",
        }
    }
}
