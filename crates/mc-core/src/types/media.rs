//! Container and stream metadata.
//!
//! [`MediaMetadata`] is the prober-independent view of a container: its
//! format name and the streams in declaration order. Stream order matters
//! to the policy rules, which report the first violation they encounter.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// The type of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecType {
    /// A video stream.
    Video,
    /// An audio stream.
    Audio,
    /// Subtitles, attachments, data streams and anything else.
    Other,
}

impl CodecType {
    /// Maps a prober `codec_type` string onto a [`CodecType`].
    ///
    /// # Examples
    ///
    /// ```
    /// use mc_core::CodecType;
    ///
    /// assert_eq!(CodecType::from_probe("audio"), CodecType::Audio);
    /// assert_eq!(CodecType::from_probe("subtitle"), CodecType::Other);
    /// ```
    #[must_use]
    pub fn from_probe(value: &str) -> Self {
        match value {
            "video" => Self::Video,
            "audio" => Self::Audio,
            _ => Self::Other,
        }
    }
}

/// One elementary stream of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStream {
    /// Stream type.
    pub codec_type: CodecType,
    /// Codec short name as reported by the prober (`h264`, `aac`, ...).
    pub codec_name: String,
    /// Language tag, when the container declares one.
    pub language: Option<String>,
}

impl MediaStream {
    /// Creates a stream without a language tag.
    #[must_use]
    pub fn new(codec_type: CodecType, codec_name: impl Into<String>) -> Self {
        Self {
            codec_type,
            codec_name: codec_name.into(),
            language: None,
        }
    }

    /// Sets the language tag.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Container metadata extracted by a prober.
///
/// # Examples
///
/// ```
/// use mc_core::{CodecType, MediaMetadata, MediaStream};
///
/// let metadata = MediaMetadata::new("matroska,webm")
///     .with_stream(MediaStream::new(CodecType::Video, "h264"))
///     .with_stream(MediaStream::new(CodecType::Audio, "aac").with_language("eng"));
///
/// assert!(metadata.has_audio());
/// assert_eq!(metadata.streams.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Container format short name.
    pub format_name: String,
    /// Container format long name, if reported.
    pub format_long_name: Option<String>,
    /// Streams in the order the container declares them.
    pub streams: SmallVec<[MediaStream; 4]>,
}

impl MediaMetadata {
    /// Creates metadata with no streams.
    #[must_use]
    pub fn new(format_name: impl Into<String>) -> Self {
        Self {
            format_name: format_name.into(),
            format_long_name: None,
            streams: SmallVec::new(),
        }
    }

    /// Appends a stream.
    #[must_use]
    pub fn with_stream(mut self, stream: MediaStream) -> Self {
        self.streams.push(stream);
        self
    }

    /// Returns `true` if any stream is an audio stream.
    #[must_use]
    pub fn has_audio(&self) -> bool {
        self.streams
            .iter()
            .any(|s| s.codec_type == CodecType::Audio)
    }

    /// Iterates over the audio streams in declaration order.
    pub fn audio_streams(&self) -> impl Iterator<Item = &MediaStream> {
        self.streams
            .iter()
            .filter(|s| s.codec_type == CodecType::Audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_audio() {
        let video_only = MediaMetadata::new("mp4").with_stream(MediaStream::new(CodecType::Video, "hevc"));
        assert!(!video_only.has_audio());

        let with_audio = video_only.with_stream(MediaStream::new(CodecType::Audio, "eac3"));
        assert!(with_audio.has_audio());
        assert_eq!(with_audio.audio_streams().count(), 1);
    }

    #[test]
    fn test_codec_type_from_probe() {
        assert_eq!(CodecType::from_probe("video"), CodecType::Video);
        assert_eq!(CodecType::from_probe("audio"), CodecType::Audio);
        assert_eq!(CodecType::from_probe("attachment"), CodecType::Other);
        assert_eq!(CodecType::from_probe(""), CodecType::Other);
    }

    #[test]
    fn test_stream_order_is_preserved() {
        let metadata = MediaMetadata::new("matroska")
            .with_stream(MediaStream::new(CodecType::Audio, "dts"))
            .with_stream(MediaStream::new(CodecType::Video, "h264"))
            .with_stream(MediaStream::new(CodecType::Other, "subrip"));

        let names: Vec<&str> = metadata.streams.iter().map(|s| s.codec_name.as_str()).collect();
        assert_eq!(names, ["dts", "h264", "subrip"]);
    }
}
