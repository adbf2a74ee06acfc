//! The policy engine.
//!
//! [`PolicyEngine::evaluate`] turns a content kind and the prober's view of
//! a container into a [`Verdict`]. Rules run in a fixed order and the first
//! failing rule wins:
//!
//! | # | applies to | condition | reason |
//! |---|------------|-----------|--------|
//! | 1 | video, audio | probing failed | `data problem` |
//! | 2 | video, audio | audio required, no audio stream | `no audio streams` |
//! | 3 | video | per stream: banned video codec, banned audio codec, banned language | `video codec`, `audio codec`, `audio lang` |
//! | 4 | audio | no audio stream; else per stream banned audio codec | `no audio in video`, `audio codec` |
//! | 5 | image, document, text | none | pass |
//! | 6 | unknown | always | `not recognized` |
//!
//! Streams are visited in the order the prober reports them, so when several
//! rules are violated the reported reason is reproducible.

use mc_core::{ContentKind, FailureReason, MediaMetadata, PolicyConfig, Verdict};
use mc_probe::DecodeOutcome;
use rustc_hash::FxHashSet;
use tracing::debug;

/// What the metadata probe produced for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The container was probed.
    Metadata(MediaMetadata),
    /// The prober rejected the container.
    Failed,
    /// Metadata probing is disabled.
    Skipped,
}

/// Evaluates files against the configured codec and language rules.
///
/// # Examples
///
/// ```
/// use mc_core::{CodecType, ContentKind, FailureReason, MediaMetadata, MediaStream, PolicyConfig, Verdict};
/// use mc_scanner::{PolicyEngine, ProbeOutcome};
///
/// let engine = PolicyEngine::new(&PolicyConfig {
///     banned_video_codecs: vec!["mpeg2video".to_owned()],
///     ..PolicyConfig::default()
/// });
/// let metadata = MediaMetadata::new("matroska,webm")
///     .with_stream(MediaStream::new(CodecType::Video, "mpeg2video"));
///
/// assert_eq!(
///     engine.evaluate(ContentKind::Video, &ProbeOutcome::Metadata(metadata)),
///     Verdict::Fail(FailureReason::VideoCodec)
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    banned_video_codecs: FxHashSet<String>,
    banned_audio_codecs: FxHashSet<String>,
    banned_languages: FxHashSet<String>,
    require_audio: bool,
}

impl PolicyEngine {
    /// Builds an engine from the `policy` section.
    #[must_use]
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            banned_video_codecs: config.banned_video_codecs.iter().cloned().collect(),
            banned_audio_codecs: config.banned_audio_codecs.iter().cloned().collect(),
            banned_languages: config.banned_languages.iter().cloned().collect(),
            require_audio: config.require_audio,
        }
    }

    /// Returns the verdict for one file.
    #[must_use]
    pub fn evaluate(&self, kind: ContentKind, probe: &ProbeOutcome) -> Verdict {
        match kind {
            ContentKind::Image | ContentKind::Document | ContentKind::PlainText => return Verdict::Pass,
            ContentKind::Unknown => return Verdict::Fail(FailureReason::NotRecognized),
            ContentKind::Video | ContentKind::Audio => {}
        }

        let metadata = match probe {
            ProbeOutcome::Metadata(metadata) => metadata,
            ProbeOutcome::Failed => return Verdict::Fail(FailureReason::DataProblem),
            ProbeOutcome::Skipped => return Verdict::Pass,
        };

        if self.require_audio && !metadata.has_audio() {
            return Verdict::Fail(FailureReason::NoAudioStreams);
        }

        let failure = if kind == ContentKind::Video {
            self.check_video(metadata)
        } else {
            self.check_audio(metadata)
        };
        failure.map_or(Verdict::Pass, Verdict::Fail)
    }

    fn check_video(&self, metadata: &MediaMetadata) -> Option<FailureReason> {
        for stream in &metadata.streams {
            if self.banned_video_codecs.contains(&stream.codec_name) {
                return Some(FailureReason::VideoCodec);
            }
            if self.banned_audio_codecs.contains(&stream.codec_name) {
                return Some(FailureReason::AudioCodec);
            }
            match &stream.language {
                Some(language) if self.banned_languages.contains(language) => {
                    return Some(FailureReason::AudioLanguage);
                }
                None if !self.banned_languages.is_empty() => {
                    debug!(codec = %stream.codec_name, "Stream has no language tag");
                }
                _ => {}
            }
        }
        None
    }

    fn check_audio(&self, metadata: &MediaMetadata) -> Option<FailureReason> {
        if !metadata.has_audio() {
            return Some(FailureReason::NoAudioInVideo);
        }
        metadata
            .streams
            .iter()
            .any(|stream| self.banned_audio_codecs.contains(&stream.codec_name))
            .then_some(FailureReason::AudioCodec)
    }
}

/// Returns the verdict for a finished decode scan.
///
/// A time box that expired before the decoder printed anything is
/// inconclusive and passes.
#[must_use]
pub fn decode_verdict(outcome: &DecodeOutcome) -> Verdict {
    match outcome.diagnostics() {
        Some(text) if !text.trim().is_empty() => Verdict::Fail(FailureReason::DecodeError),
        _ => Verdict::Pass,
    }
}
