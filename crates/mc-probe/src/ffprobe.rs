//! [`ContainerProber`] backed by the `ffprobe` and `ffmpeg` executables.
//!
//! `ffprobe -print_format json` output is stable and well documented, so the
//! tools are driven as subprocesses rather than linked.

use std::process::Stdio;

use async_trait::async_trait;
use camino::Utf8Path;
use mc_core::{CodecType, MediaMetadata, MediaStream, ProbeConfig};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{ContainerProber, DecodeMode, DecodeOutcome, ProbeError};

/// ffprobe JSON output structures.
mod dto {
    use std::collections::HashMap;

    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct Output {
        pub format: Option<Format>,
        #[serde(default)]
        pub streams: Vec<Stream>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Format {
        pub format_name: Option<String>,
        pub format_long_name: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Stream {
        pub codec_name: Option<String>,
        pub codec_type: Option<String>,
        pub tags: Option<HashMap<String, String>>,
    }
}

/// Probes with `ffprobe` and decode-scans with `ffmpeg`.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use mc_probe::{ContainerProber, FfmpegProber};
///
/// # async fn example() -> Result<(), mc_probe::ProbeError> {
/// let prober = FfmpegProber::new();
/// let metadata = prober.probe(Utf8Path::new("/tv/Show/S01E01.mkv")).await?;
/// println!("{} streams", metadata.streams.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FfmpegProber {
    ffprobe_path: String,
    ffmpeg_path: String,
}

impl Default for FfmpegProber {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegProber {
    /// Creates a prober that finds both tools on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ffprobe_path: "ffprobe".to_owned(),
            ffmpeg_path: "ffmpeg".to_owned(),
        }
    }

    /// Creates a prober from configuration.
    #[must_use]
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new()
            .with_ffprobe_path(&config.ffprobe_path)
            .with_ffmpeg_path(&config.ffmpeg_path)
    }

    /// Sets the `ffprobe` executable.
    #[must_use]
    pub fn with_ffprobe_path(mut self, path: impl Into<String>) -> Self {
        self.ffprobe_path = path.into();
        self
    }

    /// Sets the `ffmpeg` executable.
    #[must_use]
    pub fn with_ffmpeg_path(mut self, path: impl Into<String>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Returns `true` if `ffprobe -version` runs successfully.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.ffprobe_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|status| status.success())
    }
}

#[async_trait]
impl ContainerProber for FfmpegProber {
    async fn probe(&self, path: &Utf8Path) -> Result<MediaMetadata, ProbeError> {
        debug!(path = %path, "Probing container");

        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error"])
            .args(["-print_format", "json"])
            .args(["-show_format", "-show_streams"])
            .arg(path.as_str())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProbeError::spawn(&self.ffprobe_path, source))?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                tool: self.ffprobe_path.clone(),
                path: path.to_owned(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let parsed: dto::Output =
            serde_json::from_slice(&output.stdout).map_err(|source| ProbeError::Parse {
                path: path.to_owned(),
                source,
            })?;

        let metadata = into_metadata(parsed);
        debug!(
            path = %path,
            format = %metadata.format_name,
            streams = metadata.streams.len(),
            "Probe complete"
        );
        Ok(metadata)
    }

    async fn decode_scan(&self, path: &Utf8Path, mode: DecodeMode) -> Result<DecodeOutcome, ProbeError> {
        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(["-hide_banner", "-nostdin", "-v", "error", "-i"])
            .arg(path.as_str());
        if let DecodeMode::Quick { seconds } = mode {
            command.arg("-t").arg(seconds.to_string());
        }
        command
            .args(["-f", "null", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(path = %path, mode = mode.label(), "Running decode scan");
        let mut child = command
            .spawn()
            .map_err(|source| ProbeError::spawn(&self.ffmpeg_path, source))?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProbeError::io(path, std::io::Error::other("stderr was not captured")))?;

        // Drained concurrently so text flushed before a timeout survives the kill.
        let reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await.map(|_| buf)
        });

        let status = match mode.time_box() {
            Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
            None => Some(child.wait().await),
        };

        if status.is_none() {
            if let Err(err) = child.kill().await {
                warn!(path = %path, error = %err, "Failed to kill timed out decoder");
            }
        }

        let stderr = reader
            .await
            .map_err(|err| ProbeError::io(path, std::io::Error::other(err)))?
            .map_err(|source| ProbeError::io(path, source))?;
        let text = String::from_utf8_lossy(&stderr).trim().to_owned();

        let Some(status) = status else {
            debug!(path = %path, mode = mode.label(), "Decode scan timed out");
            return Ok(DecodeOutcome::TimedOut {
                diagnostics: (!text.is_empty()).then_some(text),
            });
        };
        let status = status.map_err(|source| ProbeError::io(path, source))?;

        if !text.is_empty() {
            return Ok(DecodeOutcome::Diagnostics(text));
        }

        if status.success() {
            Ok(DecodeOutcome::Clean)
        } else {
            Err(ProbeError::Failed {
                tool: self.ffmpeg_path.clone(),
                path: path.to_owned(),
                code: status.code(),
                stderr: text,
            })
        }
    }
}

fn into_metadata(output: dto::Output) -> MediaMetadata {
    let (format_name, format_long_name) = output
        .format
        .map(|format| (format.format_name.unwrap_or_default(), format.format_long_name))
        .unwrap_or_default();

    let mut metadata = MediaMetadata::new(format_name);
    metadata.format_long_name = format_long_name;
    metadata.streams = output
        .streams
        .into_iter()
        .map(|stream| {
            let language = stream
                .tags
                .and_then(|mut tags| tags.remove("language"))
                .filter(|lang| !lang.is_empty());
            MediaStream {
                codec_type: CodecType::from_probe(stream.codec_type.as_deref().unwrap_or_default()),
                codec_name: stream.codec_name.unwrap_or_default(),
                language,
            }
        })
        .collect();
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "h264", "codec_type": "video", "tags": {"language": "eng"}},
            {"index": 1, "codec_name": "aac", "codec_type": "audio", "tags": {"language": "jpn", "title": "Main"}},
            {"index": 2, "codec_name": "subrip", "codec_type": "subtitle"},
            {"index": 3, "codec_type": "attachment", "tags": {"language": ""}}
        ],
        "format": {
            "filename": "/tv/Show/S01E01.mkv",
            "format_name": "matroska,webm",
            "format_long_name": "Matroska / WebM",
            "duration": "1420.5"
        }
    }"#;

    #[test]
    fn test_into_metadata() {
        let output: dto::Output = serde_json::from_str(SAMPLE).unwrap();
        let metadata = into_metadata(output);

        assert_eq!(metadata.format_name, "matroska,webm");
        assert_eq!(metadata.format_long_name.as_deref(), Some("Matroska / WebM"));
        assert_eq!(metadata.streams.len(), 4);
        assert_eq!(metadata.streams[0].codec_type, CodecType::Video);
        assert_eq!(metadata.streams[1].codec_name, "aac");
        assert_eq!(metadata.streams[1].language.as_deref(), Some("jpn"));
        assert_eq!(metadata.streams[2].codec_type, CodecType::Other);
        assert!(metadata.streams[2].language.is_none());
        assert_eq!(metadata.streams[3].codec_name, "");
        assert!(metadata.streams[3].language.is_none());
    }

    #[test]
    fn test_into_metadata_without_format_or_streams() {
        let output: dto::Output = serde_json::from_str("{}").unwrap();
        let metadata = into_metadata(output);
        assert_eq!(metadata.format_name, "");
        assert!(metadata.streams.is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = ProbeConfig {
            ffprobe_path: "/opt/ffmpeg/bin/ffprobe".to_owned(),
            ffmpeg_path: "/opt/ffmpeg/bin/ffmpeg".to_owned(),
            ..ProbeConfig::default()
        };
        let prober = FfmpegProber::from_config(&config);
        assert_eq!(prober.ffprobe_path, "/opt/ffmpeg/bin/ffprobe");
        assert_eq!(prober.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
    }

    #[cfg(unix)]
    mod stub_tools {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        use camino::Utf8PathBuf;

        use super::*;

        fn stub(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
            let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap();
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.into_string()
        }

        // Process-spawning checks share one test to keep forks sequential.
        #[tokio::test]
        async fn test_stub_tools() {
            let dir = tempfile::tempdir().unwrap();
            let media = Utf8Path::new("/library/movie.mkv");
            let full = DecodeMode::Full { timeout: None };
            let boxed = DecodeMode::Full {
                timeout: Some(Duration::from_millis(300)),
            };

            let probe_ok = stub(
                &dir,
                "probe_ok",
                r#"printf '%s' '{"format":{"format_name":"mp3"},"streams":[{"codec_name":"mp3","codec_type":"audio"}]}'"#,
            );
            let metadata = FfmpegProber::new()
                .with_ffprobe_path(probe_ok)
                .probe(media)
                .await
                .unwrap();
            assert_eq!(metadata.format_name, "mp3");
            assert!(metadata.has_audio());

            let probe_bad = stub(&dir, "probe_bad", "echo 'Invalid data found' >&2\nexit 1");
            let err = FfmpegProber::new()
                .with_ffprobe_path(probe_bad)
                .probe(media)
                .await
                .unwrap_err();
            assert!(matches!(err, ProbeError::Failed { code: Some(1), .. }));
            assert!(!err.is_tool_failure());

            let clean = stub(&dir, "clean", "exit 0");
            let outcome = FfmpegProber::new()
                .with_ffmpeg_path(clean)
                .decode_scan(media, full)
                .await
                .unwrap();
            assert_eq!(outcome, DecodeOutcome::Clean);

            let noisy = stub(&dir, "noisy", "echo 'corrupt decoded frame' >&2");
            let outcome = FfmpegProber::new()
                .with_ffmpeg_path(noisy)
                .decode_scan(media, DecodeMode::Quick { seconds: 5 })
                .await
                .unwrap();
            assert_eq!(outcome, DecodeOutcome::Diagnostics("corrupt decoded frame".to_owned()));

            let slow = stub(&dir, "slow", "exec sleep 10");
            let outcome = FfmpegProber::new()
                .with_ffmpeg_path(slow)
                .decode_scan(media, boxed)
                .await
                .unwrap();
            assert_eq!(outcome, DecodeOutcome::TimedOut { diagnostics: None });

            let slow_noisy = stub(&dir, "slow_noisy", "echo 'early error' >&2\nexec sleep 10");
            let outcome = FfmpegProber::new()
                .with_ffmpeg_path(slow_noisy)
                .decode_scan(media, boxed)
                .await
                .unwrap();
            assert_eq!(
                outcome,
                DecodeOutcome::TimedOut {
                    diagnostics: Some("early error".to_owned())
                }
            );

            let missing = dir.path().join("missing").to_string_lossy().into_owned();
            let err = FfmpegProber::new()
                .with_ffmpeg_path(missing)
                .decode_scan(media, full)
                .await
                .unwrap_err();
            assert!(err.is_tool_failure());
        }
    }
}
