//! Error types for the mc-probe crate.

use camino::Utf8PathBuf;

/// Errors raised while probing or decoding a media file.
///
/// # Error Recovery Strategy
///
/// - **Tool failures** ([`ProbeError::Spawn`]): the external program could not be
///   run at all. Its absence says nothing about the file; the step is skipped.
/// - **Content failures** ([`ProbeError::Failed`], [`ProbeError::Parse`]): the
///   prober ran and rejected the file. The caller treats this as an integrity
///   failure ("data problem").
/// - **I/O failures** ([`ProbeError::Io`]): reading the tool's output failed.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The external tool could not be started.
    #[error("failed to run {tool}: {source}")]
    Spawn {
        /// Program that failed to start.
        tool: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The prober exited unsuccessfully.
    #[error("{tool} rejected {path} (exit code {}): {stderr}", code.map_or_else(|| "none".to_owned(), |c| c.to_string()))]
    Failed {
        /// Program that reported the failure.
        tool: String,
        /// File being probed.
        path: Utf8PathBuf,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Trimmed standard error output.
        stderr: String,
    },

    /// The prober output could not be parsed.
    #[error("failed to parse prober output for {path}: {source}")]
    Parse {
        /// File being probed.
        path: Utf8PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Communicating with the child process failed.
    #[error("I/O error while probing {path}: {source}")]
    Io {
        /// File being probed.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ProbeError {
    /// Creates a new [`ProbeError::Spawn`] error.
    #[inline]
    pub fn spawn(tool: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            tool: tool.into(),
            source,
        }
    }

    /// Creates a new [`ProbeError::Io`] error.
    #[inline]
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the tool itself could not be used.
    ///
    /// Tool failures must never be mistaken for file corruption.
    #[inline]
    #[must_use]
    pub const fn is_tool_failure(&self) -> bool {
        matches!(self, Self::Spawn { .. } | Self::Io { .. })
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Failed { path, .. } | Self::Parse { path, .. } | Self::Io { path, .. } => {
                Some(path)
            }
            Self::Spawn { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_is_tool_failure() {
        let err = ProbeError::spawn(
            "ffmpeg",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert!(err.is_tool_failure());
        assert!(err.path().is_none());
        assert!(err.to_string().contains("ffmpeg"));
    }

    #[test]
    fn test_failed_is_content_failure() {
        let err = ProbeError::Failed {
            tool: "ffprobe".to_owned(),
            path: Utf8PathBuf::from("/tv/broken.mkv"),
            code: Some(1),
            stderr: "Invalid data found when processing input".to_owned(),
        };
        assert!(!err.is_tool_failure());
        assert_eq!(err.path().map(|p| p.as_str()), Some("/tv/broken.mkv"));
        let text = err.to_string();
        assert!(text.contains("exit code 1"));
        assert!(text.contains("Invalid data"));
    }

    #[test]
    fn test_failed_without_exit_code() {
        let err = ProbeError::Failed {
            tool: "ffprobe".to_owned(),
            path: Utf8PathBuf::from("/tv/a.mkv"),
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("exit code none"));
    }
}
