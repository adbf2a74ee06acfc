//! Configuration structures for mediacheck.
//!
//! This module provides configuration types for every component:
//!
//! - [`CheckConfig`] - Scan roots, ignore rules, unknown-file handling, audit CSV
//! - [`PolicyConfig`] - Codec and language exclusion rules
//! - [`ProbeConfig`] - ffprobe/ffmpeg locations and decode-scan settings
//! - [`StoreConfig`] - Database location
//! - [`OwnerConfig`] - One media-manager connection (Sonarr, Radarr, Lidarr)
//! - [`NotificationsConfig`] - Outbound notification channels
//! - [`LoggingConfig`] - Optional log file
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] and deserialize with
//! `#[serde(default)]`, so a configuration file only needs the keys it changes.
//! [`Config::load`] layers an optional file under `MEDIACHECK_*` environment
//! variables.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{EventKind, OwnerKind};

/// Prefix for environment variable overrides (`MEDIACHECK_STORE__PATH=...`).
pub const ENV_PREFIX: &str = "MEDIACHECK";

/// File stem searched for when no configuration path is given.
pub const DEFAULT_CONFIG_STEM: &str = "mediacheck";

/// What to scan and what to skip.
///
/// # Examples
///
/// ```
/// use mc_core::CheckConfig;
///
/// let config = CheckConfig::default();
/// assert!(config.ignore_hidden);
/// assert!(!config.remove_unknown_files);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Library roots, scanned independently in order.
    pub paths: Vec<Utf8PathBuf>,

    /// Extensions to skip, matched case-insensitively (`.nfo` or `nfo`).
    pub ignore_extensions: Vec<String>,

    /// Substrings; any path containing one is skipped.
    pub ignore_paths: Vec<String>,

    /// Skip files whose name starts with a dot.
    pub ignore_hidden: bool,

    /// Delete unclaimed bad files from disk.
    ///
    /// Off by default: the deletion is unrecoverable.
    pub remove_unknown_files: bool,

    /// Optional CSV audit file receiving one `path,service` row per bad file.
    pub csv_file: Option<Utf8PathBuf>,

    /// Whether to follow symbolic links while walking.
    pub follow_links: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            ignore_extensions: vec![".txt".to_owned(), ".nfo".to_owned(), ".nzb".to_owned(), ".url".to_owned()],
            ignore_paths: Vec::new(),
            ignore_hidden: true,
            remove_unknown_files: false,
            csv_file: None,
            follow_links: false,
        }
    }
}

/// Codec and language exclusion rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Video codec names that make a file bad (`mpeg2video`, `msmpeg4v3`, ...).
    pub banned_video_codecs: Vec<String>,

    /// Audio codec names that make a file bad.
    pub banned_audio_codecs: Vec<String>,

    /// Language tags that make a file bad.
    pub banned_languages: Vec<String>,

    /// Fail media files that carry no audio stream.
    pub require_audio: bool,
}

/// External prober settings.
///
/// # Examples
///
/// ```
/// use mc_core::ProbeConfig;
///
/// let config = ProbeConfig::default();
/// assert!(config.ffprobe);
/// assert_eq!(config.quick_scan_seconds, 30);
/// assert!(config.full_scan_timeout_secs.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Probe container metadata for video and audio files.
    pub ffprobe: bool,

    /// Path or name of the `ffprobe` executable.
    pub ffprobe_path: String,

    /// Path or name of the `ffmpeg` executable.
    pub ffmpeg_path: String,

    /// Decode the first `quick_scan_seconds` of each media file.
    pub quick_scan: bool,

    /// Duration decoded by the quick scan.
    pub quick_scan_seconds: u64,

    /// Decode each media file in full.
    pub full_scan: bool,

    /// Optional time box for the full scan; unbounded when absent.
    pub full_scan_timeout_secs: Option<u64>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ffprobe: true,
            ffprobe_path: "ffprobe".to_owned(),
            ffmpeg_path: "ffmpeg".to_owned(),
            quick_scan: false,
            quick_scan_seconds: 30,
            full_scan: false,
            full_scan_timeout_secs: None,
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Location of the database file.
    pub path: Utf8PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: Utf8PathBuf::from("mediacheck.db"),
        }
    }
}

/// Rewrites a scanner-side path prefix into the media manager's namespace.
///
/// Used when the scanner and the manager mount the library at different
/// locations, e.g. `local = "/mnt/media/tv/"`, `manager = "/tv/"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    /// Prefix as the media manager reports it.
    pub manager: String,
    /// The same location as the scanner sees it.
    pub local: String,
}

/// One media-manager connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerConfig {
    /// Unique display name for logs.
    pub name: String,

    /// Which kind of manager this is.
    pub service: OwnerKind,

    /// Host name or address.
    pub address: String,

    /// TCP port.
    pub port: u16,

    /// URL base path, e.g. `/sonarr`.
    pub base_url: String,

    /// API key sent as `X-Api-Key`.
    pub api_key: String,

    /// Use HTTPS.
    pub ssl: bool,

    /// Whether this manager should act on bad files.
    pub process: bool,

    /// Path translation rules, tried in order.
    pub mappings: Vec<PathMapping>,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            service: OwnerKind::Unknown,
            address: "localhost".to_owned(),
            port: 0,
            base_url: String::new(),
            api_key: String::new(),
            ssl: false,
            process: true,
            mappings: Vec::new(),
        }
    }
}

impl OwnerConfig {
    /// Returns the base URL, `http[s]://address:port/base_url`, without a trailing slash.
    ///
    /// # Examples
    ///
    /// ```
    /// use mc_core::{OwnerConfig, OwnerKind};
    ///
    /// let config = OwnerConfig {
    ///     service: OwnerKind::Sonarr,
    ///     address: "nas.local".to_owned(),
    ///     port: 8989,
    ///     base_url: "/sonarr/".to_owned(),
    ///     ..OwnerConfig::default()
    /// };
    /// assert_eq!(config.base_url(), "http://nas.local:8989/sonarr");
    /// ```
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        let base = self.base_url.trim_matches('/');
        if base.is_empty() {
            format!("{scheme}://{}:{}", self.address, self.port)
        } else {
            format!("{scheme}://{}:{}/{base}", self.address, self.port)
        }
    }

    /// Returns the configured name, or the service name when unnamed.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.service.as_str()
        } else {
            &self.name
        }
    }
}

/// Notification channel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Generic JSON webhook.
    Webhook,
    /// Discord channel webhook.
    Discord,
}

/// One notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Channel type.
    pub kind: NotifierKind,
    /// Target URL.
    pub url: String,
    /// Event kinds this channel receives.
    #[serde(default)]
    pub events: Vec<EventKind>,
}

/// Outbound notification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Capacity of the background delivery queue.
    pub queue_capacity: usize,
    /// Configured channels.
    pub channels: Vec<NotifierConfig>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            channels: Vec::new(),
        }
    }
}

/// Log output settings beyond the console.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to this file.
    pub file: Option<Utf8PathBuf>,
    /// Default filter directive when `RUST_LOG` is unset (e.g. `info`).
    pub level: Option<String>,
}

/// Root configuration for mediacheck.
///
/// # Examples
///
/// ```
/// use mc_core::Config;
///
/// let config = Config::default();
/// assert!(config.owners.is_empty());
/// assert_eq!(config.store.path, "mediacheck.db");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scan settings.
    pub check: CheckConfig,

    /// Exclusion policy.
    pub policy: PolicyConfig,

    /// Prober settings.
    pub probe: ProbeConfig,

    /// Database settings.
    pub store: StoreConfig,

    /// Media managers, in declaration order.
    pub owners: Vec<OwnerConfig>,

    /// Notification channels.
    pub notifications: NotificationsConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from an optional file layered under environment variables.
    ///
    /// With `path = None`, a `mediacheck.{toml,yaml,json}` in the working
    /// directory is used if present. Environment variables use the
    /// `MEDIACHECK_` prefix and `__` as the section separator, e.g.
    /// `MEDIACHECK_STORE__PATH=/var/lib/mediacheck.db`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if an explicit file is missing or any
    /// source fails to parse or deserialize.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::with_name(path.as_str()).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_STEM).required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?;

        Ok(config)
    }

    /// Checks cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check.paths.is_empty() {
            return Err(ConfigError::invalid_option(
                "check.paths",
                "at least one scan root is required",
            ));
        }

        if self.store.path.as_str().is_empty() {
            return Err(ConfigError::InvalidPath {
                path: self.store.path.clone(),
                reason: "database path must not be empty".to_owned(),
            });
        }

        if self.probe.quick_scan && self.probe.quick_scan_seconds == 0 {
            return Err(ConfigError::invalid_option(
                "probe.quick_scan_seconds",
                "must be positive when quick scanning is enabled",
            ));
        }

        if self.notifications.queue_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "notifications.queue_capacity",
                "must be positive",
            ));
        }

        for channel in &self.notifications.channels {
            if channel.url.is_empty() {
                return Err(ConfigError::invalid_option(
                    "notifications.channels.url",
                    "must not be empty",
                ));
            }
        }

        let mut seen = Vec::with_capacity(self.owners.len());
        for owner in &self.owners {
            let name = owner.display_name();
            if !owner.service.is_service() {
                return Err(ConfigError::invalid_option(
                    format!("owners.{name}.service"),
                    "must be one of sonarr, radarr, lidarr",
                ));
            }
            if owner.process && owner.api_key.is_empty() {
                return Err(ConfigError::invalid_option(
                    format!("owners.{name}.api_key"),
                    "required when process is enabled",
                ));
            }
            if seen.contains(&name) {
                return Err(ConfigError::invalid_option(
                    format!("owners.{name}"),
                    "owner names must be unique",
                ));
            }
            seen.push(name);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn owner(name: &str, service: OwnerKind) -> OwnerConfig {
        OwnerConfig {
            name: name.to_owned(),
            service,
            port: 8989,
            api_key: "secret".to_owned(),
            ..OwnerConfig::default()
        }
    }

    fn valid() -> Config {
        let mut config = Config::default();
        config.check.paths.push(Utf8PathBuf::from("/media"));
        config
    }

    #[test]
    fn test_check_config_defaults() {
        let config = CheckConfig::default();
        assert!(config.paths.is_empty());
        assert!(config.ignore_hidden);
        assert!(!config.remove_unknown_files);
        assert!(config.csv_file.is_none());
        assert!(config.ignore_extensions.contains(&".nfo".to_owned()));
    }

    #[test]
    fn test_probe_config_defaults() {
        let config = ProbeConfig::default();
        assert!(config.ffprobe);
        assert!(!config.quick_scan);
        assert!(!config.full_scan);
        assert_eq!(config.ffmpeg_path, "ffmpeg");
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let json = r#"{"policy": {"banned_video_codecs": ["mpeg2video"]}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.policy.banned_video_codecs, vec!["mpeg2video"]);
        assert!(!config.policy.require_audio);
        assert_eq!(config.notifications.queue_capacity, 64);
        assert!(config.check.ignore_hidden);
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[check]
paths = ["/media/tv", "/media/movies"]
ignore_extensions = [".srt"]

[policy]
banned_languages = ["rus"]

[[owners]]
name = "tv"
service = "sonarr"
port = 8989
api_key = "abc"
mappings = [{{ manager = "/tv/", local = "/media/tv/" }}]

[[notifications.channels]]
kind = "webhook"
url = "http://hooks.local/media"
events = ["reacquire", "endrun"]
"#
        )
        .unwrap();
        file.flush().unwrap();

        let path = Utf8Path::from_path(file.path()).unwrap();
        let config = Config::load(Some(path)).unwrap();

        assert_eq!(config.check.paths.len(), 2);
        assert_eq!(config.check.ignore_extensions, vec![".srt"]);
        assert_eq!(config.policy.banned_languages, vec!["rus"]);
        assert_eq!(config.owners.len(), 1);
        assert_eq!(config.owners[0].service, OwnerKind::Sonarr);
        assert_eq!(config.owners[0].mappings[0].manager, "/tv/");
        assert!(config.owners[0].process);
        assert_eq!(
            config.notifications.channels[0].events,
            vec![EventKind::Reacquire, EventKind::EndRun]
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = Config::load(Some(Utf8Path::new("/nonexistent/mediacheck.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_validate_requires_scan_paths() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("check.paths"));
    }

    #[test]
    fn test_validate_rejects_missing_api_key() {
        let mut config = valid();
        let mut sonarr = owner("tv", OwnerKind::Sonarr);
        sonarr.api_key.clear();
        config.owners.push(sonarr);
        assert!(config.validate().unwrap_err().to_string().contains("api_key"));

        // A disabled owner does not need a key.
        config.owners[0].process = false;
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_duplicate_owner_names() {
        let mut config = valid();
        config.owners.push(owner("media", OwnerKind::Sonarr));
        config.owners.push(owner("media", OwnerKind::Radarr));
        assert!(config.validate().unwrap_err().to_string().contains("unique"));
    }

    #[test]
    fn test_validate_rejects_unknown_service() {
        let mut config = valid();
        config.owners.push(owner("mystery", OwnerKind::Unknown));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_quick_scan() {
        let mut config = valid();
        config.probe.quick_scan = true;
        config.probe.quick_scan_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_owner_base_url() {
        let mut config = owner("movies", OwnerKind::Radarr);
        config.port = 7878;
        config.ssl = true;
        assert_eq!(config.base_url(), "https://localhost:7878");
    }
}
