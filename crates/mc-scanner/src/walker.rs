//! Directory traversal and ignore rules.
//!
//! [`FileWalker`] collects the regular files under one configured root with
//! the `ignore` crate. Its VCS and dotfile filters are switched off: a media
//! library is walked in full and [`IgnoreRules`] decides what to skip.
//!
//! # Design
//!
//! The walker uses a "collect-then-process" pattern:
//! 1. Paths for one root are collected on a blocking thread
//! 2. The orchestrator then drives them through the pipeline one at a time
//!
//! A traversal error ends the root's walk. The files collected before the
//! error are still returned and processed.

use camino::{Utf8Path, Utf8PathBuf};
use ignore::WalkBuilder;
use mc_core::CheckConfig;
use rustc_hash::FxHashSet;
use tracing::warn;

use crate::error::ScanError;

/// Why a path was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The extension is on the ignore list.
    Extension,
    /// The file name starts with a dot.
    Hidden,
    /// The path contains an ignored substring.
    Path,
}

/// Filters applied to every file before any other work.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use mc_core::CheckConfig;
/// use mc_scanner::{IgnoreReason, IgnoreRules};
///
/// let rules = IgnoreRules::from_config(&CheckConfig::default());
/// assert_eq!(rules.check(Utf8Path::new("/tv/Show/info.NFO")), Some(IgnoreReason::Extension));
/// assert_eq!(rules.check(Utf8Path::new("/tv/Show/.S01E01.mkv")), Some(IgnoreReason::Hidden));
/// assert_eq!(rules.check(Utf8Path::new("/tv/Show/S01E01.mkv")), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    extensions: FxHashSet<String>,
    paths: Vec<String>,
    hidden: bool,
}

impl IgnoreRules {
    /// Builds the rules from the `check` section.
    ///
    /// Extensions are matched case-insensitively with or without a leading
    /// dot. Empty path substrings are dropped.
    #[must_use]
    pub fn from_config(config: &CheckConfig) -> Self {
        Self {
            extensions: config
                .ignore_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
            paths: config
                .ignore_paths
                .iter()
                .filter(|p| !p.is_empty())
                .cloned()
                .collect(),
            hidden: config.ignore_hidden,
        }
    }

    /// Returns the first rule that matches `path`, or `None` if the file
    /// should be checked.
    #[must_use]
    pub fn check(&self, path: &Utf8Path) -> Option<IgnoreReason> {
        if path
            .extension()
            .is_some_and(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
        {
            return Some(IgnoreReason::Extension);
        }
        if self.hidden && path.file_name().is_some_and(|name| name.starts_with('.')) {
            return Some(IgnoreReason::Hidden);
        }
        if self.paths.iter().any(|p| path.as_str().contains(p.as_str())) {
            return Some(IgnoreReason::Path);
        }
        None
    }
}

/// Files collected from one root.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Regular files in walk order.
    pub files: Vec<Utf8PathBuf>,
    /// The error that ended the walk early, if any.
    pub error: Option<ScanError>,
}

/// A walker over one configured scan root.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use mc_scanner::FileWalker;
///
/// let outcome = FileWalker::new(Utf8Path::new("/media/tv")).collect();
/// println!("found {} files", outcome.files.len());
/// ```
#[derive(Debug, Clone)]
pub struct FileWalker {
    root: Utf8PathBuf,
    follow_links: bool,
}

impl FileWalker {
    /// Creates a walker for `root`.
    #[must_use]
    pub fn new(root: &Utf8Path) -> Self {
        Self {
            root: root.to_owned(),
            follow_links: false,
        }
    }

    /// Configures whether to follow symbolic links.
    #[must_use]
    pub const fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Returns the root being walked.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Collects regular files in file-name order.
    ///
    /// Non-UTF-8 paths are skipped with a warning.
    pub fn collect(&self) -> WalkOutcome {
        let mut outcome = WalkOutcome::default();

        for result in self.build_walker() {
            let entry = match result {
                Ok(entry) => entry,
                Err(source) => {
                    outcome.error = Some(ScanError::walk(&self.root, source));
                    break;
                }
            };

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            match Utf8Path::from_path(entry.path()) {
                Some(path) => outcome.files.push(path.to_owned()),
                None => {
                    let err = ScanError::NonUtf8Path(entry.path().to_owned());
                    warn!(root = %self.root, error = %err, "Skipping file");
                }
            }
        }

        outcome
    }

    fn build_walker(&self) -> ignore::Walk {
        WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(self.follow_links)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Show/Season 1")).unwrap();
        fs::create_dir_all(root.join(".hidden-dir")).unwrap();
        fs::write(root.join("Show/Season 1/b.mkv"), b"x").unwrap();
        fs::write(root.join("Show/Season 1/a.mkv"), b"x").unwrap();
        fs::write(root.join("Show/.gitignore"), b"*.mkv\n").unwrap();
        fs::write(root.join(".hidden-dir/c.mkv"), b"x").unwrap();
        dir
    }

    fn utf8(dir: &TempDir) -> &Utf8Path {
        Utf8Path::from_path(dir.path()).unwrap()
    }

    #[test]
    fn test_collect_walks_everything_in_order() {
        let dir = tree();
        let root = utf8(&dir);
        let outcome = FileWalker::new(root).collect();
        assert!(outcome.error.is_none());

        let relative: Vec<String> = outcome
            .files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string())
            .collect();
        // .gitignore files are not honored and hidden directories are walked.
        assert_eq!(
            relative,
            [".hidden-dir/c.mkv", "Show/.gitignore", "Show/Season 1/a.mkv", "Show/Season 1/b.mkv"]
        );
    }

    #[test]
    fn test_missing_root_is_a_walk_error() {
        let dir = TempDir::new().unwrap();
        let missing = utf8(&dir).join("nope");
        let outcome = FileWalker::new(&missing).collect();
        assert!(outcome.files.is_empty());
        assert!(matches!(outcome.error, Some(ScanError::Walk { .. })));
    }

    #[test]
    fn test_ignore_rules() {
        let config = CheckConfig {
            ignore_extensions: vec!["NFO".to_owned(), ".srt".to_owned(), String::new()],
            ignore_paths: vec!["/Extras/".to_owned(), String::new()],
            ignore_hidden: true,
            ..CheckConfig::default()
        };
        let rules = IgnoreRules::from_config(&config);

        assert_eq!(rules.check(Utf8Path::new("/tv/a.nfo")), Some(IgnoreReason::Extension));
        assert_eq!(rules.check(Utf8Path::new("/tv/a.SRT")), Some(IgnoreReason::Extension));
        assert_eq!(rules.check(Utf8Path::new("/tv/.a.mkv")), Some(IgnoreReason::Hidden));
        assert_eq!(rules.check(Utf8Path::new("/tv/Extras/a.mkv")), Some(IgnoreReason::Path));
        assert_eq!(rules.check(Utf8Path::new("/tv/.cache/a.mkv")), None);
        assert_eq!(rules.check(Utf8Path::new("/tv/README")), None);
    }

    #[test]
    fn test_hidden_files_checked_when_allowed() {
        let config = CheckConfig {
            ignore_extensions: Vec::new(),
            ignore_hidden: false,
            ..CheckConfig::default()
        };
        let rules = IgnoreRules::from_config(&config);
        assert_eq!(rules.check(Utf8Path::new("/tv/.a.mkv")), None);
    }
}
