use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DriftError;
use crate::types::SamplingOptions;

/// Top-level configuration loaded from `.branchdrift.toml`.
///
/// Every component receives the pieces it needs from this value at
/// construction; nothing reads configuration from process state.
///
/// # Examples
///
/// ```
/// use branchdrift_core::DriftConfig;
///
/// let config = DriftConfig::default();
/// assert_eq!(config.history.sample_count, 30);
/// assert_eq!(config.history.sample_interval_days, 3);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Where the repository lives and how git is invoked.
    #[serde(default)]
    pub repository: RepositoryConfig,
    /// Which branches and directories are tracked.
    #[serde(default)]
    pub tracking: TrackingConfig,
    /// On-disk cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// History sampling and aggregation settings.
    #[serde(default)]
    pub history: HistoryConfig,
}

impl DriftConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::Io`] if the file cannot be read, or
    /// [`DriftError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use branchdrift_core::DriftConfig;
    /// use std::path::Path;
    ///
    /// let config = DriftConfig::from_file(Path::new(".branchdrift.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, DriftError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use branchdrift_core::DriftConfig;
    ///
    /// let toml = r#"
    /// [tracking]
    /// branches = ["release/2.0"]
    /// "#;
    /// let config = DriftConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.tracking.branches, vec!["release/2.0"]);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, DriftError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// The cache root, resolved against the repository path when relative.
    ///
    /// # Examples
    ///
    /// ```
    /// use branchdrift_core::DriftConfig;
    /// use std::path::PathBuf;
    ///
    /// let mut config = DriftConfig::default();
    /// config.repository.path = PathBuf::from("/srv/repo");
    /// assert_eq!(config.cache_root(), PathBuf::from("/srv/repo/.branchdrift/cache"));
    /// ```
    pub fn cache_root(&self) -> PathBuf {
        if self.cache.dir.is_absolute() {
            self.cache.dir.clone()
        } else {
            self.repository.path.join(&self.cache.dir)
        }
    }

    /// Check the values that cannot be expressed through serde defaults.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), DriftError> {
        if self.history.sample_count == 0 {
            return Err(DriftError::Config(
                "history.sample_count must be at least 1".into(),
            ));
        }
        if self.history.sample_interval_days == 0 {
            return Err(DriftError::Config(
                "history.sample_interval_days must be at least 1".into(),
            ));
        }
        if self.tracking.base_branch.trim().is_empty() {
            return Err(DriftError::Config("tracking.base_branch is empty".into()));
        }
        Ok(())
    }
}

/// Repository location and git invocation settings.
///
/// # Examples
///
/// ```
/// use branchdrift_core::RepositoryConfig;
///
/// let config = RepositoryConfig::default();
/// assert!(config.use_remote_branches);
/// assert_eq!(config.remote, "origin");
/// assert_eq!(config.diff_options, vec!["-M", "-C", "--ignore-space-at-eol"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Path to the working copy git runs in (default: `.`).
    #[serde(default = "default_repo_path")]
    pub path: PathBuf,
    /// Resolve tracked branches as `<remote>/<branch>` (default: true).
    #[serde(default = "default_true")]
    pub use_remote_branches: bool,
    /// Remote name used for branch resolution (default: `origin`).
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Extra flags passed to every `git diff` (default: rename/copy detection,
    /// ignoring whitespace at end of line).
    #[serde(default = "default_diff_options")]
    pub diff_options: Vec<String>,
}

fn default_repo_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_remote() -> String {
    "origin".into()
}

fn default_diff_options() -> Vec<String> {
    vec!["-M".into(), "-C".into(), "--ignore-space-at-eol".into()]
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: default_repo_path(),
            use_remote_branches: default_true(),
            remote: default_remote(),
            diff_options: default_diff_options(),
        }
    }
}

/// Tracked branches and directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Branch every other branch is compared against (default: `main`).
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    /// Long-lived branches to track.
    #[serde(default)]
    pub branches: Vec<String>,
    /// Top-level directories to measure separately.
    #[serde(default)]
    pub directories: Vec<String>,
    /// Sub-path appended to each directory in the matrix view, e.g. `dev`
    /// turns `engine` into `engine/dev`. Empty disables it.
    #[serde(default)]
    pub path_suffix: String,
}

fn default_base_branch() -> String {
    "main".into()
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            base_branch: default_base_branch(),
            branches: Vec::new(),
            directories: Vec::new(),
            path_suffix: String::new(),
        }
    }
}

impl TrackingConfig {
    /// The path a tracked directory is measured at, with the suffix applied.
    ///
    /// # Examples
    ///
    /// ```
    /// use branchdrift_core::TrackingConfig;
    ///
    /// let mut config = TrackingConfig::default();
    /// assert_eq!(config.measured_path("engine"), "engine");
    /// config.path_suffix = "dev".into();
    /// assert_eq!(config.measured_path("engine"), "engine/dev");
    /// ```
    pub fn measured_path(&self, directory: &str) -> String {
        let suffix = self.path_suffix.trim_matches('/');
        if suffix.is_empty() {
            directory.to_string()
        } else {
            format!("{}/{suffix}", directory.trim_end_matches('/'))
        }
    }
}

/// Cache settings.
///
/// # Examples
///
/// ```
/// use branchdrift_core::CacheConfig;
/// use std::path::PathBuf;
///
/// assert_eq!(CacheConfig::default().dir, PathBuf::from(".branchdrift/cache"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache root; relative paths resolve against the repository path.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".branchdrift/cache")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

/// History sampling and aggregation settings.
///
/// # Examples
///
/// ```
/// use branchdrift_core::HistoryConfig;
/// use std::time::Duration;
///
/// let config = HistoryConfig::default();
/// assert_eq!(config.aggregate_timeout(), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Number of samples per series (default: 30).
    #[serde(default = "default_sample_count")]
    pub sample_count: u32,
    /// Days between samples (default: 3).
    #[serde(default = "default_sample_interval_days")]
    pub sample_interval_days: u32,
    /// Seconds the branch aggregation may take before it is abandoned
    /// (default: 5).
    #[serde(default = "default_aggregate_timeout_secs")]
    pub aggregate_timeout_secs: u64,
}

fn default_sample_count() -> u32 {
    30
}

fn default_sample_interval_days() -> u32 {
    3
}

fn default_aggregate_timeout_secs() -> u64 {
    5
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            sample_count: default_sample_count(),
            sample_interval_days: default_sample_interval_days(),
            aggregate_timeout_secs: default_aggregate_timeout_secs(),
        }
    }
}

impl HistoryConfig {
    /// Sampling parameters for history series.
    pub fn sampling(&self) -> SamplingOptions {
        SamplingOptions {
            count: self.sample_count,
            interval_days: self.sample_interval_days,
        }
    }

    /// The aggregation deadline as a [`Duration`].
    pub fn aggregate_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregate_timeout_secs)
    }
}
