use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An opaque reference to a single commit, normally a full hash.
///
/// An empty reference means the commit could not be resolved, which happens
/// when a compare branch has no ancestor at a sampled date.
///
/// # Examples
///
/// ```
/// use branchdrift_core::CommitRef;
///
/// let commit = CommitRef::new("4f2a9c1");
/// assert_eq!(commit.as_str(), "4f2a9c1");
/// assert!(!commit.is_unresolved());
/// assert!(CommitRef::unresolved().is_unresolved());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitRef(String);

impl CommitRef {
    /// Wrap a resolved commit identifier. Surrounding whitespace is dropped.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.len() == id.len() {
            Self(id)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// The reference used when no commit exists.
    pub fn unresolved() -> Self {
        Self(String::new())
    }

    /// Returns `true` when this reference names no commit.
    pub fn is_unresolved(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first eight characters, for display.
    pub fn short(&self) -> &str {
        self.0.get(..self.0.len().min(8)).unwrap_or(&self.0)
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CommitRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Line counts for one changed file in a diff.
///
/// # Examples
///
/// ```
/// use branchdrift_core::FileDiffEntry;
///
/// let entry = FileDiffEntry::new("src/lib.rs", 12, 3);
/// assert_eq!(entry.total, 15);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiffEntry {
    /// Path relative to the repository root. Empty for unparsable lines.
    pub file: String,
    /// Lines inserted.
    pub insertions: u64,
    /// Lines deleted.
    pub deletions: u64,
    /// `insertions + deletions`.
    pub total: u64,
}

impl FileDiffEntry {
    /// Build an entry, deriving `total`.
    pub fn new(file: impl Into<String>, insertions: u64, deletions: u64) -> Self {
        Self {
            file: file.into(),
            insertions,
            deletions,
            total: insertions + deletions,
        }
    }
}

/// Per-file statistics for a diff together with their sums.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    /// One entry per line of numstat output.
    pub files: Vec<FileDiffEntry>,
    /// Sum of entry insertions.
    pub insertions: u64,
    /// Sum of entry deletions.
    pub deletions: u64,
    /// `insertions + deletions`.
    pub total: u64,
}

impl FileStats {
    /// Collect entries and compute the totals.
    ///
    /// # Examples
    ///
    /// ```
    /// use branchdrift_core::{FileDiffEntry, FileStats};
    ///
    /// let stats = FileStats::from_entries(vec![
    ///     FileDiffEntry::new("a.rs", 1, 2),
    ///     FileDiffEntry::new("b.rs", 3, 4),
    /// ]);
    /// assert_eq!(stats.insertions, 4);
    /// assert_eq!(stats.total, 10);
    /// ```
    pub fn from_entries(files: Vec<FileDiffEntry>) -> Self {
        let insertions = files.iter().map(|f| f.insertions).sum();
        let deletions = files.iter().map(|f| f.deletions).sum();
        Self {
            files,
            insertions,
            deletions,
            total: insertions + deletions,
        }
    }
}

/// Aggregate line-change statistic between two commits, restricted to a
/// directory.
///
/// `total` always equals `insertions + deletions`; use [`DiffRecord::new`] to
/// keep it that way.
///
/// # Examples
///
/// ```
/// use branchdrift_core::{CommitRef, DiffRecord};
///
/// let record = DiffRecord::new(
///     CommitRef::new("aaa"),
///     CommitRef::new("bbb"),
///     "engine/dev",
///     10,
///     4,
///     3,
/// );
/// assert_eq!(record.total, 14);
/// assert_eq!(record.files_changed, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRecord {
    /// Commit the diff is taken from.
    pub base_commit: CommitRef,
    /// Commit the diff is taken to.
    pub compare_commit: CommitRef,
    /// Directory the diff is restricted to.
    pub directory: String,
    /// Lines inserted.
    pub insertions: u64,
    /// Lines deleted.
    pub deletions: u64,
    /// `insertions + deletions`.
    pub total: u64,
    /// Number of files touched.
    pub files_changed: u64,
}

impl DiffRecord {
    /// Build a record, deriving `total`.
    pub fn new(
        base_commit: CommitRef,
        compare_commit: CommitRef,
        directory: impl Into<String>,
        insertions: u64,
        deletions: u64,
        files_changed: u64,
    ) -> Self {
        Self {
            base_commit,
            compare_commit,
            directory: directory.into(),
            insertions,
            deletions,
            total: insertions + deletions,
            files_changed,
        }
    }

    /// Returns `true` if `total == insertions + deletions`.
    pub fn is_consistent(&self) -> bool {
        self.insertions.checked_add(self.deletions) == Some(self.total)
    }
}

/// One sample of a divergence time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    /// Sampled calendar date.
    pub date: NaiveDate,
    /// Diff total at that date.
    pub total: u64,
    /// Base branch ancestor at that date.
    pub base_commit: CommitRef,
    /// Compare branch ancestor at that date, unresolved if none existed.
    pub compare_commit: CommitRef,
    /// Directory the diff is restricted to.
    pub directory: String,
}

/// A dated total in an aggregated per-branch series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    /// Sampled calendar date.
    pub date: NaiveDate,
    /// Sum of directory totals at that date.
    pub total: u64,
}

/// How a history series is sampled: `count` points, `interval_days` apart.
///
/// Part of the history cache key, so changing either value never returns a
/// series sampled differently.
///
/// # Examples
///
/// ```
/// use branchdrift_core::SamplingOptions;
///
/// let options = SamplingOptions::default();
/// assert_eq!(options.count, 30);
/// assert_eq!(options.interval_days, 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingOptions {
    /// Maximum number of samples.
    pub count: u32,
    /// Days between consecutive samples.
    pub interval_days: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            count: 30,
            interval_days: 3,
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use branchdrift_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
