//! Parsers for `git diff --numstat` and `git diff --shortstat` output.
//!
//! Both parsers are best-effort and never fail. Git prints `-` instead of
//! counts for binary files, omits shortstat clauses that would be zero, and
//! prints nothing at all for an empty diff; all of these read as zero so that
//! history sampling can keep walking past them.

use std::str::FromStr;

use branchdrift_core::{FileDiffEntry, FileStats};

/// Aggregate counts from a shortstat summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShortStat {
    /// Number of files changed.
    pub files_changed: u64,
    /// Lines inserted.
    pub insertions: u64,
    /// Lines deleted.
    pub deletions: u64,
}

impl ShortStat {
    /// `insertions + deletions`.
    pub fn total(&self) -> u64 {
        self.insertions + self.deletions
    }
}

/// Parse `text` as a number, returning zero (`T::default()`) on any failure.
///
/// Surrounding whitespace is ignored. This is the only numeric conversion
/// used on git output.
///
/// # Examples
///
/// ```
/// use branchdrift_gitstat::parse::parse_int_or_zero;
///
/// assert_eq!(parse_int_or_zero::<u64>(" 42 "), 42);
/// assert_eq!(parse_int_or_zero::<u64>("-"), 0);
/// assert_eq!(parse_int_or_zero::<i64>(""), 0);
/// ```
pub fn parse_int_or_zero<T: FromStr + Default>(text: &str) -> T {
    text.trim().parse().unwrap_or_default()
}

/// Parse per-file numstat lines of the form `<insertions>\t<deletions>\t<path>`.
///
/// A line that does not have that shape (binary files report `-` for both
/// counts) produces a zero entry with an empty path instead of failing the
/// parse. Blank lines are skipped.
///
/// # Examples
///
/// ```
/// use branchdrift_gitstat::parse::parse_file_stats;
///
/// let stats = parse_file_stats(["12\t3\tfoo/bar.cpp", "-\t-\tbinary.png"]);
/// assert_eq!(stats.files.len(), 2);
/// assert_eq!(stats.files[0].total, 15);
/// assert_eq!(stats.files[1].file, "");
/// assert_eq!(stats.total, 15);
/// ```
pub fn parse_file_stats<'a, I>(lines: I) -> FileStats
where
    I: IntoIterator<Item = &'a str>,
{
    let entries = lines
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_numstat_line(line).unwrap_or_default())
        .collect();
    FileStats::from_entries(entries)
}

/// Parse the complete stdout of `git diff --numstat`.
///
/// # Examples
///
/// ```
/// use branchdrift_gitstat::parse::parse_numstat;
///
/// let stats = parse_numstat("1\t1\ta.rs\n2\t0\tb.rs\n");
/// assert_eq!(stats.insertions, 3);
/// assert_eq!(stats.deletions, 1);
/// ```
pub fn parse_numstat(output: &str) -> FileStats {
    parse_file_stats(output.lines())
}

fn parse_numstat_line(line: &str) -> Option<FileDiffEntry> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (insertions, rest) = line.trim_start().split_once(char::is_whitespace)?;
    let (deletions, path) = rest.trim_start().split_once(char::is_whitespace)?;
    if !is_count(insertions) || !is_count(deletions) {
        return None;
    }
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    Some(FileDiffEntry::new(
        path,
        parse_int_or_zero(insertions),
        parse_int_or_zero(deletions),
    ))
}

fn is_count(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a shortstat summary such as
/// `3 files changed, 10 insertions(+), 4 deletions(-)`.
///
/// Clauses may be missing or appear in singular form; anything that cannot
/// be read is zero. Empty input gives an all-zero result.
///
/// # Examples
///
/// ```
/// use branchdrift_gitstat::parse::parse_short_stat;
///
/// let stat = parse_short_stat(" 3 files changed, 10 insertions(+), 4 deletions(-)\n");
/// assert_eq!((stat.files_changed, stat.insertions, stat.deletions), (3, 10, 4));
///
/// let stat = parse_short_stat("1 file changed, 1 deletion(-)");
/// assert_eq!((stat.files_changed, stat.insertions, stat.deletions), (1, 0, 1));
/// ```
pub fn parse_short_stat(text: &str) -> ShortStat {
    let mut stat = ShortStat::default();
    // Only the first non-empty line is the summary.
    let Some(summary) = text.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return stat;
    };

    for clause in summary.split(',') {
        let Some((count, label)) = clause.trim().split_once(char::is_whitespace) else {
            continue;
        };
        let label = label.trim_start();
        let value = parse_int_or_zero(count);
        if label.starts_with("file") {
            stat.files_changed = value;
        } else if label.starts_with("insertion") {
            stat.insertions = value;
        } else if label.starts_with("deletion") {
            stat.deletions = value;
        }
    }

    stat
}
