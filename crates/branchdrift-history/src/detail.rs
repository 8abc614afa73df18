//! Drill-down report for one commit pair and directory.

use std::fmt;

use branchdrift_core::{CommitRef, FileStats, Result, SamplingOptions};
use chrono::NaiveDate;
use serde::Serialize;

use crate::cancel::CancelFlag;
use crate::sampler::HistorySampler;

/// A history sample annotated with the compare commit's subject line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailPoint {
    pub date: NaiveDate,
    pub total: u64,
    pub base_commit: CommitRef,
    pub compare_commit: CommitRef,
    /// Empty when the compare commit is unresolved.
    pub subject: String,
}

/// Everything known about the divergence of one commit pair in a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffDetail {
    pub base_commit: CommitRef,
    pub compare_commit: CommitRef,
    /// Directory the diff is restricted to.
    pub directory: String,
    /// Branch containing the base commit, as reported by `git name-rev`.
    pub base_branch: String,
    /// Branch containing the compare commit.
    pub compare_branch: String,
    /// Full log entry of the compare commit.
    pub commit_info: String,
    /// Current per-file statistics.
    pub files: FileStats,
    /// Sampled history, most recent first.
    pub history: Vec<DetailPoint>,
}

/// Assemble the detail report for `base`..`compare` under `directory`.
///
/// File statistics are always recomputed; the history series goes through
/// the cache.
///
/// # Errors
///
/// Propagates any git failure.
pub fn diff_detail(
    sampler: &HistorySampler,
    base: &CommitRef,
    compare: &CommitRef,
    directory: &str,
    options: SamplingOptions,
) -> Result<DiffDetail> {
    let computer = sampler.computer();
    let git = computer.git();

    let points = sampler.compute_history(base, compare, directory, options, &CancelFlag::new())?;
    let mut history = Vec::with_capacity(points.len());
    for point in points {
        let subject = if point.compare_commit.is_unresolved() {
            String::new()
        } else {
            git.short_log(&point.compare_commit)?
        };
        history.push(DetailPoint {
            date: point.date,
            total: point.total,
            base_commit: point.base_commit,
            compare_commit: point.compare_commit,
            subject,
        });
    }

    Ok(DiffDetail {
        base_commit: base.clone(),
        compare_commit: compare.clone(),
        directory: directory.to_string(),
        base_branch: git.branch_name(base)?,
        compare_branch: git.branch_name(compare)?,
        commit_info: git.commit_info(compare)?,
        files: computer.file_stats(base, compare, directory)?,
        history,
    })
}

impl fmt::Display for DiffDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}) -> {} ({}) in {}",
            self.base_branch,
            self.base_commit.short(),
            self.compare_branch,
            self.compare_commit.short(),
            self.directory
        )?;
        writeln!(f)?;
        writeln!(f, "{}", self.commit_info)?;
        writeln!(f)?;

        if !self.files.files.is_empty() {
            writeln!(f, "{:<50} {:>8} {:>8} {:>8}", "File", "+", "-", "Total")?;
            writeln!(f, "{}", "-".repeat(77))?;
            for entry in &self.files.files {
                writeln!(
                    f,
                    "{:<50} {:>8} {:>8} {:>8}",
                    entry.file, entry.insertions, entry.deletions, entry.total
                )?;
            }
        }
        writeln!(
            f,
            "\nSummary: {} files, +{} insertions, -{} deletions, {} total",
            self.files.files.len(),
            self.files.insertions,
            self.files.deletions,
            self.files.total
        )?;

        if !self.history.is_empty() {
            writeln!(f, "\nHistory")?;
            writeln!(f, "-------")?;
            for point in &self.history {
                writeln!(
                    f,
                    "{}  {:>8}  {:<8}  {}",
                    point.date,
                    point.total,
                    point.compare_commit.short(),
                    point.subject
                )?;
            }
        }
        Ok(())
    }
}

impl DiffDetail {
    /// Render the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "# `{}` → `{}` in `{}`\n\n",
            self.base_branch, self.compare_branch, self.directory
        ));
        out.push_str(&format!(
            "**Base:** `{}`  \n**Compare:** `{}`\n\n",
            self.base_commit, self.compare_commit
        ));
        out.push_str(&format!("```text\n{}\n```\n\n", self.commit_info));

        out.push_str("## Files\n\n");
        if !self.files.files.is_empty() {
            out.push_str("| File | + | - | Total |\n");
            out.push_str("|------|--:|--:|------:|\n");
            for entry in &self.files.files {
                out.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    entry.file, entry.insertions, entry.deletions, entry.total
                ));
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "**Summary:** +{} insertions, -{} deletions, {} total\n",
            self.files.insertions, self.files.deletions, self.files.total
        ));

        if !self.history.is_empty() {
            out.push_str("\n## History\n\n");
            out.push_str("| Date | Total | Compare | Subject |\n");
            out.push_str("|------|------:|---------|---------|\n");
            for point in &self.history {
                out.push_str(&format!(
                    "| {} | {} | `{}` | {} |\n",
                    point.date,
                    point.total,
                    point.compare_commit.short(),
                    point.subject
                ));
            }
        }
        out
    }
}
