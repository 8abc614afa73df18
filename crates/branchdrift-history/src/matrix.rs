//! Current divergence of every tracked branch, per directory.

use std::fmt;

use branchdrift_core::{CommitRef, Result, TrackingConfig};
use serde::Serialize;

use crate::compute::DiffComputer;

/// One branch/directory cell: the diff total plus what is needed to drill in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixCell {
    /// Directory as measured, with any path suffix applied.
    pub directory: String,
    /// Lines inserted plus lines deleted.
    pub total: u64,
    /// Base branch tip the diff was taken from.
    pub base_commit: CommitRef,
    /// Tracked branch tip the diff was taken to.
    pub compare_commit: CommitRef,
}

/// All cells for one tracked branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow {
    /// Tracked branch name.
    pub branch: String,
    /// One cell per measured directory.
    pub cells: Vec<MatrixCell>,
    /// Sum of the row's cell totals.
    pub total: u64,
}

/// Divergence of each tracked branch from a base branch.
///
/// Rows are sorted by branch name; cells follow the configured directory
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivergenceMatrix {
    pub base_branch: String,
    /// Commit the base branch resolved to.
    pub base_commit: CommitRef,
    /// Measured directories, in column order.
    pub directories: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

/// Compute the divergence matrix of `tracking.branches` against `base_branch`.
///
/// # Errors
///
/// Fails if a branch cannot be resolved or a diff cannot be computed.
pub fn divergence_matrix(
    computer: &DiffComputer,
    tracking: &TrackingConfig,
    base_branch: &str,
) -> Result<DivergenceMatrix> {
    let git = computer.git();
    let base_commit = git.resolve_branch(base_branch)?;
    let directories: Vec<String> = tracking
        .directories
        .iter()
        .map(|d| tracking.measured_path(d))
        .collect();

    let mut rows = Vec::with_capacity(tracking.branches.len());
    for branch in &tracking.branches {
        let compare_commit = git.resolve_branch(branch)?;
        let mut cells = Vec::with_capacity(directories.len());
        for directory in &directories {
            let record = computer.compute_diff(&base_commit, &compare_commit, directory)?;
            cells.push(MatrixCell {
                directory: record.directory,
                total: record.total,
                base_commit: record.base_commit,
                compare_commit: record.compare_commit,
            });
        }
        let total = cells.iter().map(|c| c.total).sum();
        rows.push(MatrixRow {
            branch: branch.clone(),
            cells,
            total,
        });
    }
    rows.sort_by(|a, b| a.branch.cmp(&b.branch));

    Ok(DivergenceMatrix {
        base_branch: base_branch.to_string(),
        base_commit,
        directories,
        rows,
    })
}

impl fmt::Display for DivergenceMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Divergence from {} ({})",
            self.base_branch,
            self.base_commit.short()
        )?;
        writeln!(f)?;

        let width = self
            .rows
            .iter()
            .map(|r| r.branch.len())
            .chain(std::iter::once("Branch".len()))
            .max()
            .unwrap_or(6);

        write!(f, "{:<width$}", "Branch")?;
        for directory in &self.directories {
            write!(f, " {:>12}", directory)?;
        }
        writeln!(f, " {:>10}", "Total")?;
        writeln!(
            f,
            "{}",
            "-".repeat(width + 13 * self.directories.len() + 11)
        )?;

        for row in &self.rows {
            write!(f, "{:<width$}", row.branch)?;
            for cell in &row.cells {
                write!(f, " {:>12}", cell.total)?;
            }
            writeln!(f, " {:>10}", row.total)?;
        }
        Ok(())
    }
}

impl DivergenceMatrix {
    /// Render the matrix as a markdown table.
    ///
    /// # Examples
    ///
    /// ```
    /// use branchdrift_core::CommitRef;
    /// use branchdrift_history::DivergenceMatrix;
    ///
    /// let matrix = DivergenceMatrix {
    ///     base_branch: "main".into(),
    ///     base_commit: CommitRef::new("abc"),
    ///     directories: vec!["engine".into()],
    ///     rows: Vec::new(),
    /// };
    /// assert!(matrix.to_markdown().contains("| Branch | engine | Total |"));
    /// ```
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "# Divergence from `{}` ({})\n\n",
            self.base_branch,
            self.base_commit.short()
        ));

        out.push_str("| Branch |");
        for directory in &self.directories {
            out.push_str(&format!(" {directory} |"));
        }
        out.push_str(" Total |\n|--------|");
        for _ in &self.directories {
            out.push_str("---:|");
        }
        out.push_str("---:|\n");

        for row in &self.rows {
            out.push_str(&format!("| {} |", row.branch));
            for cell in &row.cells {
                out.push_str(&format!(" {} |", cell.total));
            }
            out.push_str(&format!(" {} |\n", row.total));
        }
        out
    }
}
