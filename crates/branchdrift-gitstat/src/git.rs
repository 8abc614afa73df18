//! The git queries branchdrift issues, expressed over a [`CommandRunner`].

use std::sync::Arc;

use branchdrift_core::{CommitRef, DriftError, RepositoryConfig};
use chrono::NaiveDate;

use crate::parse::parse_int_or_zero;
use crate::runner::CommandRunner;

/// Maximum length of the subject returned by [`Git::short_log`].
const SHORT_LOG_CHARS: usize = 40;

/// Typed facade over the git commands used for divergence tracking.
///
/// Cloning is cheap; clones share the same runner.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use branchdrift_gitstat::git::Git;
/// use branchdrift_gitstat::runner::GitCli;
///
/// let git = Git::new(Arc::new(GitCli::new(".")));
/// let head = git.resolve_branch("main").unwrap();
/// println!("main is at {head}");
/// ```
#[derive(Clone)]
pub struct Git {
    runner: Arc<dyn CommandRunner>,
    diff_options: Vec<String>,
    remote: Option<String>,
}

impl Git {
    /// Wrap a runner using the default diff options and local branch names.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        let defaults = RepositoryConfig::default();
        Self {
            runner,
            diff_options: defaults.diff_options,
            remote: None,
        }
    }

    /// Wrap a runner configured from `[repository]` settings.
    pub fn from_config(runner: Arc<dyn CommandRunner>, config: &RepositoryConfig) -> Self {
        Self {
            runner,
            diff_options: config.diff_options.clone(),
            remote: config
                .use_remote_branches
                .then(|| config.remote.clone())
                .filter(|r| !r.is_empty()),
        }
    }

    /// Replace the flags passed to every `git diff`.
    pub fn with_diff_options(mut self, options: Vec<String>) -> Self {
        self.diff_options = options;
        self
    }

    /// Resolve branch names against `remote` (e.g. `origin/<branch>`).
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    fn run<I, S>(&self, args: I) -> Result<String, DriftError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        self.runner.run(&args)
    }

    /// Resolve a branch name to the commit it points at.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::CommandFailure`] if git cannot resolve the name.
    pub fn resolve_branch(&self, branch: &str) -> Result<CommitRef, DriftError> {
        let name = match &self.remote {
            Some(remote) => format!("{remote}/{branch}"),
            None => branch.to_string(),
        };
        let output = self.run(["rev-parse".to_string(), name])?;
        Ok(CommitRef::new(output))
    }

    /// Resolve any revision (hash, tag or branch) to the full hash of the
    /// commit it names.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::CommandFailure`] if `rev` does not name a commit.
    pub fn resolve_commit(&self, rev: &str) -> Result<CommitRef, DriftError> {
        let output = self.run([
            "rev-parse".to_string(),
            "--verify".to_string(),
            format!("{rev}^{{commit}}"),
        ])?;
        Ok(CommitRef::new(output))
    }

    /// The commit subject, truncated to 40 characters.
    pub fn short_log(&self, commit: &CommitRef) -> Result<String, DriftError> {
        let output = self.run(["log", commit.as_str(), "--pretty=oneline", "-n", "1"])?;
        let line = output.trim();
        // Drop the leading hash.
        let subject = line
            .split_once(char::is_whitespace)
            .map_or("", |(_, rest)| rest.trim());
        Ok(subject.chars().take(SHORT_LOG_CHARS).collect())
    }

    /// The full `git log -n 1` entry for a commit.
    pub fn commit_info(&self, commit: &CommitRef) -> Result<String, DriftError> {
        let output = self.run(["log", commit.as_str(), "-n", "1"])?;
        Ok(output.trim().to_string())
    }

    /// Committer timestamp of a commit in seconds since the epoch; 0 if git
    /// prints something unexpected.
    pub fn commit_timestamp(&self, commit: &CommitRef) -> Result<i64, DriftError> {
        let output = self.run(["rev-list", commit.as_str(), "--timestamp", "-n", "1"])?;
        let first = output.split_whitespace().next().unwrap_or("");
        Ok(parse_int_or_zero(first))
    }

    /// A branch name containing the commit, without the remote prefix.
    pub fn branch_name(&self, commit: &CommitRef) -> Result<String, DriftError> {
        let output = self.run(["name-rev", "--name-only", commit.as_str()])?;
        let raw = output.trim();
        let remote = self.remote.as_deref().unwrap_or("origin");
        let prefix = format!("remotes/{remote}/");
        Ok(raw.strip_prefix(&prefix).unwrap_or(raw).to_string())
    }

    /// Per-file `--numstat` output between two commits under `directory`.
    pub fn numstat(
        &self,
        base: &CommitRef,
        compare: &CommitRef,
        directory: &str,
    ) -> Result<String, DriftError> {
        self.run(self.diff_args("--numstat", base, compare, directory))
    }

    /// One-line `--shortstat` summary between two commits under `directory`.
    pub fn shortstat(
        &self,
        base: &CommitRef,
        compare: &CommitRef,
        directory: &str,
    ) -> Result<String, DriftError> {
        self.run(self.diff_args("--shortstat", base, compare, directory))
    }

    fn diff_args(
        &self,
        format: &str,
        base: &CommitRef,
        compare: &CommitRef,
        directory: &str,
    ) -> Vec<String> {
        let mut args = vec!["diff".to_string()];
        args.extend(self.diff_options.iter().cloned());
        args.push(format.to_string());
        args.push(base.to_string());
        args.push(compare.to_string());
        if !directory.is_empty() {
            args.push("--".to_string());
            args.push(directory.to_string());
        }
        args
    }

    /// The most recent first-parent ancestor of `commit` committed on or
    /// before the end of `date` in UTC, or `None` if history does not reach
    /// back that far.
    pub fn first_parent_at(
        &self,
        commit: &CommitRef,
        date: NaiveDate,
    ) -> Result<Option<CommitRef>, DriftError> {
        // Without a zone git reads the bound in local time.
        let until = format!("--until={} 23:59:59 +0000", date.format("%Y-%m-%d"));
        let output = self.run([
            "rev-list".to_string(),
            commit.to_string(),
            "--first-parent".to_string(),
            until,
            "-n".to_string(),
            "1".to_string(),
        ])?;
        let ancestor = CommitRef::new(output);
        Ok((!ancestor.is_unresolved()).then_some(ancestor))
    }
}
