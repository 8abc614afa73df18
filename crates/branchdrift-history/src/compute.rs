//! Cached diff statistics between two commits.

use branchdrift_cache::{CacheKey, DiffCache};
use branchdrift_core::{CommitRef, DiffRecord, FileStats, Result};
use branchdrift_gitstat::git::Git;
use branchdrift_gitstat::parse::{parse_numstat, parse_short_stat};

/// Computes [`DiffRecord`]s, consulting the cache before running git.
///
/// Cloning is cheap and clones share the runner and cache root.
#[derive(Clone)]
pub struct DiffComputer {
    git: Git,
    cache: DiffCache,
}

impl DiffComputer {
    /// Compute diffs with `git`, caching them in `cache`.
    pub fn new(git: Git, cache: DiffCache) -> Self {
        Self { git, cache }
    }

    /// The git facade used for queries.
    pub fn git(&self) -> &Git {
        &self.git
    }

    /// The cache results are stored in.
    pub fn cache(&self) -> &DiffCache {
        &self.cache
    }

    /// Line-change totals between `base` and `compare` under `directory`.
    ///
    /// A cached record is returned without running git. Otherwise git's
    /// `--shortstat` output is parsed and the record is cached before it is
    /// returned. An unresolved `compare` gives an all-zero record without
    /// running git or touching the cache.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::CommandFailure`](branchdrift_core::DriftError::CommandFailure)
    /// if git fails, in which case nothing is cached, or
    /// [`DriftError::Io`](branchdrift_core::DriftError::Io) if the result
    /// cannot be stored.
    pub fn compute_diff(
        &self,
        base: &CommitRef,
        compare: &CommitRef,
        directory: &str,
    ) -> Result<DiffRecord> {
        if compare.is_unresolved() {
            return Ok(DiffRecord::new(
                base.clone(),
                compare.clone(),
                directory,
                0,
                0,
                0,
            ));
        }

        let key = CacheKey::for_diff(base, compare, directory);
        if let Some(record) = self.cache.get_diff(&key) {
            return Ok(record);
        }

        tracing::debug!(
            base = %base.short(),
            compare = %compare.short(),
            directory,
            "diff cache miss"
        );
        let output = self.git.shortstat(base, compare, directory)?;
        let stat = parse_short_stat(&output);
        let record = DiffRecord::new(
            base.clone(),
            compare.clone(),
            directory,
            stat.insertions,
            stat.deletions,
            stat.files_changed,
        );
        self.cache.put_diff(&key, &record)?;
        Ok(record)
    }

    /// Per-file statistics between two commits. Never cached.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::CommandFailure`](branchdrift_core::DriftError::CommandFailure)
    /// if git fails.
    pub fn file_stats(
        &self,
        base: &CommitRef,
        compare: &CommitRef,
        directory: &str,
    ) -> Result<FileStats> {
        let output = self.git.numstat(base, compare, directory)?;
        Ok(parse_numstat(&output))
    }
}
