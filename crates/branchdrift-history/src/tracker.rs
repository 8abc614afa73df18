use std::sync::Arc;

use branchdrift_cache::DiffCache;
use branchdrift_core::{
    CommitRef, DriftConfig, FileStats, HistoryPoint, Result, SamplingOptions,
};
use branchdrift_gitstat::git::Git;
use branchdrift_gitstat::runner::CommandRunner;

use crate::aggregate::{AggregateOutcome, BranchAggregator};
use crate::cancel::CancelFlag;
use crate::compute::DiffComputer;
use crate::detail::{diff_detail, DiffDetail};
use crate::matrix::{divergence_matrix, DivergenceMatrix};
use crate::sampler::HistorySampler;

/// Every divergence query, wired from one [`DriftConfig`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use branchdrift_core::DriftConfig;
/// use branchdrift_gitstat::runner::GitCli;
/// use branchdrift_history::Tracker;
///
/// let config = DriftConfig::default();
/// let runner = Arc::new(GitCli::new(&config.repository.path));
/// let tracker = Tracker::from_config(&config, runner);
/// let matrix = tracker.matrix(None).unwrap();
/// println!("{matrix}");
/// ```
#[derive(Clone)]
pub struct Tracker {
    config: DriftConfig,
    sampler: HistorySampler,
}

impl Tracker {
    /// Build a tracker whose git queries go through `runner`.
    pub fn from_config(config: &DriftConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let git = Git::from_config(runner, &config.repository);
        let cache = DiffCache::new(config.cache_root());
        Self {
            config: config.clone(),
            sampler: HistorySampler::new(DiffComputer::new(git, cache)),
        }
    }

    /// The configuration this tracker was built from.
    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// The git facade shared by every query.
    pub fn git(&self) -> &Git {
        self.sampler.computer().git()
    }

    fn base_branch<'a>(&'a self, base: Option<&'a str>) -> &'a str {
        base.unwrap_or(self.config.tracking.base_branch.as_str())
    }

    /// Resolve `base`, or the configured base branch, to a commit.
    ///
    /// # Errors
    ///
    /// Fails if git cannot resolve the branch.
    pub fn resolve_base(&self, base: Option<&str>) -> Result<CommitRef> {
        self.git().resolve_branch(self.base_branch(base))
    }

    /// Resolve a revision given by the user (hash, tag or branch) to the
    /// commit it names, so cache keys never hold a movable name.
    ///
    /// # Errors
    ///
    /// Fails if `rev` does not name a commit.
    pub fn resolve_commit(&self, rev: &str) -> Result<CommitRef> {
        self.git().resolve_commit(rev)
    }

    /// See [`divergence_matrix`].
    ///
    /// # Errors
    ///
    /// Propagates git and cache failures.
    pub fn matrix(&self, base: Option<&str>) -> Result<DivergenceMatrix> {
        divergence_matrix(
            self.sampler.computer(),
            &self.config.tracking,
            self.base_branch(base),
        )
    }

    /// See [`HistorySampler::compute_history`]. Uses configured sampling
    /// unless `options` is given. `base` and `compare` must already be
    /// resolved, see [`Tracker::resolve_commit`].
    ///
    /// # Errors
    ///
    /// Propagates git and cache failures.
    pub fn history(
        &self,
        base: &CommitRef,
        compare: &CommitRef,
        directory: &str,
        options: Option<SamplingOptions>,
    ) -> Result<Vec<HistoryPoint>> {
        self.sampler.compute_history(
            base,
            compare,
            directory,
            options.unwrap_or_else(|| self.config.history.sampling()),
            &CancelFlag::new(),
        )
    }

    /// See [`diff_detail`].
    ///
    /// # Errors
    ///
    /// Propagates git and cache failures.
    pub fn detail(
        &self,
        base: &CommitRef,
        compare: &CommitRef,
        directory: &str,
        options: Option<SamplingOptions>,
    ) -> Result<DiffDetail> {
        diff_detail(
            &self.sampler,
            base,
            compare,
            directory,
            options.unwrap_or_else(|| self.config.history.sampling()),
        )
    }

    /// Uncached per-file statistics.
    ///
    /// # Errors
    ///
    /// Propagates git failures.
    pub fn file_stats(
        &self,
        base: &CommitRef,
        compare: &CommitRef,
        directory: &str,
    ) -> Result<FileStats> {
        self.sampler.computer().file_stats(base, compare, directory)
    }

    /// An aggregator over the configured branches and measured directories.
    pub fn aggregator(&self) -> BranchAggregator {
        let tracking = &self.config.tracking;
        let directories = tracking
            .directories
            .iter()
            .map(|d| tracking.measured_path(d))
            .collect();
        BranchAggregator::new(self.sampler.clone(), tracking.branches.clone(), directories)
            .with_sampling(self.config.history.sampling())
            .with_timeout(self.config.history.aggregate_timeout())
    }

    /// Aggregate series for every tracked branch against `base`.
    ///
    /// # Errors
    ///
    /// Fails if the base cannot be resolved or a worker fails.
    pub async fn timeline(&self, base: Option<&str>) -> Result<AggregateOutcome> {
        let base_commit = self.resolve_base(base)?;
        self.aggregator().compute_branch_aggregate(&base_commit).await
    }
}
