//! Per-branch divergence series computed in parallel under a deadline.

use std::collections::BTreeMap;
use std::time::Duration;

use branchdrift_core::{CommitRef, DriftError, Result, SamplingOptions, SeriesPoint};
use chrono::NaiveDate;
use serde::Serialize;
use tokio::task::JoinSet;

use crate::cancel::CancelFlag;
use crate::sampler::HistorySampler;

/// Result of [`BranchAggregator::compute_branch_aggregate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "branches")]
pub enum AggregateOutcome {
    /// Every branch finished; series keyed by branch name, most recent first.
    Ready(BTreeMap<String, Vec<SeriesPoint>>),
    /// The deadline passed before every branch finished. Partial results are
    /// discarded.
    Unavailable,
}

impl AggregateOutcome {
    /// The per-branch series, if the aggregate completed.
    pub fn ready(&self) -> Option<&BTreeMap<String, Vec<SeriesPoint>>> {
        match self {
            AggregateOutcome::Ready(series) => Some(series),
            AggregateOutcome::Unavailable => None,
        }
    }
}

/// Sums every tracked directory's history into one series per branch.
///
/// Each branch is sampled on its own blocking task. If the deadline passes
/// the shared [`CancelFlag`] is raised so running workers stop at their next
/// sample, and the call reports [`AggregateOutcome::Unavailable`].
#[derive(Clone)]
pub struct BranchAggregator {
    sampler: HistorySampler,
    branches: Vec<String>,
    directories: Vec<String>,
    sampling: SamplingOptions,
    timeout: Duration,
}

impl BranchAggregator {
    /// Aggregate `branches` over `directories` with default sampling and a
    /// five second deadline.
    pub fn new(sampler: HistorySampler, branches: Vec<String>, directories: Vec<String>) -> Self {
        Self {
            sampler,
            branches,
            directories,
            sampling: SamplingOptions::default(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Sample every branch with `sampling` instead of the defaults.
    pub fn with_sampling(mut self, sampling: SamplingOptions) -> Self {
        self.sampling = sampling;
        self
    }

    /// Give up on the whole aggregate after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Compute one summed series per tracked branch against `base_commit`.
    ///
    /// # Errors
    ///
    /// The first worker error is returned after the remaining workers are
    /// cancelled. A panicked worker becomes [`DriftError::Task`].
    pub async fn compute_branch_aggregate(
        &self,
        base_commit: &CommitRef,
    ) -> Result<AggregateOutcome> {
        let cancel = CancelFlag::new();
        let mut workers = JoinSet::new();

        for branch in &self.branches {
            let sampler = self.sampler.clone();
            let branch = branch.clone();
            let base = base_commit.clone();
            let directories = self.directories.clone();
            let sampling = self.sampling;
            let cancel = cancel.clone();
            workers.spawn_blocking(move || {
                let series =
                    branch_series(&sampler, &base, &branch, &directories, sampling, &cancel)?;
                Ok::<_, DriftError>((branch, series))
            });
        }

        let collect = async {
            let mut all = BTreeMap::new();
            while let Some(joined) = workers.join_next().await {
                let finished = joined
                    .map_err(|e| DriftError::Task(e.to_string()))
                    .and_then(|result| result);
                match finished {
                    Ok((branch, series)) => {
                        all.insert(branch, series);
                    }
                    Err(e) => {
                        cancel.cancel();
                        return Err(e);
                    }
                }
            }
            Ok(all)
        };

        let outcome = tokio::time::timeout(self.timeout, collect).await;
        match outcome {
            Ok(Ok(all)) => Ok(AggregateOutcome::Ready(all)),
            Ok(Err(e)) => {
                workers.abort_all();
                Err(e)
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    pending = workers.len(),
                    "branch aggregation timed out"
                );
                cancel.cancel();
                workers.abort_all();
                Ok(AggregateOutcome::Unavailable)
            }
        }
    }
}

/// Sample every directory for one branch and sum totals by date.
fn branch_series(
    sampler: &HistorySampler,
    base: &CommitRef,
    branch: &str,
    directories: &[String],
    sampling: SamplingOptions,
    cancel: &CancelFlag,
) -> Result<Vec<SeriesPoint>> {
    cancel.check()?;
    let compare = sampler.computer().git().resolve_branch(branch)?;

    let mut by_date: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for directory in directories {
        let points = sampler.compute_history(base, &compare, directory, sampling, cancel)?;
        for point in points {
            *by_date.entry(point.date).or_default() += point.total;
        }
    }

    tracing::debug!(branch, samples = by_date.len(), "branch series ready");
    Ok(by_date
        .into_iter()
        .rev()
        .map(|(date, total)| SeriesPoint { date, total })
        .collect())
}
