//! Backwards sampling of divergence history.

use branchdrift_cache::CacheKey;
use branchdrift_core::{CommitRef, HistoryPoint, Result, SamplingOptions};
use chrono::{DateTime, Days, NaiveDate};

use crate::cancel::CancelFlag;
use crate::compute::DiffComputer;

/// Builds divergence time series for a commit pair.
#[derive(Clone)]
pub struct HistorySampler {
    computer: DiffComputer,
}

impl HistorySampler {
    /// Sample through `computer`, sharing its cache.
    pub fn new(computer: DiffComputer) -> Self {
        Self { computer }
    }

    /// The diff computer each sample goes through.
    pub fn computer(&self) -> &DiffComputer {
        &self.computer
    }

    /// Sample the diff between the first-parent histories of `base` and
    /// `compare`, most recent first.
    ///
    /// Sampling starts at the UTC date of whichever commit is newer and steps
    /// back `options.interval_days` at a time for at most `options.count`
    /// points. It stops early once the base branch has no ancestor at the
    /// sampled date. A missing compare ancestor does not stop sampling; that
    /// point is recorded with an unresolved compare commit and a zero total.
    ///
    /// A series is cached under a key that includes `options`, so a second
    /// call with the same arguments returns without running git.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::Cancelled`](branchdrift_core::DriftError::Cancelled)
    /// if `cancel` is raised between samples, or any git failure. Nothing is
    /// cached when the call fails.
    pub fn compute_history(
        &self,
        base: &CommitRef,
        compare: &CommitRef,
        directory: &str,
        options: SamplingOptions,
        cancel: &CancelFlag,
    ) -> Result<Vec<HistoryPoint>> {
        let key = CacheKey::for_history(base, compare, directory, options);
        if let Some(points) = self.computer.cache().get_history(&key) {
            return Ok(points);
        }

        let git = self.computer.git();
        let start = start_date(
            git.commit_timestamp(base)?,
            git.commit_timestamp(compare)?,
        );
        tracing::debug!(
            base = %base.short(),
            compare = %compare.short(),
            directory,
            %start,
            "sampling history"
        );

        let mut points = Vec::new();
        for step in 0..options.count {
            cancel.check()?;

            let offset = u64::from(step) * u64::from(options.interval_days);
            let Some(date) = start.checked_sub_days(Days::new(offset)) else {
                break;
            };

            let Some(base_at) = git.first_parent_at(base, date)? else {
                tracing::debug!(%date, "base history exhausted");
                break;
            };
            let compare_at = git
                .first_parent_at(compare, date)?
                .unwrap_or_else(CommitRef::unresolved);

            let record = self.computer.compute_diff(&base_at, &compare_at, directory)?;
            points.push(HistoryPoint {
                date,
                total: record.total,
                base_commit: base_at,
                compare_commit: compare_at,
                directory: directory.to_string(),
            });
        }

        self.computer.cache().put_history(&key, &points)?;
        Ok(points)
    }
}

/// UTC calendar date of the later of two epoch timestamps.
fn start_date(base_timestamp: i64, compare_timestamp: i64) -> NaiveDate {
    DateTime::from_timestamp(base_timestamp.max(compare_timestamp), 0)
        .unwrap_or_default()
        .date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_date_uses_the_later_timestamp() {
        // 2023-11-14T22:13:20Z and 2023-11-16T03:00:00Z
        let date = start_date(1_700_000_000, 1_700_103_600);
        assert_eq!(date, NaiveDate::from_ymd_opt(2023, 11, 16).unwrap());
        assert_eq!(start_date(1_700_103_600, 1_700_000_000), date);
    }

    #[test]
    fn start_date_is_utc() {
        // 23:30 UTC stays on the same UTC day regardless of local zone.
        let date = start_date(1_704_151_800, 0);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn unparsable_timestamps_fall_back_to_epoch() {
        assert_eq!(
            start_date(0, 0),
            NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
        );
    }
}
