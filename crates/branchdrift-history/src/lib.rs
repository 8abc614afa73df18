//! Divergence computation on top of git and the diff cache.
//!
//! - [`compute::DiffComputer`] produces cached [`DiffRecord`](branchdrift_core::DiffRecord)s
//! - [`sampler::HistorySampler`] walks history backwards at fixed day steps
//! - [`aggregate::BranchAggregator`] runs one sampler task per branch under a deadline
//! - [`matrix`] and [`detail`] assemble the current-state and drill-down reports

pub mod aggregate;
pub mod cancel;
pub mod compute;
pub mod detail;
pub mod matrix;
pub mod sampler;
mod tracker;

pub use aggregate::{AggregateOutcome, BranchAggregator};
pub use cancel::CancelFlag;
pub use compute::DiffComputer;
pub use detail::{diff_detail, DetailPoint, DiffDetail};
pub use matrix::{divergence_matrix, DivergenceMatrix, MatrixCell, MatrixRow};
pub use sampler::HistorySampler;
pub use tracker::Tracker;
