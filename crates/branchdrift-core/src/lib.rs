//! Core types, configuration, and error handling for branchdrift.
//!
//! This crate provides the shared foundation used by all other branchdrift crates:
//! - [`DriftError`]: unified error type using `thiserror`
//! - [`DriftConfig`]: configuration loaded from `.branchdrift.toml`
//! - Shared types: [`CommitRef`], [`FileDiffEntry`], [`FileStats`],
//!   [`DiffRecord`], [`HistoryPoint`], [`SeriesPoint`], [`SamplingOptions`],
//!   [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{CacheConfig, DriftConfig, HistoryConfig, RepositoryConfig, TrackingConfig};
pub use error::DriftError;
pub use types::{
    CommitRef, DiffRecord, FileDiffEntry, FileStats, HistoryPoint, OutputFormat, SamplingOptions,
    SeriesPoint,
};

/// A convenience `Result` type for branchdrift operations.
pub type Result<T> = std::result::Result<T, DriftError>;
