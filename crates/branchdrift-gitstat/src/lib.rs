//! Git command plumbing and output parsing.
//!
//! Runs the git CLI through a swappable [`runner::CommandRunner`], wraps the
//! handful of queries branchdrift needs in [`git::Git`], and turns numstat and
//! shortstat text into structured statistics in [`parse`].

pub mod git;
pub mod parse;
pub mod runner;
