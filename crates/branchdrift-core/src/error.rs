/// Errors that can occur across branchdrift.
///
/// Library crates return this type directly; the binary reports it through
/// `miette` at the boundary.
///
/// Cache corruption has no variant here; the cache reports a miss instead.
/// Unparsable numbers in git output read as zero.
///
/// # Examples
///
/// ```
/// use branchdrift_core::DriftError;
///
/// let err = DriftError::Config("no branches configured".into());
/// assert!(err.to_string().contains("no branches configured"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DriftError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The external git process exited unsuccessfully.
    #[error("command failed ({status}): {command}{}", format_stderr(.stderr))]
    #[diagnostic(help("check that the repository path is correct and the commits exist"))]
    CommandFailure {
        /// The full command line that was run.
        command: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Captured standard error, possibly empty.
        stderr: String,
    },

    /// Work was stopped because its aggregation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// A background worker panicked or could not be joined.
    #[error("worker task failed: {0}")]
    Task(String),
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{trimmed}")
    }
}
