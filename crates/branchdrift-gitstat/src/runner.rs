//! Running the external git binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use branchdrift_core::DriftError;

/// Runs one git invocation and returns its standard output.
///
/// Implementations must report a non-zero exit as
/// [`DriftError::CommandFailure`]. The trait is the seam tests use to replace
/// git with a scripted double.
pub trait CommandRunner: Send + Sync {
    /// Run git with `args` and return stdout decoded lossily as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::CommandFailure`] when git exits unsuccessfully,
    /// or [`DriftError::Io`] when it cannot be started.
    fn run(&self, args: &[String]) -> Result<String, DriftError>;
}

/// [`CommandRunner`] backed by the `git` executable, run inside a repository.
///
/// # Examples
///
/// ```no_run
/// use branchdrift_gitstat::runner::{CommandRunner, GitCli};
///
/// let git = GitCli::new(".");
/// let head = git.run(&["rev-parse".into(), "HEAD".into()]).unwrap();
/// println!("{}", head.trim());
/// ```
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_path: PathBuf,
    program: String,
}

impl GitCli {
    /// Run `git` from `PATH` with `repo_path` as working directory.
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            program: "git".into(),
        }
    }

    /// Use a specific git executable instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// The repository git runs in.
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}

impl CommandRunner for GitCli {
    fn run(&self, args: &[String]) -> Result<String, DriftError> {
        let command_line = format!("{} {}", self.program, args.join(" "));
        tracing::debug!(
            command = %command_line,
            repo = %self.repo_path.display(),
            "running git"
        );

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.repo_path)
            .output()?;

        if !output.status.success() {
            return Err(DriftError::CommandFailure {
                command: command_line,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
