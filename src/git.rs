//! Git metadata of the project under test

use crate::infra::{CommandExecutor, RealCommandExecutor};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Git operation errors
#[derive(Debug, Error)]
pub enum GitError {
    /// Git command failed with an error message
    #[error("Git command failed: {0}")]
    CommandFailed(String),

    /// Git output contained invalid UTF-8
    #[error("Invalid UTF-8 in git output")]
    InvalidUtf8,

    /// IO error occurred while executing git command
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Git checkout of a project, queried through an injected executor
pub struct GitRepository<CE: CommandExecutor = RealCommandExecutor> {
    dir: PathBuf,
    cmd_executor: CE,
}

impl GitRepository<RealCommandExecutor> {
    /// Open the checkout containing `dir` with real command execution
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_executor(dir, RealCommandExecutor)
    }
}

impl<CE: CommandExecutor> GitRepository<CE> {
    /// Open the checkout containing `dir` with a custom executor
    pub fn with_executor(dir: impl Into<PathBuf>, cmd_executor: CE) -> Self {
        Self {
            dir: dir.into(),
            cmd_executor,
        }
    }

    /// Directory git is run in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Current commit hash (short form).
    ///
    /// Returns `Ok(None)` when git is not installed, the directory is not a
    /// checkout, or the checkout has no commits yet.
    pub fn commit_hash(&self) -> Result<Option<String>, GitError> {
        let output = match self.cmd_executor.execute(
            |cmd| {
                cmd.arg("-C")
                    .arg(&self.dir)
                    .args(["rev-parse", "--short", "HEAD"])
            },
            "git",
        ) {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GitError::Io(e)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not a git repository")
                || stderr.contains("unknown revision")
                || stderr.contains("ambiguous argument 'HEAD'")
                || stderr.is_empty()
            {
                return Ok(None);
            }
            return Err(GitError::CommandFailed(stderr.trim().to_string()));
        }

        let hash = String::from_utf8(output.stdout)
            .map_err(|_| GitError::InvalidUtf8)?
            .trim()
            .to_string();

        Ok(if hash.is_empty() { None } else { Some(hash) })
    }
}
