//! External program detection
//!
//! Before a session starts, every program named by the configured commands
//! (build, install, launch, memory, profilers) is resolved on `PATH`, or
//! relative to the project directory for wrappers like `./gradlew`.

use crate::infra::{CancelToken, CommandExecutor, RealCommandExecutor, Supervised};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

/// How long a `--version` probe may take
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur during tool operations
#[derive(Error, Debug)]
pub enum ToolError {
    /// I/O error during tool execution
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tool execution failed
    #[error("Failed to get version for {0}")]
    VersionFailed(String),

    /// Required tool is missing
    #[error("Required tool missing: {0}")]
    MissingTool(String),
}

/// Resolves a program name to an executable path
pub trait ToolLocator {
    /// Full path of `program` as it would be run from `cwd`, if any
    fn locate(&self, program: &str, cwd: &Path) -> Option<PathBuf>;
}

/// Looks programs up on `PATH` with the `which` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct PathLocator;

impl ToolLocator for PathLocator {
    fn locate(&self, program: &str, cwd: &Path) -> Option<PathBuf> {
        which::which_in(program, std::env::var_os("PATH"), cwd).ok()
    }
}

/// Status of a tool check
#[derive(Debug, Clone, PartialEq)]
pub enum ToolStatus {
    /// Tool resolved; version is present when it was probed successfully
    Available {
        /// Resolved executable
        path: PathBuf,
        /// First line of `--version` output
        version: Option<String>,
    },
    /// Tool binary not found
    Missing,
}

/// Checks the programs a session depends on
pub struct ToolChain<CE: CommandExecutor = RealCommandExecutor, L: ToolLocator = PathLocator> {
    cmd_executor: CE,
    locator: L,
}

impl ToolChain<RealCommandExecutor, PathLocator> {
    /// Create a toolchain check with real lookups and execution
    pub fn new() -> Self {
        Self::with_parts(RealCommandExecutor, PathLocator)
    }
}

impl Default for ToolChain<RealCommandExecutor, PathLocator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<CE: CommandExecutor, L: ToolLocator> ToolChain<CE, L> {
    /// Create a toolchain check with custom parts
    pub fn with_parts(cmd_executor: CE, locator: L) -> Self {
        Self {
            cmd_executor,
            locator,
        }
    }

    /// Resolve a single program
    pub fn check(&self, program: &str, cwd: &Path) -> ToolStatus {
        match self.locator.locate(program, cwd) {
            Some(path) => {
                let version = if log::log_enabled!(log::Level::Debug) {
                    self.version(&path).ok()
                } else {
                    None
                };
                ToolStatus::Available { path, version }
            }
            None => ToolStatus::Missing,
        }
    }

    /// Get the version string of an installed tool
    pub fn version(&self, path: &Path) -> Result<String, ToolError> {
        let mut cmd = Command::new(path);
        cmd.arg("--version");

        let name = path.display().to_string();
        let output = match self.cmd_executor.supervise(
            &mut cmd,
            VERSION_PROBE_TIMEOUT,
            &CancelToken::new(),
        )? {
            Supervised::Exited(output) if output.status.success() => output,
            _ => return Err(ToolError::VersionFailed(name)),
        };

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .to_string())
    }

    /// Resolve every program, failing on the first one that is missing.
    ///
    /// Duplicates are checked once. Resolved versions are logged at debug level.
    pub fn check_all<'a>(
        &self,
        programs: impl IntoIterator<Item = &'a str>,
        cwd: &Path,
    ) -> Result<(), ToolError> {
        let mut seen: Vec<&str> = Vec::new();
        for program in programs {
            if seen.contains(&program) {
                continue;
            }
            seen.push(program);

            match self.check(program, cwd) {
                ToolStatus::Available { path, version } => {
                    log::debug!(
                        "Found {} at {} ({})",
                        program,
                        path.display(),
                        version.as_deref().unwrap_or("version unknown")
                    );
                }
                ToolStatus::Missing => {
                    return Err(ToolError::MissingTool(program.to_string()));
                }
            }
        }
        Ok(())
    }
}
