//! Test orchestrator: N sequential runs into one persisted raw result set
//!
//! ```text
//! Idle -> Preparing -> Running(i) -> Persisting -> Done
//!                         |
//!                         +-> Aborted   (failure policy)  -> Persisting
//!                         +-> Cancelled (operator)        -> Persisting
//! ```
//!
//! Persisting only happens when at least one run succeeded.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::HarnessError;
use crate::git::GitRepository;
use crate::infra::{CancelToken, CommandExecutor, FileSystem};
use crate::results::{RawResultSet, RawResultStore, RunRecord, Stage};
use crate::telemetry::{EventSink, HarnessEvent};
use crate::tools::{ToolChain, ToolError, ToolLocator};

use super::config::PerfTestConfig;
use super::executor::RunExecutor;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not started
    Idle,
    /// Validating configuration, output directory and tools
    Preparing,
    /// Executing run `i`
    Running(u32),
    /// Stopped early by the failure policy
    Aborted,
    /// Stopped early by the operator
    Cancelled,
    /// Writing the raw result set
    Persisting,
    /// Finished
    Done,
}

/// Drives a measurement session
pub struct TestOrchestrator<'s, CE: CommandExecutor, FS: FileSystem, L: ToolLocator> {
    cmd_executor: CE,
    fs: FS,
    toolchain: ToolChain<CE, L>,
    cancel: CancelToken,
    sink: &'s dyn EventSink,
    state: SessionState,
}

impl<'s, CE, FS, L> TestOrchestrator<'s, CE, FS, L>
where
    CE: CommandExecutor + Clone,
    FS: FileSystem + Clone,
    L: ToolLocator,
{
    /// Create an orchestrator
    pub fn new(
        cmd_executor: CE,
        fs: FS,
        locator: L,
        cancel: CancelToken,
        sink: &'s dyn EventSink,
    ) -> Self {
        Self {
            toolchain: ToolChain::with_parts(cmd_executor.clone(), locator),
            cmd_executor,
            fs,
            cancel,
            sink,
            state: SessionState::Idle,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, to: SessionState) {
        log::debug!("Session state {:?} -> {:?}", self.state, to);
        self.state = to;
    }

    /// Run the whole session and persist its results.
    ///
    /// Fails before any run on configuration problems, and afterwards only
    /// when no run succeeded (nothing is written) or persistence fails.
    pub fn run(&mut self, config: &PerfTestConfig) -> Result<RawResultSet, HarnessError> {
        self.transition(SessionState::Preparing);
        self.prepare(config)?;
        let git_commit = GitRepository::with_executor(&config.project_dir, self.cmd_executor.clone())
            .commit_hash()
            .unwrap_or_else(|e| {
                log::debug!("No git commit recorded: {}", e);
                None
            });

        self.sink.emit(HarnessEvent::SessionStarted {
            repetitions: config.repetitions,
            output_dir: config.output_dir.clone(),
        });

        let runs = self.run_all(config);

        let successes = runs.iter().filter(|r| r.succeeded).count();
        if successes == 0 {
            return Err(HarnessError::NoSuccessfulRuns {
                attempted: runs.len(),
                last_failure: runs.last().and_then(|r| r.failure.clone()),
            });
        }

        let mut set = RawResultSet::new(
            &config.project_identity,
            &config.configuration,
            &config.package_name,
        );
        set.created_at = unix_now();
        set.git_commit = git_commit;
        set.repetitions = config.repetitions;
        set.aborted = self.state == SessionState::Aborted;
        set.cancelled = self.state == SessionState::Cancelled;
        set.runs = runs;

        self.transition(SessionState::Persisting);
        let path = RawResultStore::new(self.fs.clone())
            .save(&config.output_dir, &set)
            .map_err(HarnessError::Persistence)?;
        self.sink.emit(HarnessEvent::FileWritten {
            label: "raw results",
            path,
        });

        self.transition(SessionState::Done);
        Ok(set)
    }

    fn prepare(&self, config: &PerfTestConfig) -> Result<(), HarnessError> {
        if config.repetitions == 0 {
            return Err(HarnessError::config("repetitions must be at least 1"));
        }
        if !self.fs.exists(&config.project_dir) {
            return Err(HarnessError::config(format!(
                "project directory not found: {}",
                config.project_dir.display()
            )));
        }

        self.check_output_dir(&config.output_dir)?;

        self.toolchain
            .check_all(config.programs(), &config.project_dir)
            .map_err(|e| match e {
                ToolError::MissingTool(tool) => HarnessError::ToolMissing { tool },
                other => HarnessError::config(other.to_string()),
            })
    }

    /// The output directory must be fresh (or absent) and creatable
    fn check_output_dir(&self, output_dir: &Path) -> Result<(), HarnessError> {
        let unusable = |reason: String| HarnessError::OutputDirectory {
            path: output_dir.to_path_buf(),
            reason,
        };

        if RawResultStore::new(self.fs.clone()).exists_in(output_dir) {
            return Err(unusable("already contains raw results".to_string()));
        }

        let existing = output_dir
            .ancestors()
            .find(|dir| !dir.as_os_str().is_empty() && self.fs.exists(dir));
        if let Some(dir) = existing {
            let metadata = self
                .fs
                .metadata(dir)
                .map_err(|e| unusable(format!("cannot inspect {}: {}", dir.display(), e)))?;
            if !metadata.is_dir() {
                return Err(unusable(format!("{} is not a directory", dir.display())));
            }
            if metadata.permissions().readonly() {
                return Err(unusable(format!("{} is read-only", dir.display())));
            }
        }
        Ok(())
    }

    fn run_all(&mut self, config: &PerfTestConfig) -> Vec<RunRecord> {
        let executor = RunExecutor::new(
            self.cmd_executor.clone(),
            self.fs.clone(),
            self.cancel.clone(),
            self.sink,
        );
        let policy = config.policy;
        let mut runs = Vec::with_capacity(config.repetitions as usize);
        let mut consecutive_failures = 0u32;

        for run_index in 0..config.repetitions {
            if self.cancel.is_cancelled() {
                self.cancel_session();
                break;
            }

            self.transition(SessionState::Running(run_index));
            self.sink.emit(HarnessEvent::RunStarted {
                run_index,
                total: config.repetitions,
            });

            let record = executor.execute(config, run_index);
            self.sink.emit(HarnessEvent::RunFinished {
                run_index,
                succeeded: record.succeeded,
                duration_ms: record.duration_ms,
                failure: record.failure_reason(),
            });

            let failure = record.failure.clone();
            runs.push(record);

            let Some(failure) = failure else {
                consecutive_failures = 0;
                continue;
            };
            if failure.is_cancelled() {
                self.cancel_session();
                break;
            }

            consecutive_failures += 1;
            if policy.abort_on_build_failure && failure.stage == Stage::Build {
                self.abort_session(format!("build failed in run {}", run_index + 1));
                break;
            }
            if policy.max_consecutive_failures > 0
                && consecutive_failures >= policy.max_consecutive_failures
            {
                self.abort_session(format!("{} consecutive failed runs", consecutive_failures));
                break;
            }
        }

        runs
    }

    fn abort_session(&mut self, reason: String) {
        log::warn!("Aborting session: {}", reason);
        self.transition(SessionState::Aborted);
        self.sink.emit(HarnessEvent::SessionAborted { reason });
    }

    fn cancel_session(&mut self) {
        self.transition(SessionState::Cancelled);
        self.sink.emit(HarnessEvent::SessionCancelled);
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
