//! Stage command execution
//!
//! Renders command templates and runs them under a stage timeout, turning
//! every way a process can go wrong into a categorized [`RunFailure`].

use crate::infra::{AttachedProcess, CancelToken, CommandExecutor, Supervised};
use crate::results::{FailureCause, RunFailure, Stage};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use super::config::{CommandTemplate, TemplateVars};

/// How much of a failing command's stderr is logged
const STDERR_TAIL_LINES: usize = 20;

/// Captured result of a successful stage command
#[derive(Debug, Clone)]
pub struct StageOutput {
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Wall time from spawn to exit
    pub elapsed: Duration,
}

/// Runs stage commands in the project directory
pub struct ToolRunner<CE: CommandExecutor> {
    project_dir: PathBuf,
    cmd_executor: CE,
}

impl<CE: CommandExecutor> ToolRunner<CE> {
    /// Create a runner that starts commands in `project_dir`
    pub fn new(project_dir: impl Into<PathBuf>, cmd_executor: CE) -> Self {
        Self {
            project_dir: project_dir.into(),
            cmd_executor,
        }
    }

    /// Directory commands are started in
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    fn command(&self, template: &CommandTemplate, vars: &TemplateVars) -> Command {
        let argv = template.render(vars);
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]).current_dir(&self.project_dir);
        cmd
    }

    /// Run a command to completion under `timeout`.
    ///
    /// Succeeds only when the process exits with status 0.
    pub fn run(
        &self,
        stage: Stage,
        template: &CommandTemplate,
        vars: &TemplateVars,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<StageOutput, RunFailure> {
        if cancel.is_cancelled() {
            return Err(RunFailure::cancelled(stage));
        }

        let mut cmd = self.command(template, vars);
        log::debug!("[{}] running {:?}", stage.as_str(), cmd);

        let started = Instant::now();
        let supervised = self
            .cmd_executor
            .supervise(&mut cmd, timeout, cancel)
            .map_err(|e| {
                RunFailure::new(
                    stage,
                    FailureCause::Spawn {
                        message: format!("{}: {}", template.program(), e),
                    },
                )
            })?;
        let elapsed = started.elapsed();

        match supervised {
            Supervised::Exited(output) if output.status.success() => Ok(StageOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                elapsed,
            }),
            Supervised::Exited(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let lines: Vec<&str> = stderr.lines().collect();
                let tail = &lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..];
                log::warn!(
                    "[{}] {} exited with {}",
                    stage.as_str(),
                    template.program(),
                    output.status
                );
                for line in tail {
                    log::debug!("[{}] stderr: {}", stage.as_str(), line);
                }
                Err(RunFailure::exit(stage, output.status.code()))
            }
            Supervised::TimedOut { elapsed } => {
                log::warn!(
                    "[{}] {} killed after {:.1}s",
                    stage.as_str(),
                    template.program(),
                    elapsed.as_secs_f64()
                );
                Err(RunFailure::timeout(stage, timeout))
            }
            Supervised::Cancelled => Err(RunFailure::cancelled(stage)),
        }
    }

    /// Start a command in the background
    pub fn spawn(
        &self,
        stage: Stage,
        template: &CommandTemplate,
        vars: &TemplateVars,
    ) -> Result<Box<dyn AttachedProcess>, RunFailure> {
        let mut cmd = self.command(template, vars);
        log::debug!("[{}] starting {:?}", stage.as_str(), cmd);

        self.cmd_executor.spawn_attached(&mut cmd).map_err(|e| {
            RunFailure::new(
                stage,
                FailureCause::Spawn {
                    message: format!("{}: {}", template.program(), e),
                },
            )
        })
    }
}
