//! Profiler attach/detach
//!
//! A profiler is a background process started before launch. It is stopped
//! either by its detach command (after which it must exit on its own) or,
//! when none is configured, by killing it.

use crate::infra::{AttachedProcess, CancelToken, CommandExecutor, FileSystem, Supervised};
use crate::results::{FailureCause, MetricSample, RunFailure, Stage};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::collect::parse_profiler_metrics;
use super::config::{ProfilerConfig, TemplateVars};
use super::tool_runner::ToolRunner;

const SETTLE_POLL: Duration = Duration::from_millis(25);

/// What a detached profiler left behind
#[derive(Debug, Default)]
pub struct ProfilerOutput {
    /// Metric lines printed by the profiler or its detach command
    pub samples: Vec<MetricSample>,
    /// Artifact file, when it exists
    pub artifact: Option<PathBuf>,
}

/// A running profiler
pub struct AttachedProfiler {
    config: ProfilerConfig,
    process: Box<dyn AttachedProcess>,
}

impl std::fmt::Debug for AttachedProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedProfiler")
            .field("kind", &self.config.kind)
            .field("pid", &self.process.id())
            .finish()
    }
}

impl AttachedProfiler {
    /// Start a profiler and wait `settle` for it to come up.
    ///
    /// A profiler that exits non-zero inside the settle window failed to
    /// attach. One that exits 0 is assumed to have handed off to a
    /// device-side daemon.
    pub fn attach<CE: CommandExecutor>(
        runner: &ToolRunner<CE>,
        config: &ProfilerConfig,
        vars: &TemplateVars,
        settle: Duration,
        cancel: &CancelToken,
    ) -> Result<Self, RunFailure> {
        if cancel.is_cancelled() {
            return Err(RunFailure::cancelled(Stage::ProfilerAttach));
        }

        let process = runner.spawn(Stage::ProfilerAttach, &config.attach, vars)?;
        let mut profiler = Self {
            config: config.clone(),
            process,
        };
        log::info!(
            "Attached {} profiler (pid {})",
            config.kind.as_str(),
            profiler.process.id()
        );

        let deadline = Instant::now() + settle;
        loop {
            match profiler.process.try_finished() {
                Ok(Some(status)) if !status.success() => {
                    return Err(RunFailure::exit(Stage::ProfilerAttach, status.code()));
                }
                Ok(Some(_)) => {
                    log::debug!("{} profiler exited 0 while settling", config.kind.as_str());
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    profiler.abandon();
                    return Err(RunFailure::new(
                        Stage::ProfilerAttach,
                        FailureCause::Spawn {
                            message: e.to_string(),
                        },
                    ));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if !cancel.sleep(SETTLE_POLL.min(deadline - now)) {
                profiler.abandon();
                return Err(RunFailure::cancelled(Stage::ProfilerAttach));
            }
        }

        Ok(profiler)
    }

    /// Stop the profiler and gather its output.
    ///
    /// The process is always gone when this returns, whatever the outcome.
    pub fn detach<CE: CommandExecutor, FS: FileSystem>(
        mut self,
        runner: &ToolRunner<CE>,
        fs: &FS,
        vars: &TemplateVars,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<ProfilerOutput, RunFailure> {
        let kind = self.config.kind;
        let mut stdout = String::new();

        match self.config.detach.clone() {
            Some(detach) => {
                let result = runner.run(Stage::ProfilerDetach, &detach, vars, timeout, cancel);
                match result {
                    Ok(output) => stdout.push_str(&output.stdout),
                    Err(failure) => {
                        self.abandon();
                        return Err(failure);
                    }
                }

                match self.process.wait_finished(timeout, cancel) {
                    Ok(Supervised::Exited(output)) => {
                        log::debug!("{} profiler exited with {}", kind.as_str(), output.status);
                        stdout.push('\n');
                        stdout.push_str(&String::from_utf8_lossy(&output.stdout));
                    }
                    Ok(Supervised::TimedOut { .. }) => {
                        return Err(RunFailure::timeout(Stage::ProfilerDetach, timeout));
                    }
                    Ok(Supervised::Cancelled) => {
                        return Err(RunFailure::cancelled(Stage::ProfilerDetach));
                    }
                    Err(e) => {
                        self.abandon();
                        return Err(RunFailure::new(
                            Stage::ProfilerDetach,
                            FailureCause::Spawn {
                                message: e.to_string(),
                            },
                        ));
                    }
                }
            }
            None => self.abandon(),
        }

        let artifact = self
            .config
            .artifact
            .as_deref()
            .map(|template| runner.project_dir().join(vars.render(template)))
            .filter(|path| fs.exists(path));
        if artifact.is_none() && self.config.artifact.is_some() {
            log::warn!("{} profiler produced no artifact", kind.as_str());
        }

        Ok(ProfilerOutput {
            samples: parse_profiler_metrics(kind, &stdout),
            artifact,
        })
    }

    /// Kill the profiler without collecting anything
    pub fn abandon(&mut self) {
        if let Err(e) = self.process.kill() {
            log::warn!(
                "Failed to kill {} profiler (pid {}): {}",
                self.config.kind.as_str(),
                self.process.id(),
                e
            );
        }
    }

    /// Which profiler this is
    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::mock::{Response, ScriptedExecutor};
    use crate::infra::RealFileSystem;
    use crate::pipeline::config::{CommandTemplate, ProfilerKind};
    use std::path::Path;

    fn managed(detach: Option<&[&str]>, artifact: Option<&str>) -> ProfilerConfig {
        ProfilerConfig {
            kind: ProfilerKind::Managed,
            attach: CommandTemplate::from_slice(&["tracer", "collect"]).unwrap(),
            detach: detach.and_then(CommandTemplate::from_slice),
            artifact: artifact.map(String::from),
        }
    }

    fn vars(output: &Path) -> TemplateVars {
        crate::pipeline::config::fixtures::perf_config(output).vars(0)
    }

    #[test]
    fn test_attach_fails_when_profiler_crashes_while_settling() {
        let executor = ScriptedExecutor::new().on("tracer", Response::Exit(2, String::new()));
        let runner = ToolRunner::new("/work/app", executor);

        let failure = AttachedProfiler::attach(
            &runner,
            &managed(None, None),
            &vars(Path::new("/tmp/out")),
            Duration::ZERO,
            &CancelToken::new(),
        )
        .unwrap_err();

        assert_eq!(failure.stage, Stage::ProfilerAttach);
        assert_eq!(failure.cause, FailureCause::Exit { code: Some(2) });
    }

    #[test]
    fn test_attach_spawn_error_is_categorized() {
        let executor = ScriptedExecutor::new().on("tracer", Response::SpawnError);
        let runner = ToolRunner::new("/work/app", executor);

        let failure = AttachedProfiler::attach(
            &runner,
            &managed(None, None),
            &vars(Path::new("/tmp/out")),
            Duration::ZERO,
            &CancelToken::new(),
        )
        .unwrap_err();

        assert!(matches!(failure.cause, FailureCause::Spawn { .. }));
    }

    #[test]
    fn test_detach_collects_metrics_from_detach_and_profiler_output() {
        let executor = ScriptedExecutor::new()
            .on("stop-tracer", Response::Exit(0, "flush.time: 8 ms\n".into()))
            .on("tracer", Response::Exit(0, "gc.count = 3\n".into()));
        let runner = ToolRunner::new("/work/app", executor.clone());
        let cancel = CancelToken::new();
        let vars = vars(Path::new("/tmp/out"));

        let profiler = AttachedProfiler::attach(
            &runner,
            &managed(Some(&["stop-tracer"]), None),
            &vars,
            Duration::ZERO,
            &cancel,
        )
        .unwrap();
        let output = profiler
            .detach(&runner, &RealFileSystem, &vars, Duration::from_secs(5), &cancel)
            .unwrap();

        let keys: Vec<_> = output.samples.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["managed.flush.time", "managed.gc.count"]);
        assert_eq!(executor.calls_matching("stop-tracer"), 1);
    }

    #[test]
    fn test_detach_timeout_is_a_detach_failure() {
        let executor = ScriptedExecutor::new()
            .on("stop-tracer", Response::Exit(0, String::new()))
            .on("tracer", Response::Timeout);
        let runner = ToolRunner::new("/work/app", executor);
        let cancel = CancelToken::new();
        let vars = vars(Path::new("/tmp/out"));

        let profiler = AttachedProfiler::attach(
            &runner,
            &managed(Some(&["stop-tracer"]), None),
            &vars,
            Duration::ZERO,
            &cancel,
        )
        .unwrap();
        let failure = profiler
            .detach(&runner, &RealFileSystem, &vars, Duration::from_secs(9), &cancel)
            .unwrap_err();

        assert_eq!(failure.stage, Stage::ProfilerDetach);
        assert!(failure.is_timeout());
    }

    #[test]
    fn test_detach_records_artifact_only_when_present() {
        let temp_dir = tempfile::tempdir().unwrap();
        let executor = ScriptedExecutor::new();
        let runner = ToolRunner::new(temp_dir.path(), executor);
        let cancel = CancelToken::new();
        let vars = vars(temp_dir.path());

        std::fs::write(temp_dir.path().join("present.trace"), b"trace").unwrap();

        let present = AttachedProfiler::attach(
            &runner,
            &managed(None, Some("present.trace")),
            &vars,
            Duration::ZERO,
            &cancel,
        )
        .unwrap()
        .detach(&runner, &RealFileSystem, &vars, Duration::from_secs(1), &cancel)
        .unwrap();
        assert_eq!(present.artifact, Some(temp_dir.path().join("present.trace")));

        let absent = AttachedProfiler::attach(
            &runner,
            &managed(None, Some("{run_dir}/absent.trace")),
            &vars,
            Duration::ZERO,
            &cancel,
        )
        .unwrap()
        .detach(&runner, &RealFileSystem, &vars, Duration::from_secs(1), &cancel)
        .unwrap();
        assert!(absent.artifact.is_none());
    }
}
