//! Run executor: one build, deploy, launch, monitor, collect cycle
//!
//! [`RunExecutor::execute`] never fails. Whatever goes wrong ends up
//! categorized inside the returned [`RunRecord`], together with every sample
//! collected before the failure.

use crate::infra::{CancelToken, CommandExecutor, FileSystem};
use crate::results::{FailureCause, MetricSample, Phase, RunFailure, RunRecord, SampleSet, Stage};
use crate::telemetry::{EventSink, HarnessEvent};
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use super::collect::{
    duration_sample, parse_launch_output, parse_total_pss, BUILD_DURATION, DEPLOY_DURATION,
    LAUNCH_DURATION,
};
use super::config::{PerfTestConfig, ProfilerKind, TemplateVars};
use super::profiler::AttachedProfiler;
use super::tool_runner::ToolRunner;

/// Everything a run accumulates while its stages execute
#[derive(Default)]
struct RunState {
    samples: SampleSet,
    profilers: Vec<AttachedProfiler>,
    managed_artifact: Option<PathBuf>,
    native_artifact: Option<PathBuf>,
}

impl RunState {
    fn record(&mut self, samples: impl IntoIterator<Item = MetricSample>) -> Result<(), RunFailure> {
        self.samples.extend(samples).map_err(|dup| {
            RunFailure::new(
                Stage::Collect,
                FailureCause::InvalidOutput {
                    message: dup.to_string(),
                },
            )
        })
    }

    fn abandon_profilers(&mut self) {
        for mut profiler in self.profilers.drain(..) {
            profiler.abandon();
        }
    }
}

/// Executes single runs
pub struct RunExecutor<'s, CE: CommandExecutor, FS: FileSystem> {
    cmd_executor: CE,
    fs: FS,
    cancel: CancelToken,
    sink: &'s dyn EventSink,
}

impl<'s, CE: CommandExecutor + Clone, FS: FileSystem> RunExecutor<'s, CE, FS> {
    /// Create an executor
    pub fn new(cmd_executor: CE, fs: FS, cancel: CancelToken, sink: &'s dyn EventSink) -> Self {
        Self {
            cmd_executor,
            fs,
            cancel,
            sink,
        }
    }

    /// Execute run `run_index` of `config`
    pub fn execute(&self, config: &PerfTestConfig, run_index: u32) -> RunRecord {
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let started = Instant::now();

        let runner = ToolRunner::new(&config.project_dir, self.cmd_executor.clone());
        let vars = config.vars(run_index);
        let mut state = RunState::default();

        let outcome = self.run_stages(config, &runner, &vars, &mut state);
        if outcome.is_err() {
            state.abandon_profilers();
        }

        let failure = outcome.err();
        if let Some(ref failure) = failure {
            log::warn!("Run {} failed: {}", run_index, failure);
        }

        RunRecord {
            run_index,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            succeeded: failure.is_none(),
            failure,
            samples: state.samples.into_vec(),
            managed_profile_artifact: state.managed_artifact,
            native_profile_artifact: state.native_artifact,
        }
    }

    fn stage(&self, run_index: u32, stage: Stage) {
        self.sink.emit(HarnessEvent::StageStarted { run_index, stage });
    }

    fn run_stages(
        &self,
        config: &PerfTestConfig,
        runner: &ToolRunner<CE>,
        vars: &TemplateVars,
        state: &mut RunState,
    ) -> Result<(), RunFailure> {
        let run_index = vars.run;
        let timeouts = &config.timeouts;
        let cancel = &self.cancel;

        self.stage(run_index, Stage::Build);
        let build = runner.run(Stage::Build, &config.commands.build, vars, timeouts.build, cancel)?;
        state.record([duration_sample(BUILD_DURATION, Phase::Build, build.elapsed)])?;

        self.stage(run_index, Stage::Deploy);
        let deploy = runner.run(
            Stage::Deploy,
            &config.commands.install,
            vars,
            timeouts.deploy,
            cancel,
        )?;
        state.record([duration_sample(DEPLOY_DURATION, Phase::Install, deploy.elapsed)])?;

        self.stage(run_index, Stage::Launch);
        if let Some(force_stop) = &config.commands.force_stop {
            runner.run(Stage::Launch, force_stop, vars, timeouts.launch, cancel)?;
        }

        if config.profilers().next().is_some() {
            self.stage(run_index, Stage::ProfilerAttach);
            self.fs
                .create_dir_all(&vars.run_dir)
                .map_err(|e| {
                    RunFailure::new(
                        Stage::ProfilerAttach,
                        FailureCause::Spawn {
                            message: format!("cannot create {}: {}", vars.run_dir.display(), e),
                        },
                    )
                })?;
            for profiler in config.profilers() {
                let attached =
                    AttachedProfiler::attach(runner, profiler, vars, timeouts.profiler_attach, cancel)?;
                state.profilers.push(attached);
            }
        }

        let launch = runner.run(Stage::Launch, &config.commands.launch, vars, timeouts.launch, cancel)?;
        state.record([duration_sample(LAUNCH_DURATION, Phase::Launch, launch.elapsed)])?;
        let launch_samples = parse_launch_output(&launch.stdout).map_err(|message| {
            RunFailure::new(Stage::Launch, FailureCause::InvalidOutput { message })
        })?;
        state.record(launch_samples)?;

        if !cancel.sleep(timeouts.monitor_window) {
            return Err(RunFailure::cancelled(Stage::Launch));
        }

        self.stage(run_index, Stage::Collect);
        if let Some(memory) = &config.commands.memory {
            let dump = runner.run(Stage::Collect, memory, vars, timeouts.launch, cancel)?;
            let pss = parse_total_pss(&dump.stdout).ok_or_else(|| {
                RunFailure::new(
                    Stage::Collect,
                    FailureCause::InvalidOutput {
                        message: "memory dump has no TOTAL PSS line".to_string(),
                    },
                )
            })?;
            state.record([pss])?;
        }

        if !state.profilers.is_empty() {
            self.stage(run_index, Stage::ProfilerDetach);
        }
        while !state.profilers.is_empty() {
            let profiler = state.profilers.remove(0);
            let kind = profiler.config().kind;
            let output =
                profiler.detach(runner, &self.fs, vars, timeouts.profiler_detach, cancel)?;
            state.record(output.samples)?;
            match kind {
                ProfilerKind::Managed => state.managed_artifact = output.artifact,
                ProfilerKind::Native => state.native_artifact = output.artifact,
            }
        }

        Ok(())
    }
}
