//! Resolution of file settings and CLI flags into validated configs
//!
//! Precedence is flag, then `.mobperf.toml`, then built-in default.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::file::{CompareSettings, ConfigFile, ProfilerSection};
use crate::compare::{CompareConfig, ThresholdPolicy, COMPARISON_REPORT_FILE};
use crate::error::HarnessError;
use crate::pipeline::{
    AbortPolicy, CommandTemplate, PerfTestConfig, ProfilerConfig, ProfilerKind, RunCommands,
    Timeouts,
};

/// Activity launched when none is configured
pub const DEFAULT_ACTIVITY: &str = ".MainActivity";
/// Build configuration used when none is configured
pub const DEFAULT_CONFIGURATION: &str = "Release";
/// Runs per session when none is configured
pub const DEFAULT_REPETITIONS: u32 = 5;

const DEFAULT_BUILD: &[&str] = &[
    "dotnet",
    "build",
    "-c",
    "{configuration}",
    "-f",
    "net8.0-android",
];
const DEFAULT_INSTALL: &[&str] = &[
    "dotnet",
    "build",
    "-t:Install",
    "-c",
    "{configuration}",
    "-f",
    "net8.0-android",
];
const DEFAULT_LAUNCH: &[&str] = &[
    "adb",
    "shell",
    "am",
    "start",
    "-W",
    "-n",
    "{package}/{activity}",
];
const DEFAULT_FORCE_STOP: &[&str] = &["adb", "shell", "am", "force-stop", "{package}"];
const DEFAULT_MEMORY: &[&str] = &["adb", "shell", "dumpsys", "meminfo", "{package}"];

/// Flags of `mobperf run`
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    /// Number of runs
    pub repetitions: Option<u32>,
    /// Application package
    pub package: Option<String>,
    /// Build command line (split on whitespace)
    pub build_command: Option<String>,
    /// Build configuration
    pub configuration: Option<String>,
    /// Output directory, used as given
    pub output: Option<PathBuf>,
    /// Attach the managed profiler
    pub managed_profile: bool,
    /// Attach the native profiler
    pub native_profile: bool,
    /// Early abort threshold
    pub max_consecutive_failures: Option<u32>,
}

/// Flags of `mobperf compare`
#[derive(Debug, Clone, Default)]
pub struct CompareOverrides {
    /// Report destination
    pub output: Option<PathBuf>,
    /// JSON output
    pub json: bool,
    /// Exit non-zero on regressions
    pub fail_on_regression: bool,
    /// Minimum samples per side
    pub min_samples: Option<usize>,
    /// Noise gate multiplier
    pub noise_multiplier: Option<f64>,
    /// Relative magnitude gate
    pub min_change_percent: Option<f64>,
}

/// Turns [`ConfigFile`] plus flags into validated configs
pub struct ConfigResolver;

impl ConfigResolver {
    /// Resolve the configuration of a measurement session.
    ///
    /// `project_dir` should already be canonical; its last component becomes
    /// the project identity.
    pub fn resolve_run(
        project_dir: &Path,
        file: &ConfigFile,
        overrides: &RunOverrides,
    ) -> Result<PerfTestConfig, HarnessError> {
        let package_name = overrides
            .package
            .clone()
            .or_else(|| file.package.clone())
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                HarnessError::config("no package name; pass --package or set `package`")
            })?;

        let repetitions = overrides
            .repetitions
            .or(file.repetitions)
            .unwrap_or(DEFAULT_REPETITIONS);
        if repetitions == 0 {
            return Err(HarnessError::config("repetitions must be at least 1"));
        }

        let output_dir = match (&overrides.output, &file.output_dir) {
            (Some(output), _) => std::path::absolute(output).map_err(|e| {
                HarnessError::config(format!(
                    "cannot resolve output directory {}: {}",
                    output.display(),
                    e
                ))
            })?,
            (None, Some(dir)) => project_dir.join(dir),
            (None, None) => default_output_dir(project_dir),
        };

        let build = match &overrides.build_command {
            Some(line) => CommandTemplate::parse(line)
                .ok_or_else(|| HarnessError::config("--build-command is empty"))?,
            None => required_command("build", &file.commands.build, DEFAULT_BUILD)?,
        };
        let commands = RunCommands {
            build,
            install: required_command("install", &file.commands.install, DEFAULT_INSTALL)?,
            launch: required_command("launch", &file.commands.launch, DEFAULT_LAUNCH)?,
            force_stop: optional_command(&file.commands.force_stop, DEFAULT_FORCE_STOP),
            memory: optional_command(&file.commands.memory, DEFAULT_MEMORY),
        };

        let managed_profiler = requested_profiler(
            ProfilerKind::Managed,
            overrides.managed_profile,
            &file.profilers.managed,
        )?;
        let native_profiler = requested_profiler(
            ProfilerKind::Native,
            overrides.native_profile,
            &file.profilers.native,
        )?;

        let config = PerfTestConfig {
            project_dir: project_dir.to_path_buf(),
            project_identity: project_identity(project_dir),
            package_name,
            activity: file
                .activity
                .clone()
                .unwrap_or_else(|| DEFAULT_ACTIVITY.to_string()),
            configuration: overrides
                .configuration
                .clone()
                .or_else(|| file.configuration.clone())
                .unwrap_or_else(|| DEFAULT_CONFIGURATION.to_string()),
            repetitions,
            output_dir,
            commands,
            timeouts: resolve_timeouts(file)?,
            policy: AbortPolicy {
                max_consecutive_failures: overrides
                    .max_consecutive_failures
                    .or(file.policy.max_consecutive_failures)
                    .unwrap_or(AbortPolicy::default().max_consecutive_failures),
                abort_on_build_failure: file.policy.abort_on_build_failure.unwrap_or(false),
            },
            managed_profiler,
            native_profiler,
        };

        check_placeholders(&config)?;
        Ok(config)
    }

    /// Resolve the comparison gates from file settings alone
    pub fn resolve_policy(settings: &CompareSettings) -> ThresholdPolicy {
        let defaults = ThresholdPolicy::default();
        let alpha = settings.alpha.or(defaults.alpha);
        ThresholdPolicy {
            min_samples: settings.min_samples.unwrap_or(defaults.min_samples),
            noise_multiplier: settings.noise_multiplier.unwrap_or(defaults.noise_multiplier),
            min_change_percent: settings
                .min_change_percent
                .unwrap_or(defaults.min_change_percent),
            zero_baseline_abs_threshold: settings
                .zero_baseline_abs_threshold
                .unwrap_or(defaults.zero_baseline_abs_threshold),
            alpha: if settings.significance_test.unwrap_or(true) {
                alpha
            } else {
                None
            },
            polarity: settings.polarity.clone(),
        }
    }

    /// Resolve the configuration of a comparison.
    ///
    /// The report defaults to `comparison-report.txt` inside the candidate
    /// directory.
    pub fn resolve_compare(
        baseline_dir: PathBuf,
        candidate_dir: PathBuf,
        file: &ConfigFile,
        overrides: &CompareOverrides,
    ) -> Result<CompareConfig, HarnessError> {
        let mut policy = Self::resolve_policy(&file.compare);
        if let Some(min_samples) = overrides.min_samples {
            policy.min_samples = min_samples;
        }
        if let Some(multiplier) = overrides.noise_multiplier {
            policy.noise_multiplier = multiplier;
        }
        if let Some(percent) = overrides.min_change_percent {
            policy.min_change_percent = percent;
        }
        policy.validate().map_err(HarnessError::config)?;

        let output = overrides
            .output
            .clone()
            .unwrap_or_else(|| candidate_dir.join(COMPARISON_REPORT_FILE));

        Ok(CompareConfig {
            baseline_dir,
            candidate_dir,
            output,
            json: overrides.json,
            fail_on_regression: overrides.fail_on_regression,
            policy,
        })
    }
}

/// `<project>/perf-results/session-<unix seconds>`
pub fn default_output_dir(project_dir: &Path) -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    project_dir
        .join("perf-results")
        .join(format!("session-{}", secs))
}

fn project_identity(project_dir: &Path) -> String {
    project_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| project_dir.display().to_string())
}

fn required_command(
    name: &str,
    configured: &Option<Vec<String>>,
    default: &[&str],
) -> Result<CommandTemplate, HarnessError> {
    match configured {
        Some(argv) => CommandTemplate::new(argv.clone())
            .ok_or_else(|| HarnessError::config(format!("commands.{} must not be empty", name))),
        None => CommandTemplate::from_slice(default)
            .ok_or_else(|| HarnessError::config(format!("no default {} command", name))),
    }
}

fn optional_command(configured: &Option<Vec<String>>, default: &[&str]) -> Option<CommandTemplate> {
    match configured {
        Some(argv) => CommandTemplate::new(argv.clone()),
        None => CommandTemplate::from_slice(default),
    }
}

fn requested_profiler(
    kind: ProfilerKind,
    requested: bool,
    section: &Option<ProfilerSection>,
) -> Result<Option<ProfilerConfig>, HarnessError> {
    if !requested {
        return Ok(None);
    }
    let section = section.as_ref().ok_or_else(|| {
        HarnessError::config(format!(
            "--{}-profile given but [profilers.{}] is not configured",
            kind.as_str(),
            kind.as_str()
        ))
    })?;
    let attach = CommandTemplate::new(section.attach.clone()).ok_or_else(|| {
        HarnessError::config(format!("profilers.{}.attach must not be empty", kind.as_str()))
    })?;
    Ok(Some(ProfilerConfig {
        kind,
        attach,
        detach: section.detach.clone().and_then(CommandTemplate::new),
        artifact: section.artifact.clone(),
    }))
}

fn resolve_timeouts(file: &ConfigFile) -> Result<Timeouts, HarnessError> {
    let defaults = Timeouts::default();
    let t = &file.timeouts;
    let positive = |name: &str, value: Option<u64>, default: Duration| match value {
        Some(0) => Err(HarnessError::config(format!(
            "timeouts.{} must be greater than 0",
            name
        ))),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(default),
    };

    Ok(Timeouts {
        build: positive("build-secs", t.build_secs, defaults.build)?,
        deploy: positive("deploy-secs", t.deploy_secs, defaults.deploy)?,
        launch: positive("launch-secs", t.launch_secs, defaults.launch)?,
        profiler_attach: positive(
            "profiler-attach-secs",
            t.profiler_attach_secs,
            defaults.profiler_attach,
        )?,
        profiler_detach: positive(
            "profiler-detach-secs",
            t.profiler_detach_secs,
            defaults.profiler_detach,
        )?,
        monitor_window: t
            .monitor_window_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.monitor_window),
    })
}

fn check_placeholders(config: &PerfTestConfig) -> Result<(), HarnessError> {
    let templates = config.commands.iter().chain(
        config
            .profilers()
            .flat_map(|p| std::iter::once(&p.attach).chain(p.detach.as_ref())),
    );
    for template in templates {
        let unknown = template.unknown_placeholders();
        if !unknown.is_empty() {
            return Err(HarnessError::config(format!(
                "unknown placeholder {{{}}} in `{}`",
                unknown.join("}, {"),
                template
            )));
        }
    }
    for profiler in config.profilers() {
        let Some(artifact) = &profiler.artifact else {
            continue;
        };
        let unknown = CommandTemplate::from_slice(&[artifact.as_str()])
            .map(|t| t.unknown_placeholders())
            .unwrap_or_default();
        if !unknown.is_empty() {
            return Err(HarnessError::config(format!(
                "unknown placeholder {{{}}} in profilers.{}.artifact",
                unknown.join("}, {"),
                profiler.kind.as_str()
            )));
        }
    }
    Ok(())
}
