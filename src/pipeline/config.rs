//! Run configuration types

use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Placeholders a command template may reference
pub const PLACEHOLDERS: &[&str] = &[
    "package",
    "activity",
    "configuration",
    "project",
    "output",
    "run",
    "run_dir",
];

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_RE
        .get_or_init(|| Regex::new(r"\{([A-Za-z_]+)\}").expect("placeholder regex is valid"))
}

/// Values substituted into command templates for one run
#[derive(Debug, Clone)]
pub struct TemplateVars {
    /// Application package / bundle id
    pub package: String,
    /// Launchable activity
    pub activity: String,
    /// Build configuration
    pub configuration: String,
    /// Project directory
    pub project: PathBuf,
    /// Session output directory
    pub output: PathBuf,
    /// 0-based run index
    pub run: u32,
    /// Per-run artifact directory
    pub run_dir: PathBuf,
}

impl TemplateVars {
    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "package" => Some(self.package.clone()),
            "activity" => Some(self.activity.clone()),
            "configuration" => Some(self.configuration.clone()),
            "project" => Some(self.project.display().to_string()),
            "output" => Some(self.output.display().to_string()),
            "run" => Some(self.run.to_string()),
            "run_dir" => Some(self.run_dir.display().to_string()),
            _ => None,
        }
    }

    /// Substitute every known placeholder in `text`
    pub fn render(&self, text: &str) -> String {
        placeholder_regex()
            .replace_all(text, |caps: &regex::Captures| {
                self.lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// External command as program plus arguments, with `{placeholder}`s.
///
/// Arguments are passed to the program directly; no shell is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    argv: Vec<String>,
}

impl CommandTemplate {
    /// Create a template; `None` when `argv` is empty
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() || argv[0].trim().is_empty() {
            None
        } else {
            Some(Self { argv })
        }
    }

    /// Build from string slices (mainly for tests and defaults)
    pub fn from_slice(argv: &[&str]) -> Option<Self> {
        Self::new(argv.iter().map(|s| s.to_string()).collect())
    }

    /// Split a command line on whitespace
    pub fn parse(command_line: &str) -> Option<Self> {
        Self::new(command_line.split_whitespace().map(String::from).collect())
    }

    /// Program as written (placeholders unexpanded)
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Raw template arguments
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Placeholder names that are not in [`PLACEHOLDERS`]
    pub fn unknown_placeholders(&self) -> Vec<String> {
        self.argv
            .iter()
            .flat_map(|arg| placeholder_regex().captures_iter(arg))
            .map(|caps| caps[1].to_string())
            .filter(|name| !PLACEHOLDERS.contains(&name.as_str()))
            .collect()
    }

    /// Expand placeholders into a concrete argv
    pub fn render(&self, vars: &TemplateVars) -> Vec<String> {
        self.argv.iter().map(|arg| vars.render(arg)).collect()
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv.join(" "))
    }
}

/// Commands making up one run
#[derive(Debug, Clone)]
pub struct RunCommands {
    /// Builds the app
    pub build: CommandTemplate,
    /// Installs the built app on the device
    pub install: CommandTemplate,
    /// Starts the app, ideally printing `am start -W` timing lines
    pub launch: CommandTemplate,
    /// Stops the app before launch so every run is a cold start
    pub force_stop: Option<CommandTemplate>,
    /// Dumps the app's memory usage after the monitor window
    pub memory: Option<CommandTemplate>,
}

impl RunCommands {
    /// Every configured command
    pub fn iter(&self) -> impl Iterator<Item = &CommandTemplate> {
        [Some(&self.build), Some(&self.install), Some(&self.launch)]
            .into_iter()
            .chain([self.force_stop.as_ref(), self.memory.as_ref()])
            .flatten()
    }
}

/// Per-stage time limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Build command
    pub build: Duration,
    /// Install command
    pub deploy: Duration,
    /// Force-stop and launch commands, and the memory dump
    pub launch: Duration,
    /// How long a freshly started profiler must stay up before launching
    pub profiler_attach: Duration,
    /// Detach command, and the profiler's exit after it
    pub profiler_detach: Duration,
    /// Steady-state window between launch and collection
    pub monitor_window: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            build: Duration::from_secs(600),
            deploy: Duration::from_secs(300),
            launch: Duration::from_secs(60),
            profiler_attach: Duration::from_secs(2),
            profiler_detach: Duration::from_secs(60),
            monitor_window: Duration::from_secs(10),
        }
    }
}

/// When the orchestrator stops a session early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortPolicy {
    /// Abort after this many failed runs in a row (0 disables)
    pub max_consecutive_failures: u32,
    /// Abort on the first build failure
    pub abort_on_build_failure: bool,
}

impl Default for AbortPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
            abort_on_build_failure: false,
        }
    }
}

/// Which profiler a configuration belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilerKind {
    /// Runtime-level profiler (GC, JIT, allocations)
    Managed,
    /// Native sampling profiler
    Native,
}

impl ProfilerKind {
    /// Metric key prefix and config section name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::Native => "native",
        }
    }
}

/// An attachable profiler
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    /// Managed or native
    pub kind: ProfilerKind,
    /// Long-running command started before launch
    pub attach: CommandTemplate,
    /// Command that tells the profiler to stop and flush
    pub detach: Option<CommandTemplate>,
    /// Artifact path the profiler writes (placeholders allowed)
    pub artifact: Option<String>,
}

/// Complete, validated configuration of a measurement session
#[derive(Debug, Clone)]
pub struct PerfTestConfig {
    /// Project directory; commands run here
    pub project_dir: PathBuf,
    /// Name recorded in the raw result set
    pub project_identity: String,
    /// Application package / bundle id
    pub package_name: String,
    /// Launchable activity
    pub activity: String,
    /// Build configuration (e.g. `Release`)
    pub configuration: String,
    /// Number of runs
    pub repetitions: u32,
    /// Directory receiving raw results and run artifacts
    pub output_dir: PathBuf,
    /// External commands
    pub commands: RunCommands,
    /// Per-stage time limits
    pub timeouts: Timeouts,
    /// Early abort rules
    pub policy: AbortPolicy,
    /// Managed profiler, when requested
    pub managed_profiler: Option<ProfilerConfig>,
    /// Native profiler, when requested
    pub native_profiler: Option<ProfilerConfig>,
}

impl PerfTestConfig {
    /// Requested profilers, managed first
    pub fn profilers(&self) -> impl Iterator<Item = &ProfilerConfig> {
        self.managed_profiler
            .iter()
            .chain(self.native_profiler.iter())
    }

    /// Every external program the session will start
    pub fn programs(&self) -> Vec<&str> {
        self.commands
            .iter()
            .chain(
                self.profilers()
                    .flat_map(|p| std::iter::once(&p.attach).chain(p.detach.as_ref())),
            )
            .map(CommandTemplate::program)
            .collect()
    }

    /// Artifact directory of one run
    pub fn run_dir(&self, run_index: u32) -> PathBuf {
        run_dir(&self.output_dir, run_index)
    }

    /// Template values for one run
    pub fn vars(&self, run_index: u32) -> TemplateVars {
        TemplateVars {
            package: self.package_name.clone(),
            activity: self.activity.clone(),
            configuration: self.configuration.clone(),
            project: self.project_dir.clone(),
            output: self.output_dir.clone(),
            run: run_index,
            run_dir: self.run_dir(run_index),
        }
    }
}

/// `<output>/runs/run-<index>`
pub fn run_dir(output_dir: &Path, run_index: u32) -> PathBuf {
    output_dir.join("runs").join(format!("run-{}", run_index))
}
