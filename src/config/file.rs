//! Configuration file data structures
//!
//! Every field is optional; anything left out falls back to a built-in
//! default when the file is resolved into a
//! [`PerfTestConfig`](crate::pipeline::PerfTestConfig).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::compare::Polarity;

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = ".mobperf.toml";

/// `.mobperf.toml` structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigFile {
    /// Application package / bundle id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// Launchable activity (`.MainActivity` when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,

    /// Build configuration (`Release` when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,

    /// Runs per session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetitions: Option<u32>,

    /// Session output directory, relative to the project
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// External commands
    #[serde(default)]
    pub commands: CommandSettings,

    /// Per-stage limits in seconds
    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// Early abort rules
    #[serde(default)]
    pub policy: PolicySettings,

    /// Profiler definitions
    #[serde(default)]
    pub profilers: ProfilerSettings,

    /// Comparison gates
    #[serde(default)]
    pub compare: CompareSettings,
}

/// `[commands]`: argv arrays with `{placeholder}` substitution.
///
/// An empty array disables an optional command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommandSettings {
    /// Build command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<Vec<String>>,
    /// Install command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<Vec<String>>,
    /// Launch command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch: Option<Vec<String>>,
    /// Force-stop command run before launch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_stop: Option<Vec<String>>,
    /// Memory dump command run after the monitor window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<Vec<String>>,
}

/// `[timeouts]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TimeoutSettings {
    /// Build stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_secs: Option<u64>,
    /// Deploy stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_secs: Option<u64>,
    /// Launch stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_secs: Option<u64>,
    /// Profiler settle window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiler_attach_secs: Option<u64>,
    /// Profiler detach
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiler_detach_secs: Option<u64>,
    /// Steady-state monitor window (0 allowed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_window_secs: Option<u64>,
}

/// `[policy]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicySettings {
    /// Abort after this many failed runs in a row (0 disables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_consecutive_failures: Option<u32>,
    /// Abort on the first build failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_on_build_failure: Option<bool>,
}

/// `[profilers.managed]` / `[profilers.native]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilerSettings {
    /// Managed runtime profiler
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed: Option<ProfilerSection>,
    /// Native profiler
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<ProfilerSection>,
}

/// One profiler definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProfilerSection {
    /// Long-running command started before launch
    pub attach: Vec<String>,
    /// Command that stops the profiler
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detach: Option<Vec<String>>,
    /// Artifact path the profiler writes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

/// `[compare]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CompareSettings {
    /// Minimum samples per side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_samples: Option<usize>,
    /// Noise gate multiplier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_multiplier: Option<f64>,
    /// Relative magnitude gate (percent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_change_percent: Option<f64>,
    /// Absolute magnitude gate around zero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zero_baseline_abs_threshold: Option<f64>,
    /// Run Welch's t-test
    #[serde(skip_serializing_if = "Option::is_none")]
    pub significance_test: Option<bool>,
    /// Significance level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    /// Per-key polarity overrides
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub polarity: BTreeMap<String, Polarity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: ConfigFile = toml_edit::de::from_str("").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_full_file_parses_kebab_case_sections() {
        let toml = r#"
package = "com.example.app"
repetitions = 10
output-dir = "perf"

[commands]
build = ["dotnet", "build", "-c", "{configuration}"]
force-stop = []

[timeouts]
monitor-window-secs = 0
profiler-detach-secs = 30

[policy]
max-consecutive-failures = 0
abort-on-build-failure = true

[profilers.managed]
attach = ["dotnet-trace", "collect", "-o", "{run_dir}/trace.nettrace"]
artifact = "{run_dir}/trace.nettrace"

[compare]
min-samples = 5
significance-test = false

[compare.polarity]
"native.fps" = "lower-is-worse"
"#;
        let config: ConfigFile = toml_edit::de::from_str(toml).unwrap();

        assert_eq!(config.package.as_deref(), Some("com.example.app"));
        assert_eq!(config.repetitions, Some(10));
        assert_eq!(config.commands.build.as_ref().unwrap()[0], "dotnet");
        assert_eq!(config.commands.force_stop, Some(vec![]));
        assert_eq!(config.timeouts.monitor_window_secs, Some(0));
        assert_eq!(config.policy.max_consecutive_failures, Some(0));
        assert_eq!(config.policy.abort_on_build_failure, Some(true));
        let managed = config.profilers.managed.unwrap();
        assert_eq!(managed.attach[0], "dotnet-trace");
        assert!(managed.detach.is_none());
        assert!(config.profilers.native.is_none());
        assert_eq!(config.compare.min_samples, Some(5));
        assert_eq!(config.compare.significance_test, Some(false));
        assert_eq!(
            config.compare.polarity.get("native.fps"),
            Some(&Polarity::LowerIsWorse)
        );
    }

    #[test]
    fn test_unknown_polarity_is_rejected() {
        let toml = "[compare.polarity]\n\"a\" = \"sideways\"\n";
        assert!(toml_edit::de::from_str::<ConfigFile>(toml).is_err());
    }
}
