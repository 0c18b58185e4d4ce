//! Run records and their categorized failure reasons

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::sample::MetricSample;

/// External step of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Build command
    Build,
    /// Install / deploy command
    Deploy,
    /// Launch command (including force-stop)
    Launch,
    /// Starting a profiler
    ProfilerAttach,
    /// Stopping a profiler and waiting for it to flush
    ProfilerDetach,
    /// Parsing and gathering metrics
    Collect,
}

impl Stage {
    /// Human-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Deploy => "deploy",
            Self::Launch => "launch",
            Self::ProfilerAttach => "profiler attach",
            Self::ProfilerDetach => "profiler detach",
            Self::Collect => "collect",
        }
    }
}

/// Why a stage failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum FailureCause {
    /// Process exited unsuccessfully (`None` when killed by a signal)
    Exit {
        /// Exit code if there was one
        code: Option<i32>,
    },
    /// Process outlived the stage timeout and was killed
    Timeout {
        /// Timeout that was exceeded, in seconds
        after_secs: u64,
    },
    /// Process could not be started
    Spawn {
        /// OS error text
        message: String,
    },
    /// Operator cancelled the session
    Cancelled,
    /// Process succeeded but its output could not be used
    InvalidOutput {
        /// What was wrong
        message: String,
    },
}

/// Categorized reason a run did not succeed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Stage that failed
    pub stage: Stage,
    /// What went wrong in it
    pub cause: FailureCause,
}

impl RunFailure {
    /// Create a failure for a stage
    pub fn new(stage: Stage, cause: FailureCause) -> Self {
        Self { stage, cause }
    }

    /// Non-zero exit
    pub fn exit(stage: Stage, code: Option<i32>) -> Self {
        Self::new(stage, FailureCause::Exit { code })
    }

    /// Stage timeout
    pub fn timeout(stage: Stage, timeout: Duration) -> Self {
        Self::new(
            stage,
            FailureCause::Timeout {
                after_secs: timeout.as_secs(),
            },
        )
    }

    /// Cancelled while in `stage`
    pub fn cancelled(stage: Stage) -> Self {
        Self::new(stage, FailureCause::Cancelled)
    }

    /// Whether the run was cancelled by the operator
    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, FailureCause::Cancelled)
    }

    /// Whether a stage timed out
    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, FailureCause::Timeout { .. })
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = self.stage.as_str();
        match &self.cause {
            FailureCause::Exit { code: Some(code) } => {
                write!(f, "{} failed: exited with code {}", stage, code)
            }
            FailureCause::Exit { code: None } => {
                write!(f, "{} failed: terminated by signal", stage)
            }
            FailureCause::Timeout { after_secs } => {
                write!(f, "{} timed out after {}s", stage, after_secs)
            }
            FailureCause::Spawn { message } => {
                write!(f, "{} failed to start: {}", stage, message)
            }
            FailureCause::Cancelled => write!(f, "cancelled during {}", stage),
            FailureCause::InvalidOutput { message } => {
                write!(f, "{} produced unusable output: {}", stage, message)
            }
        }
    }
}

/// One execution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    /// 0-based position in the session
    pub run_index: u32,
    /// Unix timestamp (seconds) when the run started
    pub started_at: u64,
    /// Wall time of the whole run in milliseconds
    #[serde(default)]
    pub duration_ms: u64,
    /// Whether every stage succeeded
    pub succeeded: bool,
    /// Why the run failed, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
    /// Samples in collection order, unique by key
    #[serde(default)]
    pub samples: Vec<MetricSample>,
    /// Managed profiler artifact, if one was produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_profile_artifact: Option<PathBuf>,
    /// Native profiler artifact, if one was produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_profile_artifact: Option<PathBuf>,
}

impl RunRecord {
    /// A successful run with no samples yet
    pub fn new(run_index: u32, started_at: u64) -> Self {
        Self {
            run_index,
            started_at,
            duration_ms: 0,
            succeeded: true,
            failure: None,
            samples: Vec::new(),
            managed_profile_artifact: None,
            native_profile_artifact: None,
        }
    }

    /// Mark the run failed
    pub fn fail(&mut self, failure: RunFailure) {
        self.succeeded = false;
        self.failure = Some(failure);
    }

    /// Value of a metric in this run, if present
    pub fn sample(&self, key: &str) -> Option<&MetricSample> {
        self.samples.iter().find(|s| s.key == key)
    }

    /// Human-readable failure reason
    pub fn failure_reason(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }
}
