#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! mobperf library
//!
//! This library provides the core of the mobperf performance harness:
//! repeated build/deploy/launch runs with metric collection, persisted raw
//! result sets, and a statistical comparison of two sessions. It can be used
//! programmatically in addition to the CLI interface.
//!
//! # Basic Example
//!
//! Comparing two result sets:
//!
//! ```
//! use mobperf::compare::{Comparator, ThresholdPolicy, Verdict};
//! use mobperf::results::{MetricSample, Phase, RawResultSet, RunRecord, Unit};
//! use mobperf::telemetry::NoOpSink;
//!
//! fn session(values: &[f64]) -> RawResultSet {
//!     let mut set = RawResultSet::new("app", "Release", "com.example.app");
//!     for (i, value) in values.iter().enumerate() {
//!         let mut run = RunRecord::new(i as u32, 0);
//!         run.samples.push(MetricSample::new(
//!             "launch.total-time",
//!             *value,
//!             Unit::Ms,
//!             Phase::ColdStart,
//!         ));
//!         set.runs.push(run);
//!     }
//!     set
//! }
//!
//! let baseline = session(&[100.0, 102.0, 98.0, 101.0, 99.0]);
//! let candidate = session(&[140.0, 138.0, 142.0, 141.0, 139.0]);
//!
//! let comparator = Comparator::new(ThresholdPolicy::default(), &NoOpSink);
//! let results = comparator.compare(&baseline, &candidate);
//!
//! assert_eq!(results[0].verdict, Verdict::Regressed);
//! assert!((results[0].delta_mean.unwrap() - 40.0).abs() < 1e-9);
//! ```
//!
//! # Advanced Example: Resolving a Run Configuration
//!
//! ```
//! use mobperf::config::{ConfigFile, ConfigResolver, RunOverrides};
//! use std::path::Path;
//!
//! let file: ConfigFile = toml_edit::de::from_str(
//!     "package = \"com.example.app\"\nrepetitions = 3\n",
//! )
//! .unwrap();
//! let overrides = RunOverrides {
//!     repetitions: Some(10),
//!     ..Default::default()
//! };
//!
//! let config = ConfigResolver::resolve_run(Path::new("/work/app"), &file, &overrides).unwrap();
//! assert_eq!(config.repetitions, 10);
//! assert_eq!(config.project_identity, "app");
//! ```

/// Command-line definition
pub mod cli;
/// Command handlers for CLI operations
pub mod cmd;
/// Session comparison and reports
pub mod compare;
/// Configuration file loading and resolution
pub mod config;
/// Enhanced error types with contextual suggestions
pub mod error;
/// Shared formatting utilities
pub mod fmt;
/// Git metadata utilities
pub mod git;
/// Infrastructure traits for filesystem and command execution
pub mod infra;
/// Run execution and session orchestration
pub mod pipeline;
/// Measurement data model and persistence
pub mod results;
/// Progress events and sinks
pub mod telemetry;
/// External tool detection
pub mod tools;
