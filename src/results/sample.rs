//! Metric samples produced by one run

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unit of a metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Unit {
    /// Milliseconds
    Ms,
    /// Bytes
    Bytes,
    /// Dimensionless count
    Count,
}

impl Unit {
    /// Short label used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ms => "ms",
            Self::Bytes => "bytes",
            Self::Count => "count",
        }
    }

    /// Parse a unit suffix as written by profilers (`ms`, `bytes`, `count`)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ms" => Some(Self::Ms),
            "bytes" | "b" => Some(Self::Bytes),
            "count" => Some(Self::Count),
            _ => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Part of the run a metric was measured in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Building the app
    Build,
    /// Installing it on the device
    Install,
    /// Starting the launch command
    Launch,
    /// From process start to first frame
    ColdStart,
    /// After startup, while the app idles in the monitor window
    SteadyState,
    /// Anything a profiler reports that has no better home
    Custom,
}

impl Phase {
    /// Kebab-case name used in reports and the raw results file
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Install => "install",
            Self::Launch => "launch",
            Self::ColdStart => "cold-start",
            Self::SteadyState => "steady-state",
            Self::Custom => "custom",
        }
    }
}

/// One scalar measurement from one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Stable key, namespaced by source (e.g. `launch.total-time`)
    pub key: String,
    /// Measured value
    pub value: f64,
    /// Unit of `value`
    pub unit: Unit,
    /// Phase the value belongs to
    pub phase: Phase,
}

impl MetricSample {
    /// Create a new sample
    pub fn new(key: impl Into<String>, value: f64, unit: Unit, phase: Phase) -> Self {
        Self {
            key: key.into(),
            value,
            unit,
            phase,
        }
    }
}

/// Two samples in one run claimed the same key with different values
#[derive(Debug, Clone, Error, PartialEq)]
#[error("duplicate metric '{key}': {first} vs {second}")]
pub struct DuplicateMetric {
    /// Conflicting key
    pub key: String,
    /// Value already recorded
    pub first: f64,
    /// Value that was rejected
    pub second: f64,
}

/// Ordered samples with unique keys.
///
/// An exact repeat of a sample is collapsed; a conflicting value for an
/// existing key is rejected rather than overwriting it.
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    samples: Vec<MetricSample>,
}

impl SampleSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample, rejecting conflicting duplicates
    pub fn insert(&mut self, sample: MetricSample) -> Result<(), DuplicateMetric> {
        match self.samples.iter().find(|s| s.key == sample.key) {
            Some(existing) if existing == &sample => Ok(()),
            Some(existing) => Err(DuplicateMetric {
                key: sample.key,
                first: existing.value,
                second: sample.value,
            }),
            None => {
                self.samples.push(sample);
                Ok(())
            }
        }
    }

    /// Add every sample, stopping at the first conflict
    pub fn extend(
        &mut self,
        samples: impl IntoIterator<Item = MetricSample>,
    ) -> Result<(), DuplicateMetric> {
        samples.into_iter().try_for_each(|s| self.insert(s))
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Consume the set, keeping insertion order
    pub fn into_vec(self) -> Vec<MetricSample> {
        self.samples
    }
}
