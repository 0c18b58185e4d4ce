//! Comparison settings

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Which direction of change is a regression for a metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Polarity {
    /// Timings, memory, counts: bigger is worse
    #[default]
    HigherIsWorse,
    /// Throughput-style metrics: smaller is worse
    LowerIsWorse,
}

impl Polarity {
    /// Config file spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HigherIsWorse => "higher-is-worse",
            Self::LowerIsWorse => "lower-is-worse",
        }
    }
}

/// Gates a change must pass to count as a regression or an improvement
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdPolicy {
    /// Both sides need at least this many samples
    pub min_samples: usize,
    /// Noise gate: |delta| must exceed this many pooled stddevs
    pub noise_multiplier: f64,
    /// Magnitude gate: relative change in percent of the mean of both means
    pub min_change_percent: f64,
    /// Magnitude gate used instead when either mean is zero
    pub zero_baseline_abs_threshold: f64,
    /// Significance gate level; `None` disables Welch's t-test
    pub alpha: Option<f64>,
    /// Per-key polarity; keys ending in `.*` match a whole namespace
    pub polarity: BTreeMap<String, Polarity>,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            min_samples: 2,
            noise_multiplier: 2.0,
            min_change_percent: 5.0,
            zero_baseline_abs_threshold: 0.0,
            alpha: Some(0.05),
            polarity: BTreeMap::new(),
        }
    }
}

impl ThresholdPolicy {
    /// Polarity of `key`: exact entry first, then the longest matching
    /// `namespace.*` entry, then [`Polarity::HigherIsWorse`].
    pub fn polarity_for(&self, key: &str) -> Polarity {
        if let Some(polarity) = self.polarity.get(key) {
            return *polarity;
        }
        self.polarity
            .iter()
            .filter_map(|(pattern, polarity)| {
                let prefix = pattern.strip_suffix('*')?;
                key.starts_with(prefix).then_some((prefix.len(), *polarity))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, polarity)| polarity)
            .unwrap_or_default()
    }

    /// Reject settings that make the gates meaningless
    pub fn validate(&self) -> Result<(), String> {
        if self.min_samples < 2 {
            return Err(format!(
                "min-samples must be at least 2 (got {})",
                self.min_samples
            ));
        }
        for (name, value) in [
            ("noise-multiplier", self.noise_multiplier),
            ("min-change-percent", self.min_change_percent),
            ("zero-baseline-abs-threshold", self.zero_baseline_abs_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number (got {})", name, value));
            }
        }
        if let Some(alpha) = self.alpha {
            if !(alpha > 0.0 && alpha < 1.0) {
                return Err(format!("alpha must be between 0 and 1 (got {})", alpha));
            }
        }
        Ok(())
    }
}

/// Everything `mobperf compare` needs
#[derive(Debug, Clone)]
pub struct CompareConfig {
    /// Directory holding the baseline raw results
    pub baseline_dir: PathBuf,
    /// Directory holding the candidate raw results
    pub candidate_dir: PathBuf,
    /// Report destination
    pub output: PathBuf,
    /// Print JSON instead of the text table
    pub json: bool,
    /// Exit non-zero when any metric regressed
    pub fail_on_regression: bool,
    /// Classification gates
    pub policy: ThresholdPolicy,
}
