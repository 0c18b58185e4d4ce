//! Baseline vs candidate classification

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ComparisonInputError;
use crate::infra::FileSystem;
use crate::results::{RawResultSet, RawResultStore, StoreError, Unit};
use crate::telemetry::{EventSink, HarnessEvent};

use super::config::{Polarity, ThresholdPolicy};
use super::distribution::{distributions, MetricDistribution};
use super::stats::{pooled_stddev, welch_t_test};

/// Classification of one metric's change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    /// Changed for the better beyond every gate
    Improved,
    /// Changed for the worse beyond every gate
    Regressed,
    /// Within noise, too small, or not significant
    Unchanged,
    /// Too few samples on at least one side
    InsufficientData,
}

impl Verdict {
    /// Report spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improved => "improved",
            Self::Regressed => "regressed",
            Self::Unchanged => "unchanged",
            Self::InsufficientData => "insufficient-data",
        }
    }
}

/// Outcome for one metric key
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    /// Metric key
    pub key: String,
    /// Baseline distribution, absent when the key is candidate-only
    pub baseline: Option<MetricDistribution>,
    /// Candidate distribution, absent when the key is baseline-only
    pub candidate: Option<MetricDistribution>,
    /// `candidate.mean - baseline.mean`, when both sides carry the key
    pub delta_mean: Option<f64>,
    /// `delta_mean / baseline.mean * 100`, absent for a zero baseline
    pub delta_percent: Option<f64>,
    /// Welch p-value, when the significance gate ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    /// Direction considered worse for this key
    pub polarity: Polarity,
    /// Classification
    pub verdict: Verdict,
}

impl ComparisonResult {
    /// Unit of whichever side is present
    pub fn unit(&self) -> Option<Unit> {
        self.baseline
            .as_ref()
            .or(self.candidate.as_ref())
            .map(|d| d.unit)
    }
}

/// True when any result regressed
pub fn has_regressions(results: &[ComparisonResult]) -> bool {
    results.iter().any(|r| r.verdict == Verdict::Regressed)
}

/// Compares two raw result sets metric by metric
pub struct Comparator<'s> {
    policy: ThresholdPolicy,
    sink: &'s dyn EventSink,
}

impl<'s> Comparator<'s> {
    /// Create a comparator with the given gates
    pub fn new(policy: ThresholdPolicy, sink: &'s dyn EventSink) -> Self {
        Self { policy, sink }
    }

    /// Active gates
    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    /// Load `raw-results.json` from both directories and compare them.
    ///
    /// Inputs are validated before any statistics: both directories must
    /// exist, hold raw results, parse, and be two different locations.
    pub fn compare_dirs<FS: FileSystem + Clone>(
        &self,
        fs: FS,
        baseline_dir: &Path,
        candidate_dir: &Path,
    ) -> Result<Vec<ComparisonResult>, ComparisonInputError> {
        for (role, dir) in [("baseline", baseline_dir), ("candidate", candidate_dir)] {
            if !fs.exists(dir) {
                return Err(ComparisonInputError::MissingDirectory {
                    role,
                    path: dir.to_path_buf(),
                });
            }
        }

        let canonical = |role: &'static str, dir: &Path| {
            fs.canonicalize(dir).map_err(|source| ComparisonInputError::Unreadable {
                role,
                source: StoreError::Io {
                    path: dir.to_path_buf(),
                    source,
                },
            })
        };
        let baseline_path = canonical("baseline", baseline_dir)?;
        if baseline_path == canonical("candidate", candidate_dir)? {
            return Err(ComparisonInputError::SameLocation {
                path: baseline_path,
            });
        }

        let store = RawResultStore::new(fs);
        let baseline = store
            .load(baseline_dir)
            .map_err(|e| ComparisonInputError::from_store("baseline", e))?;
        let candidate = store
            .load(candidate_dir)
            .map_err(|e| ComparisonInputError::from_store("candidate", e))?;

        Ok(self.compare(&baseline, &candidate))
    }

    /// Compare every key present on either side, sorted by key
    pub fn compare(
        &self,
        baseline: &RawResultSet,
        candidate: &RawResultSet,
    ) -> Vec<ComparisonResult> {
        self.warn_about_partial_session("baseline", baseline);
        self.warn_about_partial_session("candidate", candidate);

        let (baseline, candidate) = rayon::join(|| distributions(baseline), || distributions(candidate));

        let mut paired: BTreeMap<String, (Option<MetricDistribution>, Option<MetricDistribution>)> =
            BTreeMap::new();
        for dist in baseline {
            let key = dist.key.clone();
            paired.entry(key).or_default().0 = Some(dist);
        }
        for dist in candidate {
            let key = dist.key.clone();
            paired.entry(key).or_default().1 = Some(dist);
        }

        self.sink
            .emit(HarnessEvent::ComparisonStarted { keys: paired.len() });

        let mut results: Vec<ComparisonResult> = paired
            .into_par_iter()
            .map(|(key, (b, c))| self.classify(key, b, c))
            .collect();
        results.sort_by(|a, b| a.key.cmp(&b.key));

        for result in &results {
            if let (Some(b), Some(c)) = (&result.baseline, &result.candidate) {
                if b.unit != c.unit {
                    self.sink.emit(HarnessEvent::Warning {
                        message: format!(
                            "{}: unit changed from {} to {}",
                            result.key,
                            b.unit.as_str(),
                            c.unit.as_str()
                        ),
                    });
                }
            }
        }
        results
    }

    fn warn_about_partial_session(&self, role: &str, set: &RawResultSet) {
        if set.aborted || set.cancelled {
            self.sink.emit(HarnessEvent::Warning {
                message: format!(
                    "{} session stopped early ({} of {} runs succeeded)",
                    role,
                    set.success_count(),
                    set.repetitions
                ),
            });
        }
    }

    fn classify(
        &self,
        key: String,
        baseline: Option<MetricDistribution>,
        candidate: Option<MetricDistribution>,
    ) -> ComparisonResult {
        let polarity = self.policy.polarity_for(&key);
        let mut result = ComparisonResult {
            key,
            baseline,
            candidate,
            delta_mean: None,
            delta_percent: None,
            p_value: None,
            polarity,
            verdict: Verdict::InsufficientData,
        };

        let (Some(b), Some(c)) = (&result.baseline, &result.candidate) else {
            return result;
        };

        let delta = c.mean - b.mean;
        result.delta_mean = Some(delta);
        result.delta_percent = (b.mean != 0.0).then(|| delta / b.mean * 100.0);

        let min = self.policy.min_samples;
        if b.n < min || c.n < min || b.unit != c.unit {
            return result;
        }

        let magnitude = delta.abs();
        let noise_gate =
            magnitude > self.policy.noise_multiplier * pooled_stddev(b.n, b.stddev, c.n, c.stddev);
        let magnitude_gate = if b.mean == 0.0 || c.mean == 0.0 {
            magnitude > self.policy.zero_baseline_abs_threshold
        } else {
            magnitude / ((b.mean.abs() + c.mean.abs()) / 2.0) * 100.0
                > self.policy.min_change_percent
        };
        let significance_gate = match self.policy.alpha {
            Some(alpha) => {
                let p_value = welch_t_test(&b.values, &c.values).p_value;
                result.p_value = Some(p_value);
                p_value < alpha
            }
            None => true,
        };

        result.verdict = if noise_gate && magnitude_gate && significance_gate {
            let worse = match polarity {
                Polarity::HigherIsWorse => delta > 0.0,
                Polarity::LowerIsWorse => delta < 0.0,
            };
            if worse {
                Verdict::Regressed
            } else {
                Verdict::Improved
            }
        } else {
            Verdict::Unchanged
        };
        result
    }
}
