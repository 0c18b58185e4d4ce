//! Per-metric distributions across the successful runs of a result set

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::results::{RawResultSet, Unit};

use super::stats::{mean, sample_stddev};

/// Summary of one metric's values across runs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDistribution {
    /// Metric key
    pub key: String,
    /// Unit shared by every value
    pub unit: Unit,
    /// Number of successful runs carrying the key
    pub n: usize,
    /// Mean
    pub mean: f64,
    /// Sample standard deviation (0 when n < 2)
    pub stddev: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Values in run order
    pub values: Vec<f64>,
}

impl MetricDistribution {
    /// Summarize `values`; `None` when there are none
    pub fn from_values(key: impl Into<String>, unit: Unit, values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mean = mean(&values);
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        Some(Self {
            key: key.into(),
            unit,
            n: values.len(),
            mean,
            stddev: sample_stddev(&values, mean),
            min,
            max,
            values,
        })
    }
}

/// Distributions for every key of `set`, sorted by key.
///
/// Only successful runs contribute. The unit of a key is taken from its
/// first occurrence.
pub fn distributions(set: &RawResultSet) -> Vec<MetricDistribution> {
    let mut grouped: BTreeMap<&str, (Unit, Vec<f64>)> = BTreeMap::new();
    for run in set.successful_runs() {
        for sample in &run.samples {
            grouped
                .entry(sample.key.as_str())
                .or_insert_with(|| (sample.unit, Vec::new()))
                .1
                .push(sample.value);
        }
    }

    let mut result: Vec<MetricDistribution> = grouped
        .into_par_iter()
        .filter_map(|(key, (unit, values))| MetricDistribution::from_values(key, unit, values))
        .collect();
    result.sort_by(|a, b| a.key.cmp(&b.key));
    result
}
