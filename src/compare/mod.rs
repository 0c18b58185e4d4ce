//! Comparison of two persisted raw result sets
//!
//! Each metric key present on either side gets a [`ComparisonResult`]. A
//! change counts as a regression or an improvement only when it clears
//! every gate of the [`ThresholdPolicy`]:
//! 1. noise: larger than a multiple of the pooled standard deviation
//! 2. magnitude: larger than a relative (or, around zero, absolute) threshold
//! 3. significance: Welch's t-test below alpha (optional)

mod comparator;
mod config;
mod distribution;
mod reporter;
pub mod stats;

pub use comparator::{has_regressions, Comparator, ComparisonResult, Verdict};
pub use config::{CompareConfig, Polarity, ThresholdPolicy};
pub use distribution::{distributions, MetricDistribution};
pub use reporter::{
    comparison_json, comparison_text, summary_text, ReportRenderer, COMPARISON_REPORT_FILE,
    SUMMARY_REPORT_FILE,
};
