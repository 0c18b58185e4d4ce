//! Text and JSON reports

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::HarnessError;
use crate::fmt::{format_percent, format_value};
use crate::infra::FileSystem;
use crate::results::{RawResultSet, Unit};
use crate::telemetry::{EventSink, HarnessEvent};

use super::comparator::{ComparisonResult, Verdict};
use super::distribution::{distributions, MetricDistribution};

/// File name of the comparison report
pub const COMPARISON_REPORT_FILE: &str = "comparison-report.txt";
/// File name of the summary report
pub const SUMMARY_REPORT_FILE: &str = "summary-report.txt";

const WIDTH: usize = 100;
const KEY_WIDTH: usize = 30;

/// Writes reports to disk
pub struct ReportRenderer<'s, FS: FileSystem> {
    fs: FS,
    sink: &'s dyn EventSink,
}

impl<'s, FS: FileSystem> ReportRenderer<'s, FS> {
    /// Create a renderer
    pub fn new(fs: FS, sink: &'s dyn EventSink) -> Self {
        Self { fs, sink }
    }

    /// Write the comparison table to `output`.
    ///
    /// Returns `Ok(None)` without touching the disk when there is nothing to
    /// report.
    pub fn render_comparison(
        &self,
        results: &[ComparisonResult],
        output: &Path,
    ) -> Result<Option<PathBuf>, HarnessError> {
        if results.is_empty() {
            self.sink.emit(HarnessEvent::Warning {
                message: "no metrics to compare; no report written".to_string(),
            });
            return Ok(None);
        }
        self.write("comparison report", output, &comparison_text(results))
            .map(Some)
    }

    /// Write the per-metric summary of one result set to `output`.
    ///
    /// Returns `Ok(None)` without touching the disk when no successful run
    /// carried a sample.
    pub fn render_summary(
        &self,
        set: &RawResultSet,
        output: &Path,
    ) -> Result<Option<PathBuf>, HarnessError> {
        let dists = distributions(set);
        if dists.is_empty() {
            self.sink.emit(HarnessEvent::Warning {
                message: "no successful samples; no summary written".to_string(),
            });
            return Ok(None);
        }
        self.write("summary report", output, &summary_text(set, &dists))
            .map(Some)
    }

    fn write(&self, label: &'static str, path: &Path, text: &str) -> Result<PathBuf, HarnessError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs
                .create_dir_all(parent)
                .map_err(|source| HarnessError::Io {
                    context: format!("creating {}", parent.display()),
                    source,
                })?;
        }
        self.fs.write(path, text).map_err(|source| HarnessError::Io {
            context: format!("writing {}", path.display()),
            source,
        })?;
        log::info!("Wrote {} to {}", label, path.display());
        self.sink.emit(HarnessEvent::FileWritten {
            label,
            path: path.to_path_buf(),
        });
        Ok(path.to_path_buf())
    }
}

/// Comparison results as pretty JSON
pub fn comparison_json(results: &[ComparisonResult]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(results)
}

/// Deterministic comparison table
pub fn comparison_text(results: &[ComparisonResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Performance Comparison");
    let _ = writeln!(out, "{}", "=".repeat(WIDTH));
    let _ = writeln!(
        out,
        "{:<kw$} {:>20} {:>20} {:>12} {:>8}  {}",
        "Metric",
        "Baseline",
        "Candidate",
        "Delta",
        "Delta %",
        "Verdict",
        kw = KEY_WIDTH
    );
    let _ = writeln!(out, "{}", "-".repeat(WIDTH));

    for result in results {
        let unit = result.unit().unwrap_or(Unit::Count);
        let delta = result
            .delta_mean
            .map(|d| signed_value(d, unit))
            .unwrap_or_else(|| "-".to_string());
        let percent = result
            .delta_percent
            .map(format_percent)
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<kw$} {:>20} {:>20} {:>12} {:>8}  {}",
            truncate(&result.key, KEY_WIDTH),
            mean_stddev(result.baseline.as_ref()),
            mean_stddev(result.candidate.as_ref()),
            delta,
            percent,
            result.verdict.as_str(),
            kw = KEY_WIDTH
        );
    }

    let _ = writeln!(out, "{}", "=".repeat(WIDTH));
    let count = |verdict: Verdict| results.iter().filter(|r| r.verdict == verdict).count();
    let _ = writeln!(
        out,
        "{} regressed, {} improved, {} unchanged, {} insufficient-data",
        count(Verdict::Regressed),
        count(Verdict::Improved),
        count(Verdict::Unchanged),
        count(Verdict::InsufficientData)
    );
    out
}

/// Deterministic per-metric summary of one result set
pub fn summary_text(set: &RawResultSet, dists: &[MetricDistribution]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Performance Summary: {} ({}, {})",
        set.project_identity, set.configuration, set.package_name
    );
    if let Some(commit) = &set.git_commit {
        let _ = writeln!(out, "Commit: {}", commit);
    }
    let _ = writeln!(
        out,
        "Runs: {} succeeded, {} failed, {} requested{}",
        set.success_count(),
        set.failure_count(),
        set.repetitions,
        if set.aborted {
            " (aborted)"
        } else if set.cancelled {
            " (cancelled)"
        } else {
            ""
        }
    );
    let _ = writeln!(out, "{}", "=".repeat(WIDTH));
    let _ = writeln!(
        out,
        "{:<kw$} {:>4} {:>22} {:>16} {:>16}",
        "Metric",
        "n",
        "Mean ± Stddev",
        "Min",
        "Max",
        kw = KEY_WIDTH
    );
    let _ = writeln!(out, "{}", "-".repeat(WIDTH));
    for dist in dists {
        let _ = writeln!(
            out,
            "{:<kw$} {:>4} {:>22} {:>16} {:>16}",
            truncate(&dist.key, KEY_WIDTH),
            dist.n,
            mean_stddev(Some(dist)),
            format_value(dist.min, dist.unit),
            format_value(dist.max, dist.unit),
            kw = KEY_WIDTH
        );
    }
    let _ = writeln!(out, "{}", "=".repeat(WIDTH));

    let failures: Vec<_> = set
        .runs
        .iter()
        .filter_map(|r| r.failure.as_ref().map(|f| (r.run_index, f)))
        .collect();
    if !failures.is_empty() {
        let _ = writeln!(out, "Failed runs:");
        for (run_index, failure) in failures {
            let _ = writeln!(out, "  run {}: {}", run_index + 1, failure);
        }
    }
    out
}

fn mean_stddev(dist: Option<&MetricDistribution>) -> String {
    match dist {
        Some(d) => format!(
            "{} ± {}",
            format_value(d.mean, d.unit),
            format_value(d.stddev, d.unit)
        ),
        None => "-".to_string(),
    }
}

fn signed_value(value: f64, unit: Unit) -> String {
    if value >= 0.0 {
        format!("+{}", format_value(value, unit))
    } else {
        format_value(value, unit)
    }
}

/// Truncate string to max length (in chars)
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
