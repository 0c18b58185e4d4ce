//! Compare command implementation
//!
//! Handles the `mobperf compare` command which classifies every metric of a
//! candidate session against a baseline session

use anyhow::Result;
use console::style;
use std::env;
use std::path::PathBuf;

use crate::compare::{
    comparison_json, comparison_text, has_regressions, Comparator, ReportRenderer, Verdict,
};
use crate::config::{CompareOverrides, ConfigLoader, ConfigResolver};
use crate::error::HarnessError;
use crate::fmt::{icon, CHART, CROSSMARK};
use crate::infra::RealFileSystem;
use crate::telemetry::{ConsoleSink, EventSink, WarningSink};

/// Compare two result directories written by `mobperf run`
///
/// Thresholds come from the `[compare]` section of `.mobperf.toml` in the
/// current directory, overridden by flags. The report is printed and written
/// to `--output` (default: `comparison-report.txt` in the candidate dir).
///
/// # Examples
///
/// ```no_run
/// use mobperf::cmd::compare::cmd_compare;
/// use mobperf::config::CompareOverrides;
///
/// cmd_compare(
///     "perf-results/main".into(),
///     "perf-results/feature".into(),
///     CompareOverrides::default(),
/// )?;
/// # Ok::<(), anyhow::Error>(())
/// ```
///
/// # Errors
///
/// Returns an error if either directory is missing or holds no usable raw
/// results, if both point at the same location, or if `fail_on_regression`
/// is set and some metric regressed.
pub fn cmd_compare(
    baseline: PathBuf,
    candidate: PathBuf,
    overrides: CompareOverrides,
) -> Result<()> {
    let cwd = env::current_dir()?;
    let file = ConfigLoader::load(&cwd).map_err(|source| HarnessError::ConfigFile {
        path: ConfigLoader::path_in(&cwd),
        source,
    })?;
    let config = ConfigResolver::resolve_compare(baseline, candidate, &file, &overrides)?;

    // Keep stdout parseable in JSON mode
    let console = ConsoleSink::new();
    let sink: &dyn EventSink = if config.json { &WarningSink } else { &console };
    let comparator = Comparator::new(config.policy.clone(), sink);
    let results = comparator
        .compare_dirs(RealFileSystem, &config.baseline_dir, &config.candidate_dir)
        .map_err(HarnessError::from)?;

    if config.json {
        println!("{}", comparison_json(&results)?);
    } else {
        println!(
            "{}{} {} vs {}",
            icon(CHART),
            style("mobperf compare").bold(),
            style(config.baseline_dir.display()).dim(),
            style(config.candidate_dir.display()).dim()
        );
        println!();
        print!("{}", comparison_text(&results));
        println!();
    }

    ReportRenderer::new(RealFileSystem, sink)
        .render_comparison(&results, &config.output)?;

    if config.fail_on_regression && has_regressions(&results) {
        let regressed: Vec<&str> = results
            .iter()
            .filter(|r| r.verdict == Verdict::Regressed)
            .map(|r| r.key.as_str())
            .collect();
        eprintln!(
            "{}{} metric(s) regressed: {}",
            icon(CROSSMARK),
            regressed.len(),
            regressed.join(", ")
        );
        anyhow::bail!("performance regression detected");
    }

    Ok(())
}
