//! Summarize command implementation
//!
//! Re-renders the summary report of a stored session.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::compare::{distributions, summary_text, ReportRenderer, SUMMARY_REPORT_FILE};
use crate::error::{ComparisonInputError, HarnessError};
use crate::infra::RealFileSystem;
use crate::results::RawResultStore;
use crate::telemetry::ConsoleSink;

/// Print and write the summary of the raw results in `dir`
///
/// The report goes to `output`, or `summary-report.txt` inside `dir`.
///
/// # Errors
///
/// Returns an error if `dir` holds no readable raw results or the report
/// cannot be written.
pub fn cmd_summarize(dir: &Path, output: Option<PathBuf>) -> Result<()> {
    let set = RawResultStore::new(RealFileSystem)
        .load(dir)
        .map_err(|e| HarnessError::from(ComparisonInputError::from_store("results", e)))?;

    print!("{}", summary_text(&set, &distributions(&set)));
    println!();

    let output = output.unwrap_or_else(|| dir.join(SUMMARY_REPORT_FILE));
    let sink = ConsoleSink::new();
    ReportRenderer::new(RealFileSystem, &sink).render_summary(&set, &output)?;

    Ok(())
}
