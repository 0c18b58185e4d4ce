//! Test fixture helpers
//!
//! Fake projects replace the build system, installer and launcher with
//! `true`, `false` and `sh -c` so a whole session runs in milliseconds.

#![allow(dead_code)]

use mobperf::infra::RealFileSystem;
use mobperf::results::{
    MetricSample, Phase, RawResultSet, RawResultStore, RunFailure, RunRecord, Stage, Unit,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Re-export anyhow for convenience
pub use anyhow;

/// Launcher printing `am start -W` style timings
pub const LAUNCH_OK: &str =
    r#"["sh", "-c", "echo Status: ok; echo TotalTime: 250; echo WaitTime: 260"]"#;

/// Launcher that exits non-zero
pub const LAUNCH_FAILS: &str = r#"["false"]"#;

/// Creates a project whose `.mobperf.toml` uses shell stand-ins for every
/// external command, with `launch` as given (a TOML array literal)
pub fn fake_project(launch: &str) -> anyhow::Result<TempDir> {
    fake_project_with(launch, "")
}

/// Like [`fake_project`], with extra TOML appended to the config
///
/// `extra` lands inside the `[timeouts]` table until it opens its own table.
pub fn fake_project_with(launch: &str, extra: &str) -> anyhow::Result<TempDir> {
    fake_project_building(r#"["true"]"#, launch, extra)
}

/// Like [`fake_project_with`], with `build` as given
pub fn fake_project_building(build: &str, launch: &str, extra: &str) -> anyhow::Result<TempDir> {
    let temp_dir = TempDir::new()?;
    fs::write(
        temp_dir.path().join(".mobperf.toml"),
        format!(
            r#"package = "com.example.app"
repetitions = 3

[commands]
build = {build}
install = ["true"]
launch = {launch}
force-stop = []
memory = []

[timeouts]
monitor-window-secs = 0
{extra}
"#,
        ),
    )?;
    Ok(temp_dir)
}

/// Write a result set with one successful run per value of `key`
pub fn write_result_set(dir: &Path, key: &str, values: &[f64]) -> anyhow::Result<()> {
    let mut set = RawResultSet::new("app", "Release", "com.example.app");
    set.repetitions = values.len() as u32;
    for (i, value) in values.iter().enumerate() {
        let mut run = RunRecord::new(i as u32, 1_700_000_000);
        run.samples
            .push(MetricSample::new(key, *value, Unit::Ms, Phase::ColdStart));
        set.runs.push(run);
    }
    RawResultStore::new(RealFileSystem).save(dir, &set)?;
    Ok(())
}

/// Write a result set whose every run failed at launch
pub fn write_failed_result_set(dir: &Path, runs: u32) -> anyhow::Result<()> {
    let mut set = RawResultSet::new("app", "Release", "com.example.app");
    for i in 0..runs {
        let mut run = RunRecord::new(i, 1_700_000_000);
        run.fail(RunFailure::exit(Stage::Launch, Some(1)));
        set.runs.push(run);
    }
    RawResultStore::new(RealFileSystem).save(dir, &set)?;
    Ok(())
}
