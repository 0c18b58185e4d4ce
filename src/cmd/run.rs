//! Run command implementation
//!
//! Handles the `mobperf run` command: resolves the session configuration,
//! executes every run against the real toolchain and writes the raw results
//! plus a summary report into the session directory.

use anyhow::Result;
use console::style;
use std::path::PathBuf;
use std::thread;

use crate::compare::{ReportRenderer, SUMMARY_REPORT_FILE};
use crate::config::{ConfigLoader, ConfigResolver, RunOverrides};
use crate::error::HarnessError;
use crate::fmt::{icon, SPARKLES};
use crate::infra::{CancelToken, FileSystem, RealCommandExecutor, RealFileSystem};
use crate::pipeline::TestOrchestrator;
use crate::telemetry::ConsoleSink;
use crate::tools::PathLocator;

/// Run a measurement session
///
/// `project` defaults to the current directory. Ctrl-C stops the session
/// after the current stage; completed runs are still persisted.
///
/// # Examples
///
/// ```no_run
/// use mobperf::cmd::run::cmd_run;
/// use mobperf::config::RunOverrides;
///
/// let overrides = RunOverrides {
///     repetitions: Some(10),
///     package: Some("com.example.app".to_string()),
///     ..Default::default()
/// };
/// cmd_run(None, overrides)?;
/// # Ok::<(), anyhow::Error>(())
/// ```
///
/// # Errors
///
/// Returns an error if the configuration is invalid, a required program is
/// missing, no run succeeded, or the results could not be written.
pub fn cmd_run(project: Option<PathBuf>, overrides: RunOverrides) -> Result<()> {
    let project = project.unwrap_or_else(|| PathBuf::from("."));
    let project_dir = RealFileSystem.canonicalize(&project).map_err(|e| {
        HarnessError::config(format!(
            "project directory {} is not accessible: {}",
            project.display(),
            e
        ))
    })?;

    let file = ConfigLoader::load(&project_dir).map_err(|source| HarnessError::ConfigFile {
        path: ConfigLoader::path_in(&project_dir),
        source,
    })?;
    let config = ConfigResolver::resolve_run(&project_dir, &file, &overrides)?;
    log::debug!("Resolved run config: {:?}", config);

    let cancel = CancelToken::new();
    install_interrupt_handler(cancel.clone());

    let sink = ConsoleSink::new();
    let mut orchestrator = TestOrchestrator::new(
        RealCommandExecutor,
        RealFileSystem,
        PathLocator,
        cancel,
        &sink,
    );
    let set = orchestrator.run(&config)?;

    let renderer = ReportRenderer::new(RealFileSystem, &sink);
    renderer.render_summary(&set, &config.output_dir.join(SUMMARY_REPORT_FILE))?;

    println!();
    println!(
        "{}{} of {} run(s) succeeded",
        icon(SPARKLES),
        style(set.success_count()).green().bold(),
        set.runs.len()
    );
    if set.failure_count() > 0 {
        println!(
            "   {} failed run(s) are listed in the summary report",
            style(set.failure_count()).yellow()
        );
    }
    println!(
        "   Compare against another session with {}",
        style(format!(
            "mobperf compare <BASELINE_DIR> {}",
            config.output_dir.display()
        ))
        .cyan()
    );

    Ok(())
}

/// Trip `cancel` on the first Ctrl-C.
///
/// The listener lives on its own thread with a single-threaded runtime; the
/// rest of the harness stays synchronous.
fn install_interrupt_handler(cancel: CancelToken) {
    let spawned = thread::Builder::new()
        .name("mobperf-interrupt".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    log::warn!("Ctrl-C handling unavailable: {}", e);
                    return;
                }
            };
            runtime.block_on(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        log::info!("Interrupt received, cancelling session");
                        cancel.cancel();
                    }
                    Err(e) => log::warn!("Failed to listen for Ctrl-C: {}", e),
                }
            });
        });

    if let Err(e) = spawned {
        log::warn!("Failed to spawn interrupt listener: {}", e);
    }
}
