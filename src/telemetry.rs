//! Progress events and pluggable sinks
//!
//! The orchestrator, comparator and report renderer never print directly;
//! they emit [`HarnessEvent`]s to an injected [`EventSink`]. The CLI uses
//! [`ConsoleSink`], tests use [`MemorySink`], library callers may use
//! [`NoOpSink`].

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::path::PathBuf;

use crate::fmt::{format_ms, icon, CHART, CHECKMARK, CROSSMARK, ROCKET, WARNING};
use crate::results::Stage;

/// Something worth telling the operator
#[derive(Debug, Clone, PartialEq)]
pub enum HarnessEvent {
    /// A session is starting
    SessionStarted {
        /// Runs requested
        repetitions: u32,
        /// Where results go
        output_dir: PathBuf,
    },
    /// A run is starting
    RunStarted {
        /// 0-based run index
        run_index: u32,
        /// Runs requested
        total: u32,
    },
    /// A stage of the current run is starting
    StageStarted {
        /// 0-based run index
        run_index: u32,
        /// Stage
        stage: Stage,
    },
    /// A run ended
    RunFinished {
        /// 0-based run index
        run_index: u32,
        /// Whether it succeeded
        succeeded: bool,
        /// Wall time in milliseconds
        duration_ms: u64,
        /// Failure reason, when it failed
        failure: Option<String>,
    },
    /// The failure policy stopped the session
    SessionAborted {
        /// Why
        reason: String,
    },
    /// The operator stopped the session
    SessionCancelled,
    /// A file was written
    FileWritten {
        /// What kind of file (e.g. `raw results`)
        label: &'static str,
        /// Where
        path: PathBuf,
    },
    /// A comparison is starting
    ComparisonStarted {
        /// Number of metric keys across both sides
        keys: usize,
    },
    /// Something did not go as expected but is not fatal
    Warning {
        /// Message
        message: String,
    },
}

/// Receives harness events
pub trait EventSink: Send + Sync {
    /// Handle one event
    fn emit(&self, event: HarnessEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: HarnessEvent) {}
}

/// Prints warnings to stderr and drops everything else
///
/// For output modes where stdout carries machine-readable data.
#[derive(Debug, Default, Clone, Copy)]
pub struct WarningSink;

impl EventSink for WarningSink {
    fn emit(&self, event: HarnessEvent) {
        if let HarnessEvent::Warning { message } = event {
            eprintln!("{}{}", icon(WARNING), style(message).yellow());
        }
    }
}

/// In-memory sink for testing
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<HarnessEvent>>,
}

impl MemorySink {
    /// Create a new memory sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded events
    pub fn events(&self) -> Vec<HarnessEvent> {
        self.events.lock().clone()
    }

    /// Clear all recorded events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: HarnessEvent) {
        self.events.lock().push(event);
    }
}

/// Terminal sink: styled lines plus a progress bar across runs
#[derive(Default)]
pub struct ConsoleSink {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    /// Create a console sink
    pub fn new() -> Self {
        Self::default()
    }

    fn line(&self, text: String) {
        match self.bar.lock().as_ref() {
            Some(bar) => bar.suspend(|| println!("{}", text)),
            None => println!("{}", text),
        }
    }

    fn finish_bar(&self) {
        if let Some(bar) = self.bar.lock().take() {
            bar.finish_and_clear();
        }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: HarnessEvent) {
        match event {
            HarnessEvent::SessionStarted {
                repetitions,
                output_dir,
            } => {
                println!(
                    "{}Measuring {} run(s) into {}",
                    icon(ROCKET),
                    style(repetitions).bold(),
                    style(output_dir.display()).dim()
                );
                let bar = ProgressBar::new(u64::from(repetitions));
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                *self.bar.lock() = Some(bar);
            }
            HarnessEvent::RunStarted { run_index, total } => {
                if let Some(bar) = self.bar.lock().as_ref() {
                    bar.set_message(format!("run {}/{}", run_index + 1, total));
                }
            }
            HarnessEvent::StageStarted { run_index, stage } => {
                if let Some(bar) = self.bar.lock().as_ref() {
                    bar.set_message(format!("run {}: {}", run_index + 1, stage.as_str()));
                }
            }
            HarnessEvent::RunFinished {
                run_index,
                succeeded,
                duration_ms,
                failure,
            } => {
                let text = if succeeded {
                    format!(
                        "   {}Run {} ({})",
                        icon(CHECKMARK),
                        run_index + 1,
                        format_ms(duration_ms as f64)
                    )
                } else {
                    format!(
                        "   {}Run {}: {}",
                        icon(CROSSMARK),
                        run_index + 1,
                        style(failure.unwrap_or_default()).red()
                    )
                };
                self.line(text);
                if let Some(bar) = self.bar.lock().as_ref() {
                    bar.inc(1);
                }
            }
            HarnessEvent::SessionAborted { reason } => {
                self.finish_bar();
                println!("{}{} {}", icon(WARNING), style("Session aborted:").yellow().bold(), reason);
            }
            HarnessEvent::SessionCancelled => {
                self.finish_bar();
                println!("{}{}", icon(WARNING), style("Session cancelled").yellow().bold());
            }
            HarnessEvent::FileWritten { label, path } => {
                self.finish_bar();
                println!("{}Wrote {} to {}", icon(CHECKMARK), label, style(path.display()).bold());
            }
            HarnessEvent::ComparisonStarted { keys } => {
                println!("{}Comparing {} metric(s)", icon(CHART), keys);
            }
            HarnessEvent::Warning { message } => {
                self.line(format!("{}{}", icon(WARNING), style(message).yellow()));
            }
        }
    }
}
