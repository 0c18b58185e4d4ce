//! Command-line definition shared by the binary and `mobperf completions`

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Mobile app performance harness
///
/// mobperf builds, deploys and launches an app repeatedly, records startup,
/// memory and profiler metrics for every run, and compares two sessions to
/// flag regressions beyond run-to-run noise.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Disable emoji output (useful for CI/CD or accessibility)
    #[arg(long, global = true)]
    pub no_emoji: bool,

    /// Subcommand; help is printed when absent
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// mobperf subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Build, deploy and launch the app N times, collecting metrics
    Run {
        /// Project directory (defaults to the current directory)
        #[arg(long, value_name = "DIR")]
        project: Option<PathBuf>,

        /// Number of runs
        #[arg(short = 'n', long)]
        repetitions: Option<u32>,

        /// Application package / bundle id
        #[arg(long)]
        package: Option<String>,

        /// Build command line, split on whitespace
        #[arg(long, value_name = "CMD")]
        build_command: Option<String>,

        /// Build configuration (e.g. Release)
        #[arg(long)]
        configuration: Option<String>,

        /// Session output directory (must not already hold results)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Attach the managed runtime profiler
        #[arg(long)]
        managed_profile: bool,

        /// Attach the native profiler
        #[arg(long)]
        native_profile: bool,

        /// Abort after this many failed runs in a row (0 never aborts)
        #[arg(long, value_name = "K")]
        max_consecutive_failures: Option<u32>,
    },

    /// Compare a candidate session against a baseline
    Compare {
        /// Baseline result directory
        #[arg(value_name = "BASELINE_DIR")]
        baseline: PathBuf,

        /// Candidate result directory
        #[arg(value_name = "CANDIDATE_DIR")]
        candidate: PathBuf,

        /// Report file (defaults to comparison-report.txt in the candidate dir)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Print results as JSON (for CI/CD integration)
        #[arg(long)]
        json: bool,

        /// Minimum samples per side
        #[arg(long, value_name = "N")]
        min_samples: Option<usize>,

        /// Changes within this many pooled standard deviations are noise
        #[arg(long, value_name = "X")]
        noise_multiplier: Option<f64>,

        /// Smallest relative change worth reporting, in percent
        #[arg(long, value_name = "P")]
        min_change_percent: Option<f64>,

        /// Exit with code 1 when any metric regressed
        #[arg(long)]
        fail_on_regression: bool,
    },

    /// Print and write the summary of a stored session
    Summarize {
        /// Result directory
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Report file (defaults to summary-report.txt in DIR)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Write a starter .mobperf.toml
    Init {
        /// Application package / bundle id
        #[arg(long)]
        package: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
