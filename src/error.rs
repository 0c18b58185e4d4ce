//! Harness errors with contextual suggestions
//!
//! Every fatal path of the harness ends in a [`HarnessError`]:
//! - configuration problems found before any run starts
//! - sessions that produced no successful run, or could not be persisted
//! - unusable inputs to a comparison
//!
//! Failures of individual runs are not errors; they are recorded in the
//! run's [`RunRecord`](crate::results::RunRecord).
//!
//! # Examples
//!
//! ```
//! use mobperf::error::HarnessError;
//!
//! let error = HarnessError::ToolMissing {
//!     tool: "adb".to_string(),
//! };
//!
//! assert!(error.suggestion().unwrap().contains("PATH"));
//! assert_eq!(error.exit_code(), 1);
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::results::{RunFailure, StoreError, RAW_RESULTS_FILE};

/// Fatal harness errors
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Configuration is invalid or incomplete
    #[error("invalid configuration: {message}")]
    Configuration {
        /// What is wrong
        message: String,
    },

    /// Configuration file could not be read or parsed
    #[error("failed to load configuration from {path}")]
    ConfigFile {
        /// Path to config file
        path: PathBuf,
        #[source]
        /// Parse or I/O error
        source: anyhow::Error,
    },

    /// Configured external program is not on PATH
    #[error("required program not found: {tool}")]
    ToolMissing {
        /// Program name as configured
        tool: String,
    },

    /// Output directory cannot be created or already holds a result set
    #[error("output directory unusable: {path}")]
    OutputDirectory {
        /// Offending directory
        path: PathBuf,
        /// Why it cannot be used
        reason: String,
    },

    /// Every attempted run failed
    #[error("no successful runs ({attempted} attempted)")]
    NoSuccessfulRuns {
        /// Runs attempted before the session stopped
        attempted: usize,
        /// Failure of the last run
        last_failure: Option<RunFailure>,
    },

    /// Raw result set could not be written
    #[error("failed to persist results")]
    Persistence(#[source] StoreError),

    /// Comparison inputs are unusable
    #[error(transparent)]
    ComparisonInput(#[from] ComparisonInputError),

    /// Generic I/O error with context
    #[error("I/O error: {context}")]
    Io {
        /// Where the error occurred
        context: String,
        #[source]
        /// IO error source
        source: std::io::Error,
    },
}

/// Problems with the two directories handed to a comparison
#[derive(Error, Debug)]
pub enum ComparisonInputError {
    /// Directory does not exist
    #[error("{role} directory not found: {path}")]
    MissingDirectory {
        /// `baseline` or `candidate`
        role: &'static str,
        /// Missing directory
        path: PathBuf,
    },

    /// Directory holds no raw results file
    #[error("{role} directory has no raw-results.json: {path}")]
    MissingRawData {
        /// `baseline` or `candidate`
        role: &'static str,
        /// Directory searched
        path: PathBuf,
    },

    /// Both inputs resolve to the same location
    #[error("baseline and candidate are the same location: {path}")]
    SameLocation {
        /// Canonical location
        path: PathBuf,
    },

    /// Raw results file exists but cannot be used
    #[error("{role} raw results are unreadable")]
    Unreadable {
        /// `baseline` or `candidate`
        role: &'static str,
        #[source]
        /// Underlying error
        source: StoreError,
    },
}

impl ComparisonInputError {
    /// Map a store error for one side of a comparison
    pub fn from_store(role: &'static str, error: StoreError) -> Self {
        match error {
            StoreError::MissingDirectory(path) => Self::MissingDirectory { role, path },
            StoreError::MissingFile(path) => Self::MissingRawData { role, path },
            source => Self::Unreadable { role, source },
        }
    }
}

impl HarnessError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Get an actionable suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Configuration { .. } => {
                Some("Check the flags and .mobperf.toml; run 'mobperf init' for a template".into())
            }
            Self::ConfigFile { path, .. } => Some(format!(
                "Fix the syntax in {} or delete it to use defaults",
                path.display()
            )),
            Self::ToolMissing { tool } => Some(format!(
                "Install '{}' or add its directory to PATH",
                tool
            )),
            Self::OutputDirectory { .. } => {
                Some("Choose a fresh directory with --output; result sets are write-once".into())
            }
            Self::NoSuccessfulRuns { last_failure, .. } => Some(match last_failure {
                Some(failure) => format!("Last run: {}", failure),
                None => "No run was attempted".into(),
            }),
            Self::Persistence(_) => Some("Check free space and permissions of the output directory".into()),
            Self::ComparisonInput(ComparisonInputError::SameLocation { .. }) => {
                Some("Pass two different result directories".into())
            }
            Self::ComparisonInput(ComparisonInputError::MissingRawData { .. }) => Some(format!(
                "Point at a directory written by 'mobperf run' (it contains {})",
                RAW_RESULTS_FILE
            )),
            Self::ComparisonInput(_) => None,
            Self::Io { context, .. } => Some(format!(
                "Check file permissions and that {} is accessible",
                context
            )),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Error formatter with colors and structured output
pub struct ErrorFormatter;

impl ErrorFormatter {
    /// Format error with its cause chain and a suggestion
    pub fn format(error: &anyhow::Error) -> String {
        use console::style;

        let mut output = String::new();

        output.push_str(&format!("{} {}\n", style("error:").red().bold(), error));

        let mut source = error.source();
        let mut indent = 1;
        while let Some(err) = source {
            output.push_str(&format!(
                "{}{} {}\n",
                "  ".repeat(indent),
                style("caused by:").yellow(),
                err
            ));
            source = err.source();
            indent += 1;
        }

        if let Some(harness_error) = error.downcast_ref::<HarnessError>() {
            if let Some(suggestion) = harness_error.suggestion() {
                output.push_str(&format!(
                    "\n{} {}\n",
                    style("help:").cyan().bold(),
                    suggestion
                ));
            }
        }

        output
    }

    /// Get exit code from error
    pub fn exit_code(error: &anyhow::Error) -> i32 {
        if let Some(harness_error) = error.downcast_ref::<HarnessError>() {
            harness_error.exit_code()
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::Stage;

    #[test]
    fn test_tool_missing_has_suggestion() {
        let err = HarnessError::ToolMissing {
            tool: "gradle".to_string(),
        };

        let suggestion = err.suggestion().expect("ToolMissing should have suggestion");
        assert!(suggestion.contains("gradle"));
    }

    #[test]
    fn test_no_successful_runs_names_last_failure() {
        let err = HarnessError::NoSuccessfulRuns {
            attempted: 3,
            last_failure: Some(RunFailure::exit(Stage::Build, Some(2))),
        };

        assert_eq!(err.to_string(), "no successful runs (3 attempted)");
        let suggestion = err.suggestion().unwrap();
        assert!(suggestion.contains("build failed"));
    }

    #[test]
    fn test_store_errors_map_to_comparison_input_errors() {
        let missing = ComparisonInputError::from_store(
            "baseline",
            StoreError::MissingFile(PathBuf::from("/tmp/a")),
        );
        assert!(matches!(
            missing,
            ComparisonInputError::MissingRawData { role: "baseline", .. }
        ));

        let gone = ComparisonInputError::from_store(
            "candidate",
            StoreError::MissingDirectory(PathBuf::from("/tmp/b")),
        );
        assert!(gone.to_string().starts_with("candidate directory not found"));
    }

    #[test]
    fn test_all_errors_exit_with_one() {
        let errors = vec![
            HarnessError::config("repetitions must be at least 1"),
            HarnessError::ToolMissing {
                tool: "adb".to_string(),
            },
            HarnessError::NoSuccessfulRuns {
                attempted: 1,
                last_failure: None,
            },
            HarnessError::ComparisonInput(ComparisonInputError::SameLocation {
                path: PathBuf::from("/tmp"),
            }),
        ];

        for err in errors {
            assert_eq!(err.exit_code(), 1, "{:?}", err);
        }
    }

    #[test]
    fn test_formatter_includes_help_line_for_harness_errors() {
        let err = anyhow::Error::new(HarnessError::ComparisonInput(
            ComparisonInputError::SameLocation {
                path: PathBuf::from("/tmp/results"),
            },
        ));

        let formatted = ErrorFormatter::format(&err);
        assert!(formatted.contains("same location"));
        assert!(formatted.contains("help:"));
        assert_eq!(ErrorFormatter::exit_code(&err), 1);
    }

    #[test]
    fn test_formatter_prints_cause_chain() {
        let err = anyhow::anyhow!("inner").context("outer");
        let formatted = ErrorFormatter::format(&err);

        assert!(formatted.contains("outer"));
        assert!(formatted.contains("caused by:"));
        assert!(formatted.contains("inner"));
    }
}
