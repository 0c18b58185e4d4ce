//! Common test utilities and helpers
//!
//! This module provides shared functionality for integration tests:
//! - Assertion helpers for approximate comparisons
//! - Fake projects whose build/deploy/launch commands are plain shell
//! - Stored result sets for compare and summarize
//!
//! # Usage
//!
//! ```rust,no_run
//! mod common;
//! use common::fixtures;
//!
//! let project = fixtures::fake_project(fixtures::LAUNCH_OK).unwrap();
//! ```

pub mod assertions;
pub mod fixtures;

use assert_cmd::Command;

/// Helper to get the mobperf binary command
#[allow(dead_code)]
pub fn mobperf() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mobperf"));
    cmd.arg("--no-emoji");
    cmd
}
