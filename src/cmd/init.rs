//! Init command implementation
//!
//! Handles the `mobperf init` command which writes a commented starter
//! `.mobperf.toml` into the current directory

use anyhow::{Context, Result};
use console::style;
use std::env;

use crate::config::{self, ConfigLoader};
use crate::fmt::{icon, CHECKMARK, ROCKET, WARNING};
use crate::infra::{FileSystem, RealFileSystem};

/// Package written when none is given
const PLACEHOLDER_PACKAGE: &str = "com.example.app";

/// Create `.mobperf.toml` in the current directory
///
/// An existing file is left untouched.
///
/// # Examples
///
/// ```no_run
/// use mobperf::cmd::init::cmd_init;
///
/// cmd_init(Some("com.example.app"))?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn cmd_init(package: Option<&str>) -> Result<()> {
    println!(
        "{}{} Initializing mobperf",
        icon(ROCKET),
        style("mobperf init").bold()
    );
    println!();

    let project_root = env::current_dir()?;

    if ConfigLoader::exists(&project_root) {
        println!(
            "{}Config file already exists: {}",
            icon(WARNING),
            style(config::CONFIG_FILE_NAME).cyan()
        );
        println!("   Delete it first or edit manually to update.");
        return Ok(());
    }

    let package = package.unwrap_or(PLACEHOLDER_PACKAGE);
    let path = ConfigLoader::path_in(&project_root);
    RealFileSystem
        .write_new(&path, config::starter_config(package))
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{}Created {}",
        icon(CHECKMARK),
        style(config::CONFIG_FILE_NAME).cyan().bold()
    );
    println!();
    println!("{}", style("Next Steps:").bold());
    if package == PLACEHOLDER_PACKAGE {
        println!("   1. Set {} to your application id", style("package").cyan());
    } else {
        println!(
            "   1. Review the commands in {}",
            config::CONFIG_FILE_NAME
        );
    }
    println!(
        "   2. Run {} to measure a baseline",
        style("mobperf run -o perf-results/baseline").cyan()
    );
    println!(
        "   3. Run {} after your change",
        style("mobperf compare perf-results/baseline <NEW_DIR>").cyan()
    );

    Ok(())
}
