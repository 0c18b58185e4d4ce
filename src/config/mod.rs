//! Configuration for mobperf
//!
//! This module provides:
//! - `.mobperf.toml` file structure and loading
//! - resolution of file values and CLI flags into validated run and
//!   comparison configs
//! - the starter file written by `mobperf init`

pub mod file;
pub mod loader;
pub mod resolver;
pub mod template;

pub use file::{ConfigFile, CONFIG_FILE_NAME};
pub use loader::ConfigLoader;
pub use resolver::{CompareOverrides, ConfigResolver, RunOverrides};
pub use template::starter_config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_name_constant_is_correct() {
        assert_eq!(CONFIG_FILE_NAME, ".mobperf.toml");
    }
}
