//! Command handlers for the mobperf CLI
//!
//! Each submodule handles one subcommand and returns `anyhow::Result`;
//! exit codes are decided in `main`.

pub mod compare;
pub mod completions;
pub mod init;
pub mod run;
pub mod summarize;

pub use compare::cmd_compare;
pub use completions::cmd_completions;
pub use init::cmd_init;
pub use run::cmd_run;
pub use summarize::cmd_summarize;
