//! Measurement pipeline
//!
//! One run is a fixed sequence of external commands:
//! 1. build the project for the configured build configuration
//! 2. install the artifact on the device
//! 3. force-stop, attach profilers, launch the activity
//! 4. keep profilers attached for the monitor window
//! 5. sample memory, detach profilers, collect their output
//!
//! [`TestOrchestrator`] repeats that cycle and persists the records.

pub mod collect;
pub mod config;
pub mod executor;
pub mod orchestrator;
pub mod profiler;
pub mod tool_runner;

pub use config::{
    AbortPolicy, CommandTemplate, PerfTestConfig, ProfilerConfig, ProfilerKind, RunCommands,
    TemplateVars, Timeouts,
};
pub use executor::RunExecutor;
pub use orchestrator::{SessionState, TestOrchestrator};
pub use profiler::{AttachedProfiler, ProfilerOutput};
pub use tool_runner::{StageOutput, ToolRunner};
