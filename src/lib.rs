//! conveyor - a declarative CI pipeline runner for shell-stage builds

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use core::{
    Guard, Outcome, Pipeline, PipelineConfig, PipelineOptions, PollSchedule, RunContext,
    RunStatus, Stage, StageBody, StageDisposition, StageRecord, TestCounts,
};
pub use execution::{CommandRunner, CommandSpec, Engine, RunEvent, RunReport, ShellRunner};
