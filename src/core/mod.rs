//! Core domain models
//!
//! This module defines the data structures that represent a pipeline:
//! the stage tree, guards, options, environment bindings, the poll
//! trigger and run state.

pub mod config;
pub mod context;
pub mod guard;
pub mod pipeline;
pub mod stage;
pub mod state;
pub mod trigger;

pub use config::{PipelineConfig, PipelineOptions, PostActionConfig, PostConfig};
pub use context::RunContext;
pub use guard::Guard;
pub use pipeline::Pipeline;
pub use stage::{Reports, Stage, StageBody};
pub use state::{Outcome, RunStatus, StageDisposition, StageRecord, TestCounts};
pub use trigger::PollSchedule;
