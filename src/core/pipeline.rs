//! Pipeline domain model

use crate::core::config::{PipelineConfig, PipelineOptions, PostConfig};
use crate::core::stage::Stage;
use crate::core::trigger::PollSchedule;

/// A pipeline definition: an ordered stage tree plus the run-wide
/// options, environment bindings, trigger and post actions around it.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Run-wide options
    pub options: PipelineOptions,

    /// Raw environment bindings, resolved per run by `RunContext`
    pub environment: Vec<(String, String)>,

    /// Polling schedule, if the pipeline declares one
    pub trigger: Option<PollSchedule>,

    /// Top-level stages, run in the order written
    pub stages: Vec<Stage>,

    /// Outcome-keyed post actions
    pub post: PostConfig,
}

impl Pipeline {
    /// Create a pipeline from validated configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        // Validation already proved the schedule parses
        let trigger = config
            .poll
            .as_ref()
            .and_then(|expr| PollSchedule::parse(expr, &config.name).ok());

        Pipeline {
            name: config.name.clone(),
            options: config.options,
            environment: config.environment_bindings(),
            trigger,
            stages: config.stages.iter().map(Stage::from_config).collect(),
            post: config.post.clone(),
        }
    }

    /// Total number of leaf stages
    pub fn leaf_count(&self) -> usize {
        self.stages.iter().map(Stage::leaf_count).sum()
    }
}
