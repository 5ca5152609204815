//! Stage domain model

use crate::core::config::{ReportsConfig, StageConfig};
use crate::core::guard::Guard;

/// A named unit of pipeline work: either a leaf that runs shell
/// commands or a group whose children run concurrently.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Stage name, unique across the tree
    pub name: String,

    /// Guard predicate; `None` means the stage always runs
    pub guard: Option<Guard>,

    /// Leaf body or parallel children
    pub body: StageBody,
}

/// The two stage shapes. Config validation guarantees a group never
/// carries a direct body and groups never nest.
#[derive(Debug, Clone)]
pub enum StageBody {
    Leaf {
        /// Shell commands, run in order; the first non-zero exit fails the stage
        commands: Vec<String>,

        /// Working directory relative to the workspace
        dir: Option<String>,

        /// Reports collected after the body finishes
        reports: Reports,
    },
    Group {
        /// Children started together, each scoped to its own directory
        children: Vec<Stage>,
    },
}

/// Report declarations for a leaf stage
#[derive(Debug, Clone, Default)]
pub struct Reports {
    pub junit: Vec<String>,
    pub coverage: Vec<String>,
}

impl Reports {
    pub fn is_empty(&self) -> bool {
        self.junit.is_empty() && self.coverage.is_empty()
    }
}

impl From<&ReportsConfig> for Reports {
    fn from(config: &ReportsConfig) -> Self {
        Reports {
            junit: config.junit.clone(),
            coverage: config.coverage.clone(),
        }
    }
}

impl Stage {
    /// Build a stage (and its children) from config
    pub fn from_config(config: &StageConfig) -> Self {
        let guard = config.when.as_ref().map(|w| Guard {
            branch: w.branch.clone(),
            changed: w.changed.clone(),
        });

        let body = if config.is_group() {
            StageBody::Group {
                children: config.parallel.iter().map(Stage::from_config).collect(),
            }
        } else {
            StageBody::Leaf {
                commands: config.run.clone(),
                dir: config.dir.clone(),
                reports: config
                    .reports
                    .as_ref()
                    .map(Reports::from)
                    .unwrap_or_default(),
            }
        };

        Stage {
            name: config.name.clone(),
            guard,
            body,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.body, StageBody::Group { .. })
    }

    /// Number of leaf stages under this one (itself if a leaf)
    pub fn leaf_count(&self) -> usize {
        match &self.body {
            StageBody::Leaf { .. } => 1,
            StageBody::Group { children } => children.iter().map(Stage::leaf_count).sum(),
        }
    }
}
