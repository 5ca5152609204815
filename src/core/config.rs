//! Pipeline configuration from YAML

use crate::core::trigger::PollSchedule;
use crate::core::Pipeline;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Run-wide options
    #[serde(default)]
    pub options: PipelineOptions,

    /// Environment bindings visible to every stage, in declaration order
    #[serde(default)]
    environment: serde_yaml::Mapping,

    /// Polling schedule expression (five-field, `H` supported)
    #[serde(default)]
    pub poll: Option<String>,

    /// Top-level stages, run in the order written
    pub stages: Vec<StageConfig>,

    /// Outcome-keyed post actions
    #[serde(default)]
    pub post: PostConfig,
}

/// Run-wide options, immutable once a run starts
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Whole-run wall-clock budget in minutes
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u64,

    /// How many runs per pipeline the history store keeps
    #[serde(default = "default_history_retention")]
    pub history_retention: usize,

    /// Prefix live output lines with wall-clock timestamps
    #[serde(default)]
    pub timestamps: bool,

    /// Extend the cascade skip to unstable stages, not just failed ones
    #[serde(default)]
    pub skip_after_unstable: bool,
}

fn default_timeout_minutes() -> u64 {
    60
}

fn default_history_retention() -> usize {
    30
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            timeout_minutes: default_timeout_minutes(),
            history_retention: default_history_retention(),
            timestamps: false,
            skip_after_unstable: false,
        }
    }
}

/// A stage as written in YAML: either a leaf (`run`) or a parallel
/// group (`parallel`), never both
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage name, unique across the whole tree
    pub name: String,

    /// Working directory, relative to the workspace (leaf stages only)
    #[serde(default)]
    pub dir: Option<String>,

    /// Guard predicate; absent means the stage always runs
    #[serde(default)]
    pub when: Option<GuardConfig>,

    /// Shell commands, run in order (leaf stages only)
    #[serde(default)]
    pub run: Vec<String>,

    /// Child stages, run concurrently (group stages only)
    #[serde(default)]
    pub parallel: Vec<StageConfig>,

    /// Report files to collect after the body finishes (leaf stages only)
    #[serde(default)]
    pub reports: Option<ReportsConfig>,
}

impl StageConfig {
    pub fn is_group(&self) -> bool {
        !self.parallel.is_empty()
    }
}

/// Guard conditions; any-of semantics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Run when the build branch equals this name
    #[serde(default)]
    pub branch: Option<String>,

    /// Run when any changed path matches one of these globs
    #[serde(default)]
    pub changed: Vec<String>,
}

/// Report declarations, workspace-relative globs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// JUnit XML result files; failures make the stage unstable
    #[serde(default)]
    pub junit: Vec<String>,

    /// Coverage XML files; collected into the run summary
    #[serde(default)]
    pub coverage: Vec<String>,
}

/// Post actions keyed by outcome class
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostConfig {
    #[serde(default)]
    pub always: Vec<PostActionConfig>,

    #[serde(default)]
    pub success: Vec<PostActionConfig>,

    #[serde(default)]
    pub failure: Vec<PostActionConfig>,

    #[serde(default)]
    pub unstable: Vec<PostActionConfig>,

    #[serde(default)]
    pub aborted: Vec<PostActionConfig>,
}

impl PostConfig {
    pub fn is_empty(&self) -> bool {
        self.always.is_empty()
            && self.success.is_empty()
            && self.failure.is_empty()
            && self.unstable.is_empty()
            && self.aborted.is_empty()
    }
}

/// A single post action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostActionConfig {
    /// Emit a message
    Echo(String),

    /// Clean a target after the run; only "workspace" is recognized
    Cleanup(String),

    /// Mail a notification. Parsed for compatibility, currently not
    /// wired to any transport; executing it logs that delivery is off.
    Mail { to: String },
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).with_context(|| {
            format!("Failed to read pipeline file {}", path.as_ref().display())
        })?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig =
            serde_yaml::from_str(yaml).context("Failed to parse pipeline YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("Pipeline name must not be empty");
        }
        if self.stages.is_empty() {
            bail!("Pipeline has no stages");
        }

        let mut seen_names = HashSet::new();
        for stage in &self.stages {
            Self::validate_stage(stage, false, &mut seen_names)?;
        }

        for (key, _) in &self.environment {
            if key.as_str().is_none() {
                bail!("Environment binding names must be strings");
            }
        }

        if let Some(expr) = &self.poll {
            PollSchedule::parse(expr, &self.name)
                .with_context(|| format!("Invalid poll schedule '{}'", expr))?;
        }

        for action in self
            .post
            .always
            .iter()
            .chain(&self.post.success)
            .chain(&self.post.failure)
            .chain(&self.post.unstable)
            .chain(&self.post.aborted)
        {
            if let PostActionConfig::Cleanup(target) = action {
                if target != "workspace" {
                    bail!("Unknown cleanup target '{}', expected 'workspace'", target);
                }
            }
        }

        Ok(())
    }

    fn validate_stage(
        stage: &StageConfig,
        nested: bool,
        seen_names: &mut HashSet<String>,
    ) -> Result<()> {
        if stage.name.trim().is_empty() {
            bail!("Stage name must not be empty");
        }
        if !seen_names.insert(stage.name.clone()) {
            bail!("Duplicate stage name: {}", stage.name);
        }

        match (stage.run.is_empty(), stage.parallel.is_empty()) {
            (true, true) => bail!("Stage '{}' has neither 'run' nor 'parallel'", stage.name),
            (false, false) => bail!(
                "Stage '{}' has both 'run' and 'parallel'; a group has no direct body",
                stage.name
            ),
            _ => {}
        }

        if stage.is_group() {
            if stage.dir.is_some() {
                bail!("Group stage '{}' cannot set 'dir'", stage.name);
            }
            if stage.reports.is_some() {
                bail!("Group stage '{}' cannot declare 'reports'", stage.name);
            }
            if nested {
                bail!(
                    "Stage '{}' nests a parallel group inside a parallel group",
                    stage.name
                );
            }
            for child in &stage.parallel {
                Self::validate_stage(child, true, seen_names)?;
            }
        }

        if let Some(guard) = &stage.when {
            if guard.branch.is_none() && guard.changed.is_empty() {
                bail!("Stage '{}' has an empty 'when' guard", stage.name);
            }
            if guard.changed.iter().any(|g| g.trim().is_empty()) {
                bail!("Stage '{}' has an empty changed-path glob", stage.name);
            }
        }

        if let Some(reports) = &stage.reports {
            for pattern in reports.junit.iter().chain(&reports.coverage) {
                glob::Pattern::new(pattern).with_context(|| {
                    format!("Stage '{}' has invalid report glob '{}'", stage.name, pattern)
                })?;
            }
        }

        Ok(())
    }

    /// Environment bindings in declaration order
    pub fn environment_bindings(&self) -> Vec<(String, String)> {
        self.environment
            .iter()
            .filter_map(|(key, value)| {
                let key = key.as_str()?.to_string();
                let value = match value {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => serde_yaml::to_string(other)
                        .map(|s| s.trim_end().to_string())
                        .unwrap_or_default(),
                };
                Some((key, value))
            })
            .collect()
    }

    /// Convert the config into a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}
