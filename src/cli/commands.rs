//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run a pipeline once
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Branch name guards are evaluated against
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Changed path for guard evaluation (repeatable)
    #[arg(long)]
    pub changed: Vec<String>,

    /// Workspace directory (defaults to the current directory)
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

/// Validate a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Re-run a pipeline on its poll schedule
#[derive(Debug, Args, Clone)]
pub struct WatchCommand {
    /// Path to the pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Branch name guards are evaluated against
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Workspace directory (defaults to the current directory)
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Don't save runs to history
    #[arg(long)]
    pub no_history: bool,

    /// Stop after this many runs
    #[arg(long)]
    pub max_runs: Option<usize>,
}

/// List pipelines with stored history
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show run counts per pipeline
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific run by ID
    #[arg(long)]
    pub run_id: Option<String>,
}
