//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

pub use crate::core::RunStatus;
use crate::execution::RunReport;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of a pipeline run kept in history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    /// Terminal status
    pub status: RunStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished (if it did)
    pub completed_at: Option<DateTime<Utc>>,

    /// Progress (0.0 to 1.0)
    pub progress: f64,

    /// Leaf stages that reached a terminal disposition
    pub completed_stages: usize,

    /// Total leaf stages
    pub total_stages: usize,
}

/// Build a history summary from a finished run
pub fn create_summary(report: &RunReport) -> RunSummary {
    RunSummary {
        run_id: report.run_id,
        pipeline_name: report.pipeline_name.clone(),
        status: report.status,
        started_at: report.started_at,
        completed_at: Some(report.completed_at),
        progress: report.progress(),
        completed_stages: report.completed_stages(),
        total_stages: report.total_stages,
    }
}

/// Trait for history backends
#[async_trait::async_trait]
pub trait RunStore: Send + Sync {
    /// Save a run summary
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List runs for a pipeline, newest first
    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>>;

    /// List all pipeline names with stored runs
    async fn list_pipelines(&self) -> Result<Vec<String>>;

    /// Drop all but the newest `keep` runs of a pipeline
    async fn prune(&self, pipeline_name: &str, keep: usize) -> Result<()>;
}

/// In-memory history (for `--no-history` runs and tests)
pub struct InMemoryPersistence {
    runs: tokio::sync::RwLock<Vec<RunSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            runs: tokio::sync::RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RunStore for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.retain(|r| r.run_id != run.run_id);
        runs.push(run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.iter().find(|r| r.run_id == run_id).cloned())
    }

    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut matching: Vec<RunSummary> = runs
            .iter()
            .filter(|r| r.pipeline_name == pipeline_name)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(matching)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let mut names: Vec<String> = runs.iter().map(|r| r.pipeline_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn prune(&self, pipeline_name: &str, keep: usize) -> Result<()> {
        let keep_ids: Vec<Uuid> = self
            .list_runs(pipeline_name)
            .await?
            .into_iter()
            .take(keep)
            .map(|r| r.run_id)
            .collect();

        let mut runs = self.runs.write().await;
        runs.retain(|r| r.pipeline_name != pipeline_name || keep_ids.contains(&r.run_id));
        Ok(())
    }
}
