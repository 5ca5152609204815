//! Main execution engine - orchestrates a pipeline run

use crate::core::{
    Outcome, Pipeline, Reports, RunContext, RunStatus, Stage, StageBody, StageDisposition,
    StageRecord, TestCounts,
};
use crate::execution::post;
use crate::execution::report;
use crate::execution::shell::{CommandRunner, CommandSpec};
use chrono::{DateTime, Utc};
use futures::future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events emitted while a run executes
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
    },
    StageStarted {
        stage: String,
    },
    StageOutput {
        stage: String,
        output: String,
    },
    StageCompleted {
        stage: String,
        outcome: Outcome,
    },
    StageSkipped {
        stage: String,
        reason: String,
    },
    PostMessage {
        message: String,
    },
    RunCompleted {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(RunEvent) + Send + Sync>;

/// Everything known about a finished (or aborted) run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pipeline_name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Top-level stage records in pipeline order. An aborted run only
    /// carries the stages that resolved before the timeout hit.
    pub stages: Vec<StageRecord>,

    /// Test counts aggregated across every stage's JUnit reports
    pub tests: TestCounts,

    /// Coverage files collected across all stages
    pub coverage_files: Vec<String>,

    /// Total leaf stages in the pipeline definition
    pub total_stages: usize,
}

impl RunReport {
    /// Stages that reached a terminal disposition, counting the
    /// children of a group that ran (a stage skipped whole counts once)
    pub fn completed_stages(&self) -> usize {
        self.stages.iter().map(StageRecord::leaf_count).sum()
    }

    /// Progress as a fraction between 0.0 and 1.0
    pub fn progress(&self) -> f64 {
        if self.total_stages == 0 {
            return 0.0;
        }
        self.completed_stages() as f64 / self.total_stages as f64
    }
}

/// Pipeline execution engine, generic over the command runner so tests
/// can drive it with a scripted one
pub struct Engine<R> {
    runner: Arc<R>,
    handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl<R: CommandRunner> Engine<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner: Arc::new(runner),
            handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(RunEvent) + Send + Sync + 'static,
    {
        self.handlers.lock().await.push(Arc::new(handler));
    }

    async fn emit(&self, event: RunEvent) {
        let handlers = self.handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute a pipeline run to a terminal status.
    ///
    /// Stages run in the order written under a single wall-clock budget;
    /// post actions run exactly once after the stage tree resolves or
    /// the budget expires.
    pub async fn run(&self, pipeline: &Pipeline, ctx: &RunContext) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!("Starting run of pipeline {} ({})", pipeline.name, run_id);
        self.emit(RunEvent::RunStarted {
            run_id,
            pipeline_name: pipeline.name.clone(),
        })
        .await;

        // Shared accumulator so an aborted run still reports the stages
        // that resolved before the timeout cancelled the walk
        let records: Arc<Mutex<Vec<StageRecord>>> = Arc::new(Mutex::new(Vec::new()));
        let budget = std::time::Duration::from_secs(pipeline.options.timeout_minutes * 60);

        let timed_out = tokio::time::timeout(budget, self.walk_stages(pipeline, ctx, &records))
            .await
            .is_err();

        let stages = records.lock().await.clone();
        let status = if timed_out {
            warn!(
                "Run {} exceeded its {}-minute budget, aborting",
                run_id, pipeline.options.timeout_minutes
            );
            RunStatus::Aborted
        } else {
            let worst = stages
                .iter()
                .fold(Outcome::Success, |acc, r| {
                    acc.worst(r.disposition.effective_outcome())
                });
            RunStatus::from_outcome(worst)
        };

        self.run_post_actions(pipeline, ctx, status).await;

        info!("Run {} finished: {:?}", run_id, status);
        self.emit(RunEvent::RunCompleted { run_id, status }).await;

        let mut tests = TestCounts::default();
        let mut coverage_files = Vec::new();
        collect_totals(&stages, &mut tests, &mut coverage_files);

        RunReport {
            run_id,
            pipeline_name: pipeline.name.clone(),
            status,
            started_at,
            completed_at: Utc::now(),
            stages,
            tests,
            coverage_files,
            total_stages: pipeline.leaf_count(),
        }
    }

    /// Sequential walk of the top-level stages with cascade skipping:
    /// once a stage fails (or ends unstable, when so configured), the
    /// remaining stages are skipped rather than run.
    async fn walk_stages(
        &self,
        pipeline: &Pipeline,
        ctx: &RunContext,
        records: &Arc<Mutex<Vec<StageRecord>>>,
    ) {
        let mut cascade: Option<String> = None;

        for stage in &pipeline.stages {
            let record = match &cascade {
                Some(reason) => {
                    self.emit(RunEvent::StageSkipped {
                        stage: stage.name.clone(),
                        reason: reason.clone(),
                    })
                    .await;
                    StageRecord::skipped(&stage.name, reason.clone())
                }
                None => self.run_stage(stage, ctx).await,
            };

            match record.disposition.effective_outcome() {
                Outcome::Failure => {
                    cascade
                        .get_or_insert_with(|| format!("stage '{}' failed", record.name));
                }
                Outcome::Unstable if pipeline.options.skip_after_unstable => {
                    cascade.get_or_insert_with(|| {
                        format!("stage '{}' was unstable", record.name)
                    });
                }
                _ => {}
            }

            records.lock().await.push(record);
        }
    }

    /// Run one top-level stage: guard, then leaf body or parallel group
    async fn run_stage(&self, stage: &Stage, ctx: &RunContext) -> StageRecord {
        if let Some(guard) = &stage.guard {
            if !guard.allows(ctx) {
                let reason = guard.skip_reason();
                info!("Skipping stage {}: {}", stage.name, reason);
                self.emit(RunEvent::StageSkipped {
                    stage: stage.name.clone(),
                    reason: reason.clone(),
                })
                .await;
                return StageRecord::skipped(&stage.name, reason);
            }
        }

        match &stage.body {
            StageBody::Leaf {
                commands,
                dir,
                reports,
            } => {
                self.run_leaf(&stage.name, commands, dir.as_deref(), reports, ctx)
                    .await
            }
            StageBody::Group { children } => self.run_group(&stage.name, children, ctx).await,
        }
    }

    /// Run a parallel group: all children start together and run to
    /// completion; a failing child does not cancel its siblings. The
    /// group's outcome is the worst among the children.
    async fn run_group(&self, name: &str, children: &[Stage], ctx: &RunContext) -> StageRecord {
        self.emit(RunEvent::StageStarted {
            stage: name.to_string(),
        })
        .await;
        let start = Instant::now();

        let child_records =
            future::join_all(children.iter().map(|child| self.run_child(child, ctx))).await;

        let all_skipped = child_records.iter().all(|r| r.disposition.is_skipped());
        let disposition = if all_skipped {
            StageDisposition::Skipped {
                reason: "all child stages were skipped".to_string(),
            }
        } else {
            let outcome = child_records.iter().fold(Outcome::Success, |acc, r| {
                acc.worst(r.disposition.effective_outcome())
            });
            StageDisposition::Completed { outcome }
        };

        match &disposition {
            StageDisposition::Completed { outcome } => {
                self.emit(RunEvent::StageCompleted {
                    stage: name.to_string(),
                    outcome: *outcome,
                })
                .await;
            }
            StageDisposition::Skipped { reason } => {
                self.emit(RunEvent::StageSkipped {
                    stage: name.to_string(),
                    reason: reason.clone(),
                })
                .await;
            }
        }

        StageRecord {
            name: name.to_string(),
            disposition,
            duration_secs: start.elapsed().as_secs_f64(),
            tests: TestCounts::default(),
            coverage_files: Vec::new(),
            children: child_records,
        }
    }

    /// Run a group child: its own guard, then its leaf body. Validation
    /// guarantees group children are leaves.
    async fn run_child(&self, child: &Stage, ctx: &RunContext) -> StageRecord {
        if let Some(guard) = &child.guard {
            if !guard.allows(ctx) {
                let reason = guard.skip_reason();
                info!("Skipping stage {}: {}", child.name, reason);
                self.emit(RunEvent::StageSkipped {
                    stage: child.name.clone(),
                    reason: reason.clone(),
                })
                .await;
                return StageRecord::skipped(&child.name, reason);
            }
        }

        match &child.body {
            StageBody::Leaf {
                commands,
                dir,
                reports,
            } => {
                self.run_leaf(&child.name, commands, dir.as_deref(), reports, ctx)
                    .await
            }
            StageBody::Group { .. } => {
                error!("Group '{}' nested inside a group reached the engine", child.name);
                StageRecord {
                    name: child.name.clone(),
                    disposition: StageDisposition::Completed {
                        outcome: Outcome::Failure,
                    },
                    duration_secs: 0.0,
                    tests: TestCounts::default(),
                    coverage_files: Vec::new(),
                    children: Vec::new(),
                }
            }
        }
    }

    /// Run a leaf stage body: commands in order, first non-zero exit
    /// fails the stage; declared JUnit reports with failing tests turn
    /// a clean exit into unstable.
    async fn run_leaf(
        &self,
        name: &str,
        commands: &[String],
        dir: Option<&str>,
        reports: &Reports,
        ctx: &RunContext,
    ) -> StageRecord {
        self.emit(RunEvent::StageStarted {
            stage: name.to_string(),
        })
        .await;
        let start = Instant::now();
        let cwd = ctx.stage_dir(dir);

        let mut outcome = Outcome::Success;
        for command in commands {
            let spec = CommandSpec {
                command: command.clone(),
                cwd: cwd.clone(),
                env: ctx.environment.clone(),
            };

            match self.runner.run(&spec).await {
                Ok(output) => {
                    if !output.stdout.is_empty() {
                        self.emit(RunEvent::StageOutput {
                            stage: name.to_string(),
                            output: output.stdout.clone(),
                        })
                        .await;
                    }
                    if !output.success() {
                        error!(
                            "Stage {}: '{}' exited with code {}",
                            name, command, output.exit_code
                        );
                        if !output.stderr.is_empty() {
                            self.emit(RunEvent::StageOutput {
                                stage: name.to_string(),
                                output: output.stderr.clone(),
                            })
                            .await;
                        }
                        outcome = Outcome::Failure;
                        break;
                    }
                }
                Err(e) => {
                    error!("Stage {}: {}", name, e);
                    self.emit(RunEvent::StageOutput {
                        stage: name.to_string(),
                        output: e.to_string(),
                    })
                    .await;
                    outcome = Outcome::Failure;
                    break;
                }
            }
        }

        // Reports are published whatever the body did; they only soften
        // a clean exit into unstable, never a failure into anything else
        let mut tests = TestCounts::default();
        let mut coverage_files = Vec::new();
        if !reports.is_empty() {
            let collected = report::collect(&ctx.workspace, reports);
            tests = collected.tests;
            coverage_files = collected.coverage_files;
            if outcome == Outcome::Success && tests.has_failures() {
                warn!(
                    "Stage {}: {} failing test(s) in JUnit reports, marking unstable",
                    name,
                    tests.failures + tests.errors
                );
                outcome = Outcome::Unstable;
            }
        }

        self.emit(RunEvent::StageCompleted {
            stage: name.to_string(),
            outcome,
        })
        .await;

        StageRecord {
            name: name.to_string(),
            disposition: StageDisposition::Completed { outcome },
            duration_secs: start.elapsed().as_secs_f64(),
            tests,
            coverage_files,
            children: Vec::new(),
        }
    }

    /// Run post actions for the final status: the `always` block plus
    /// the block matching the outcome class, exactly once per run.
    async fn run_post_actions(&self, pipeline: &Pipeline, ctx: &RunContext, status: RunStatus) {
        for action in post::actions_for(&pipeline.post, status) {
            match post::run_action(action, ctx) {
                Ok(message) => {
                    self.emit(RunEvent::PostMessage { message }).await;
                }
                Err(e) => {
                    // Post actions never change the run status
                    warn!("Post action failed: {}", e);
                    self.emit(RunEvent::PostMessage {
                        message: format!("Post action failed: {}", e),
                    })
                    .await;
                }
            }
        }
    }
}

fn collect_totals(records: &[StageRecord], tests: &mut TestCounts, coverage: &mut Vec<String>) {
    for record in records {
        tests.add(record.tests);
        coverage.extend(record.coverage_files.iter().cloned());
        collect_totals(&record.children, tests, coverage);
    }
}
