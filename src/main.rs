use anyhow::{Context, Result};
use conveyor::cli::commands::{
    HistoryCommand, ListCommand, RunCommand, ValidateCommand, WatchCommand,
};
use conveyor::cli::output::*;
use conveyor::cli::{Cli, Command};
use conveyor::core::{Pipeline, PipelineConfig, RunContext, RunStatus};
use conveyor::execution::{Engine, RunEvent, ShellRunner};
#[cfg(feature = "sqlite")]
use conveyor::persistence::SqliteRunStore;
use conveyor::persistence::{create_summary, InMemoryPersistence, RunStore, RunSummary};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, &cli).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Watch(cmd) => watch_pipeline(cmd, &cli).await?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

async fn open_store(no_history: bool) -> Result<Arc<dyn RunStore>> {
    #[cfg(feature = "sqlite")]
    if !no_history {
        return Ok(Arc::new(SqliteRunStore::with_default_path().await?));
    }

    let _ = no_history;
    Ok(Arc::new(InMemoryPersistence::new()))
}

fn workspace_dir(arg: &Option<PathBuf>) -> Result<PathBuf> {
    match arg {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().context("Cannot determine current directory"),
    }
}

async fn run_pipeline(cmd: &RunCommand, cli: &Cli) -> Result<()> {
    let config = PipelineConfig::from_file(&cmd.file)
        .context("Failed to load pipeline definition")?;

    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    let pipeline = config.to_pipeline();
    let workspace = workspace_dir(&cmd.workspace)?;
    let ctx = RunContext::new(
        &workspace,
        cmd.branch.clone(),
        cmd.changed.clone(),
        &pipeline.environment,
    );

    let store = open_store(cmd.no_history).await?;
    let status = execute_once(&pipeline, &ctx, store.as_ref(), cli.stream, cmd.no_history).await?;

    match status {
        RunStatus::Failure | RunStatus::Aborted => std::process::exit(1),
        RunStatus::Unstable => std::process::exit(2),
        _ => Ok(()),
    }
}

/// Run the pipeline once, printing events and the end-of-run summary,
/// and record it in history.
async fn execute_once(
    pipeline: &Pipeline,
    ctx: &RunContext,
    store: &dyn RunStore,
    stream: bool,
    no_history: bool,
) -> Result<RunStatus> {
    let engine = Engine::new(ShellRunner::new());

    let timestamps = pipeline.options.timestamps;
    engine
        .add_event_handler(move |event| {
            if matches!(event, RunEvent::StageOutput { .. }) && !stream {
                return;
            }
            println!("{}", stamp(format_run_event(&event), timestamps));
        })
        .await;

    println!();
    let report = engine.run(pipeline, ctx).await;

    println!();
    for record in &report.stages {
        println!("{}", format_stage_record(record, 1));
    }
    if report.tests.total > 0 {
        println!("\n{} Tests: {}", INFO, format_test_counts(&report.tests));
    }
    if !report.coverage_files.is_empty() {
        println!(
            "{} Coverage reports: {}",
            INFO,
            report.coverage_files.join(", ")
        );
    }

    if !no_history {
        let summary = create_summary(&report);
        store.save_run(&summary).await?;
        store
            .prune(&report.pipeline_name, pipeline.options.history_retention)
            .await?;
        println!(
            "\n{} Run saved to history (ID: {})",
            INFO,
            style(&summary.run_id.to_string()[..8]).dim()
        );
    }

    match report.status {
        RunStatus::Success => println!(
            "\n{} {} completed {}",
            CHECK,
            style(&pipeline.name).bold(),
            style("successfully").green()
        ),
        RunStatus::Unstable => println!(
            "\n{} {} completed {} (failing tests)",
            WARN,
            style(&pipeline.name).bold(),
            style("unstable").yellow()
        ),
        RunStatus::Failure => println!(
            "\n{} {} {}",
            CROSS,
            style(&pipeline.name).bold(),
            style("failed").red()
        ),
        RunStatus::Aborted => println!(
            "\n{} {} {} (timed out)",
            CROSS,
            style(&pipeline.name).bold(),
            style("aborted").magenta()
        ),
        _ => {}
    }

    Ok(report.status)
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            let pipeline = config.to_pipeline();
            println!("{} Pipeline definition is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!(
                "  Stages: {} top-level, {} leaf",
                style(config.stages.len()).cyan(),
                style(pipeline.leaf_count()).cyan()
            );
            println!(
                "  Environment bindings: {}",
                style(pipeline.environment.len()).cyan()
            );
            if let Some(poll) = &config.poll {
                println!("  Poll schedule: {}", style(poll).cyan());
            }
            if !config.post.is_empty() {
                println!("  Post actions: {}", style("configured").cyan());
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn watch_pipeline(cmd: &WatchCommand, cli: &Cli) -> Result<()> {
    let config = PipelineConfig::from_file(&cmd.file)
        .context("Failed to load pipeline definition")?;
    let pipeline = config.to_pipeline();

    let schedule = pipeline
        .trigger
        .clone()
        .context("Pipeline has no 'poll' schedule; nothing to watch")?;

    println!(
        "{} Watching {} on schedule '{}'",
        INFO,
        style(&pipeline.name).bold(),
        style(schedule.raw()).cyan()
    );

    let workspace = workspace_dir(&cmd.workspace)?;
    let store = open_store(cmd.no_history).await?;
    let mut runs = 0usize;

    loop {
        let now = chrono::Utc::now();
        let next = schedule
            .next_after(now)
            .context("Poll schedule never fires")?;
        let wait = (next - now).to_std().unwrap_or_default();

        let spinner = create_wait_spinner(format!(
            "Next run of {} at {}",
            pipeline.name,
            next.format("%Y-%m-%d %H:%M UTC")
        ));
        tokio::time::sleep(wait).await;
        spinner.finish_and_clear();

        // Bindings that reference the workspace resolve fresh per run
        let ctx = RunContext::new(
            &workspace,
            cmd.branch.clone(),
            Vec::new(),
            &pipeline.environment,
        );
        execute_once(&pipeline, &ctx, store.as_ref(), cli.stream, cmd.no_history).await?;

        runs += 1;
        if let Some(max) = cmd.max_runs {
            if runs >= max {
                println!("{} Stopping after {} run(s)", INFO, runs);
                return Ok(());
            }
        }
    }
}

async fn list_pipelines(cmd: &ListCommand) -> Result<()> {
    let store = open_store(false).await?;
    let pipelines = store.list_pipelines().await?;

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(());
    }

    println!("{} Pipelines in history:", INFO);

    for pipeline_name in &pipelines {
        let runs = store.list_runs(pipeline_name).await?;

        if cmd.with_counts {
            let succeeded = runs
                .iter()
                .filter(|r| r.status == RunStatus::Success)
                .count();
            let failed = runs
                .iter()
                .filter(|r| matches!(r.status, RunStatus::Failure | RunStatus::Aborted))
                .count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(pipeline_name).bold(),
                style(runs.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }
    }

    if cmd.json {
        let mut json_data = Vec::new();
        for pipeline in &pipelines {
            let runs = store.list_runs(pipeline).await.ok();
            json_data.push(serde_json::json!({
                "name": pipeline,
                "run_count": runs.as_ref().map(|r| r.len()).unwrap_or(0)
            }));
        }
        let data = serde_json::json!({ "pipelines": json_data });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_store(false).await?;

    // A specific run was requested
    if let Some(run_id_str) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id_str).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => print_run_details(&summary, cmd.verbose)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    // List runs for one pipeline or across all of them
    let runs = if let Some(pipeline_name) = &cmd.pipeline {
        store
            .list_runs(pipeline_name)
            .await?
            .into_iter()
            .take(cmd.limit)
            .collect()
    } else {
        let pipelines = store.list_pipelines().await?;
        let mut all_runs = Vec::new();
        for pipeline in &pipelines {
            all_runs.extend(store.list_runs(pipeline).await?);
        }
        all_runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all_runs.into_iter().take(cmd.limit).collect::<Vec<_>>()
    };

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        for summary in &runs {
            println!("  {}", format_run_summary(summary));
        }
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary, verbose: bool) -> Result<()> {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Progress: {} ({}/{})",
        style(format!("{:.0}%", summary.progress * 100.0)).cyan(),
        summary.completed_stages,
        summary.total_stages
    );

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
