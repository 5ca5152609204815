//! CLI output formatting

use crate::core::{Outcome, RunStatus, StageDisposition, StageRecord, TestCounts};
use crate::execution::RunEvent;
use crate::persistence::RunSummary;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Spinner shown while `watch` waits for the next scheduled run
pub fn create_wait_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Success => style("SUCCESS").green().to_string(),
        RunStatus::Unstable => style("UNSTABLE").yellow().to_string(),
        RunStatus::Failure => style("FAILURE").red().to_string(),
        RunStatus::Aborted => style("ABORTED").magenta().to_string(),
    }
}

/// Format a stage outcome for display
pub fn format_outcome(outcome: Outcome) -> String {
    match outcome {
        Outcome::Success => style("ok").green().to_string(),
        Outcome::Unstable => style("unstable").yellow().to_string(),
        Outcome::Failure => style("failed").red().to_string(),
    }
}

/// Format a run event as a console line
pub fn format_run_event(event: &RunEvent) -> String {
    match event {
        RunEvent::RunStarted {
            run_id,
            pipeline_name,
        } => format!(
            "{} Starting pipeline {} ({})",
            ROCKET,
            style(pipeline_name).bold(),
            style(&run_id.to_string()[..8]).dim()
        ),
        RunEvent::StageStarted { stage } => {
            format!("{} {}", SPINNER, style(stage).cyan())
        }
        RunEvent::StageOutput { stage, output } => {
            format!("{} Output from {}:\n{}", INFO, style(stage).dim(), output)
        }
        RunEvent::StageCompleted { stage, outcome } => {
            let icon = match outcome {
                Outcome::Success => CHECK,
                Outcome::Unstable => WARN,
                Outcome::Failure => CROSS,
            };
            format!("{} {} {}", icon, style(stage).cyan(), format_outcome(*outcome))
        }
        RunEvent::StageSkipped { stage, reason } => {
            format!(
                "{} {} {} ({})",
                INFO,
                style(stage).cyan(),
                style("skipped").dim(),
                style(reason).dim()
            )
        }
        RunEvent::PostMessage { message } => {
            format!("{} {}", INFO, message)
        }
        RunEvent::RunCompleted { run_id, status } => {
            format!(
                "{} Run {} finished: {}",
                ROCKET,
                style(&run_id.to_string()[..8]).dim(),
                format_status(*status)
            )
        }
    }
}

/// Prefix a line with a wall-clock timestamp when enabled
pub fn stamp(line: String, timestamps: bool) -> String {
    if timestamps {
        let now = chrono::Local::now().format("%H:%M:%S");
        line.lines()
            .map(|l| format!("[{}] {}", now, l))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        line
    }
}

/// Format a stage record line for the end-of-run summary
pub fn format_stage_record(record: &StageRecord, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    let line = match &record.disposition {
        StageDisposition::Completed { outcome } => format!(
            "{}{} {} ({})",
            pad,
            style(&record.name).bold(),
            format_outcome(*outcome),
            format_duration(Duration::from_secs_f64(record.duration_secs))
        ),
        StageDisposition::Skipped { reason } => format!(
            "{}{} {} ({})",
            pad,
            style(&record.name).bold(),
            style("skipped").dim(),
            style(reason).dim()
        ),
    };

    let mut lines = vec![line];
    for child in &record.children {
        lines.push(format_stage_record(child, indent + 1));
    }
    lines.join("\n")
}

/// Format aggregated test counts
pub fn format_test_counts(counts: &TestCounts) -> String {
    format!(
        "{} run, {} failed, {} errored, {} skipped",
        style(counts.total).cyan(),
        if counts.failures > 0 {
            style(counts.failures).red()
        } else {
            style(counts.failures).green()
        },
        counts.errors,
        counts.skipped
    )
}

/// Format a run summary for history listings
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Success => CHECK,
        RunStatus::Failure => CROSS,
        RunStatus::Unstable => WARN,
        RunStatus::Running => SPINNER,
        _ => INFO,
    };

    format!(
        "{} {} - {} - {} ({}/{}) - {}",
        status_icon,
        style(&summary.run_id.to_string()[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        format_status(summary.status),
        summary.completed_stages,
        summary.total_stages,
        style(format!("{:.0}%", summary.progress * 100.0)).cyan()
    )
}

/// Format a duration compactly
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
