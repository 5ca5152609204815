//! Post actions - hooks run once after the stage tree resolves

use crate::core::config::{PostActionConfig, PostConfig};
use crate::core::{RunContext, RunStatus};
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Actions to run for a terminal status: the `always` block first,
/// then the block matching the outcome class.
pub fn actions_for(post: &PostConfig, status: RunStatus) -> Vec<&PostActionConfig> {
    let mut actions: Vec<&PostActionConfig> = post.always.iter().collect();

    let class = match status {
        RunStatus::Success => &post.success,
        RunStatus::Unstable => &post.unstable,
        RunStatus::Failure => &post.failure,
        RunStatus::Aborted => &post.aborted,
        // Post actions only run on terminal statuses
        RunStatus::Pending | RunStatus::Running => return actions,
    };
    actions.extend(class.iter());

    actions
}

/// Run one post action, returning the message to surface for it
pub fn run_action(action: &PostActionConfig, ctx: &RunContext) -> Result<String> {
    match action {
        PostActionConfig::Echo(message) => Ok(message.clone()),
        PostActionConfig::Cleanup(_) => {
            let removed = clean_workspace(ctx)?;
            Ok(format!(
                "Cleaned workspace ({} entr{} removed)",
                removed,
                if removed == 1 { "y" } else { "ies" }
            ))
        }
        PostActionConfig::Mail { to } => {
            // Parsed for compatibility; no transport is configured
            info!("Mail notification to {} skipped: delivery not configured", to);
            Ok(format!("Mail to {} skipped (delivery not configured)", to))
        }
    }
}

/// Remove everything inside the workspace directory, leaving the
/// directory itself in place.
fn clean_workspace(ctx: &RunContext) -> Result<usize> {
    let entries = std::fs::read_dir(&ctx.workspace).with_context(|| {
        format!("Failed to read workspace {}", ctx.workspace.display())
    })?;

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let result = if entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }

    Ok(removed)
}
