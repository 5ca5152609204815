//! Run context - inputs and environment bindings for one pipeline run

use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Inputs a single run is evaluated against.
///
/// Environment bindings are resolved once when the context is built and
/// are read-only for every stage afterwards.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Workspace directory commands run in (stage `dir` is relative to it)
    pub workspace: PathBuf,

    /// Branch name guards are evaluated against
    pub branch: String,

    /// Changed paths guards are evaluated against, workspace-relative
    pub changed_paths: Vec<String>,

    /// Resolved environment bindings, in declaration order
    pub environment: Vec<(String, String)>,
}

impl RunContext {
    /// Build a context, resolving `${NAME}` references in the raw bindings.
    ///
    /// References resolve in declaration order: `${WORKSPACE}` expands to
    /// the workspace path, earlier bindings shadow process environment
    /// variables, and anything still unknown expands to empty with a
    /// warning.
    pub fn new(
        workspace: impl AsRef<Path>,
        branch: impl Into<String>,
        changed_paths: Vec<String>,
        raw_environment: &[(String, String)],
    ) -> Self {
        let workspace = workspace.as_ref().to_path_buf();
        let environment = resolve_bindings(&workspace, raw_environment);

        Self {
            workspace,
            branch: branch.into(),
            changed_paths,
            environment,
        }
    }

    /// Look up a resolved binding
    pub fn env(&self, name: &str) -> Option<&str> {
        self.environment
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Working directory for a stage, given its optional `dir` scope
    pub fn stage_dir(&self, dir: Option<&str>) -> PathBuf {
        match dir {
            Some(d) => self.workspace.join(d),
            None => self.workspace.clone(),
        }
    }
}

fn resolve_bindings(workspace: &Path, raw: &[(String, String)]) -> Vec<(String, String)> {
    let reference = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let mut resolved: Vec<(String, String)> = Vec::with_capacity(raw.len());

    for (name, value) in raw {
        let expanded = reference
            .replace_all(value, |caps: &regex::Captures<'_>| {
                let var = &caps[1];
                if var == "WORKSPACE" {
                    return workspace.to_string_lossy().into_owned();
                }
                if let Some((_, v)) = resolved.iter().find(|(k, _)| k == var) {
                    return v.clone();
                }
                match std::env::var(var) {
                    Ok(v) => v,
                    Err(_) => {
                        warn!("Unresolved reference ${{{}}} in binding {}", var, name);
                        String::new()
                    }
                }
            })
            .into_owned();

        resolved.push((name.clone(), expanded));
    }

    resolved
}
