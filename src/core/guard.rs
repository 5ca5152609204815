//! Stage guards - branch and changed-path predicates

use crate::core::context::RunContext;
use glob_match::glob_match;

/// Predicate controlling whether a stage runs.
///
/// Conditions are any-of: the guard passes when the branch matches or
/// any changed path matches one of the declared globs. A guard that
/// passes lets the stage run; a guard that fails skips it (the stage is
/// neither run nor failed).
#[derive(Debug, Clone)]
pub struct Guard {
    /// Branch name the run must be on
    pub branch: Option<String>,

    /// Glob patterns matched against the run's changed paths
    pub changed: Vec<String>,
}

impl Guard {
    pub fn allows(&self, ctx: &RunContext) -> bool {
        if let Some(branch) = &self.branch {
            if ctx.branch == *branch {
                return true;
            }
        }

        self.changed.iter().any(|pattern| {
            ctx.changed_paths
                .iter()
                .any(|path| glob_match(pattern, path))
        })
    }

    /// Human-readable skip reason when the guard fails
    pub fn skip_reason(&self) -> String {
        let mut conditions = Vec::new();
        if let Some(branch) = &self.branch {
            conditions.push(format!("branch '{}'", branch));
        }
        if !self.changed.is_empty() {
            conditions.push(format!("changes in {}", self.changed.join(", ")));
        }
        format!("requires {}", conditions.join(" or "))
    }
}
