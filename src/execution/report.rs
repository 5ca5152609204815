//! Report collection - JUnit and coverage files published after a stage

use crate::core::state::TestCounts;
use crate::core::Reports;
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

/// Files and counts gathered for one stage
#[derive(Debug, Clone, Default)]
pub struct CollectedReports {
    /// Aggregated counts across every matched JUnit file
    pub tests: TestCounts,

    /// JUnit files that were matched and parsed, workspace-relative
    pub junit_files: Vec<String>,

    /// Coverage files that were matched, workspace-relative
    pub coverage_files: Vec<String>,
}

/// Collect a stage's declared reports from the workspace.
///
/// Globs that match nothing are tolerated ("allow empty results"): the
/// stage outcome is decided by what was found, and an empty match only
/// logs a warning.
pub fn collect(workspace: &Path, reports: &Reports) -> CollectedReports {
    let mut collected = CollectedReports::default();

    for pattern in &reports.junit {
        let mut matched = false;
        for path in expand(workspace, pattern) {
            matched = true;
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    let counts = parse_junit(&content);
                    debug!(
                        "JUnit report {}: {} tests, {} failures, {} errors",
                        path.display(),
                        counts.total,
                        counts.failures,
                        counts.errors
                    );
                    collected.tests.add(counts);
                    collected.junit_files.push(display_path(workspace, &path));
                }
                Err(e) => warn!("Skipping unreadable JUnit report {}: {}", path.display(), e),
            }
        }
        if !matched {
            warn!("JUnit pattern '{}' matched no files", pattern);
        }
    }

    for pattern in &reports.coverage {
        let mut matched = false;
        for path in expand(workspace, pattern) {
            matched = true;
            collected.coverage_files.push(display_path(workspace, &path));
        }
        if !matched {
            warn!("Coverage pattern '{}' matched no files", pattern);
        }
    }

    collected
}

fn expand(workspace: &Path, pattern: &str) -> Vec<std::path::PathBuf> {
    let full = workspace.join(pattern);
    let Some(full) = full.to_str() else {
        warn!("Report pattern '{}' is not valid UTF-8 here", pattern);
        return Vec::new();
    };

    match glob::glob(full) {
        Ok(paths) => paths.filter_map(|entry| entry.ok()).collect(),
        Err(e) => {
            // Validation catches this at load time; a stale file can
            // still race us here.
            warn!("Bad report pattern '{}': {}", pattern, e);
            Vec::new()
        }
    }
}

fn display_path(workspace: &Path, path: &Path) -> String {
    path.strip_prefix(workspace)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Extract test counts from a JUnit XML document.
///
/// Reads the summary attributes of each `<testsuite>` element; falls
/// back to counting `<testcase>`/`<failure>`/`<error>` elements when a
/// report carries no summary attributes. Malformed content counts as
/// zero tests.
pub fn parse_junit(content: &str) -> TestCounts {
    // \b keeps the plural <testsuites> wrapper from matching too
    let suite = Regex::new(r"<testsuite\b[^>]*>").unwrap();
    let attr = Regex::new(r#"(\w+)="([^"]*)""#).unwrap();

    let mut counts = TestCounts::default();
    let mut saw_suite_attrs = false;

    for tag in suite.find_iter(content) {
        let mut suite_counts = TestCounts::default();
        let mut has_tests_attr = false;

        for caps in attr.captures_iter(tag.as_str()) {
            let value: u64 = caps[2].parse().unwrap_or(0);
            match &caps[1] {
                "tests" => {
                    suite_counts.total = value;
                    has_tests_attr = true;
                }
                "failures" => suite_counts.failures = value,
                "errors" => suite_counts.errors = value,
                "skipped" => suite_counts.skipped = value,
                _ => {}
            }
        }

        if has_tests_attr {
            saw_suite_attrs = true;
            counts.add(suite_counts);
        }
    }

    if !saw_suite_attrs {
        counts.total = count_tags(content, "testcase");
        counts.failures = count_tags(content, "failure");
        counts.errors = count_tags(content, "error");
        counts.skipped = count_tags(content, "skipped");
    }

    counts
}

fn count_tags(content: &str, tag: &str) -> u64 {
    let pattern = Regex::new(&format!(r"<{}\b", tag)).unwrap();
    pattern.find_iter(content).count() as u64
}
