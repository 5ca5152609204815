//! Run and stage state models

use serde::{Deserialize, Serialize};

/// Terminal outcome of a stage that actually ran.
///
/// Ordered by severity so that aggregation can take the worst of a set
/// of outcomes: failure > unstable > success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Outcome {
    /// Every command exited zero and no declared report showed failures
    Success,
    /// Commands exited zero but a declared JUnit report contained failing tests
    Unstable,
    /// A command exited non-zero (or could not be spawned)
    Failure,
}

impl Outcome {
    /// Worst of two outcomes under failure > unstable > success
    pub fn worst(self, other: Outcome) -> Outcome {
        self.max(other)
    }
}

/// Overall status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is in progress
    Running,
    /// All stages succeeded (or were skipped)
    Success,
    /// At least one stage ended unstable, none failed
    Unstable,
    /// At least one stage failed
    Failure,
    /// The run exceeded its timeout and was cancelled
    Aborted,
}

impl RunStatus {
    /// Map the worst stage outcome onto a run status
    pub fn from_outcome(outcome: Outcome) -> RunStatus {
        match outcome {
            Outcome::Success => RunStatus::Success,
            Outcome::Unstable => RunStatus::Unstable,
            Outcome::Failure => RunStatus::Failure,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Pending | RunStatus::Running)
    }
}

/// How a single stage ended up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageDisposition {
    /// Stage ran to completion with the given outcome
    Completed { outcome: Outcome },
    /// Stage was skipped (guard false, or an earlier stage failed)
    Skipped { reason: String },
}

impl StageDisposition {
    /// Outcome this disposition contributes to aggregation.
    ///
    /// A skip contributes success: it must never flip aggregate status
    /// to failure on its own.
    pub fn effective_outcome(&self) -> Outcome {
        match self {
            StageDisposition::Completed { outcome } => *outcome,
            StageDisposition::Skipped { .. } => Outcome::Success,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageDisposition::Skipped { .. })
    }
}

/// Record of one stage in a finished (or aborted) run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    pub disposition: StageDisposition,
    /// Wall-clock seconds the stage body ran (0 for skipped stages)
    pub duration_secs: f64,
    /// Aggregated test counts from declared JUnit reports
    pub tests: TestCounts,
    /// Coverage report files collected after the stage
    pub coverage_files: Vec<String>,
    /// Child records for a parallel group (empty for leaf stages)
    pub children: Vec<StageRecord>,
}

impl StageRecord {
    pub fn skipped(name: &str, reason: impl Into<String>) -> Self {
        StageRecord {
            name: name.to_string(),
            disposition: StageDisposition::Skipped {
                reason: reason.into(),
            },
            duration_secs: 0.0,
            tests: TestCounts::default(),
            coverage_files: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Count leaf stages under this record (the record itself if a leaf)
    pub fn leaf_count(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(|c| c.leaf_count()).sum()
        }
    }
}

/// Test counts aggregated from JUnit report files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    pub total: u64,
    pub failures: u64,
    pub errors: u64,
    pub skipped: u64,
}

impl TestCounts {
    pub fn add(&mut self, other: TestCounts) {
        self.total += other.total;
        self.failures += other.failures;
        self.errors += other.errors;
        self.skipped += other.skipped;
    }

    /// True when any test case failed or errored
    pub fn has_failures(&self) -> bool {
        self.failures > 0 || self.errors > 0
    }
}
