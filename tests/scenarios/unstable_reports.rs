//! JUnit reports with failing tests turn a clean exit into unstable,
//! never into failure.

use crate::helpers::{cleanup, ctx, load_pipeline, temp_workspace, MockRunner};
use conveyor::core::{Outcome, RunStatus, StageDisposition};
use conveyor::execution::Engine;

const TEST_STAGE: &str = r#"
name: unit-tests
stages:
  - name: Python Unit Tests
    run: ["pytest --forked -n auto"]
    reports:
      junit: ["test-results-*.xml"]
      coverage: ["coverage-*.xml"]
"#;

#[tokio::test]
async fn failing_tests_with_clean_exit_are_unstable() {
    let pipeline = load_pipeline(TEST_STAGE);
    let workspace = temp_workspace();
    std::fs::write(
        workspace.join("test-results-unit.xml"),
        r#"<testsuite name="pytest" tests="120" failures="2" errors="0" skipped="5"/>"#,
    )
    .unwrap();

    let engine = Engine::new(MockRunner::new());
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    assert!(matches!(
        report.stages[0].disposition,
        StageDisposition::Completed {
            outcome: Outcome::Unstable
        }
    ));
    assert_eq!(report.status, RunStatus::Unstable);
    assert_eq!(report.tests.total, 120);
    assert_eq!(report.tests.failures, 2);
    cleanup(&workspace);
}

#[tokio::test]
async fn passing_tests_stay_successful() {
    let pipeline = load_pipeline(TEST_STAGE);
    let workspace = temp_workspace();
    std::fs::write(
        workspace.join("test-results-unit.xml"),
        r#"<testsuite name="pytest" tests="120" failures="0" errors="0" skipped="5"/>"#,
    )
    .unwrap();
    std::fs::write(workspace.join("coverage-unit.xml"), "<coverage/>").unwrap();

    let engine = Engine::new(MockRunner::new());
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.tests.total, 120);
    assert_eq!(report.coverage_files, vec!["coverage-unit.xml"]);
    cleanup(&workspace);
}

#[tokio::test]
async fn missing_reports_are_tolerated() {
    let pipeline = load_pipeline(TEST_STAGE);
    let workspace = temp_workspace();

    let engine = Engine::new(MockRunner::new());
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    // "Allow empty results": nothing matched, nothing failed
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.tests.total, 0);
    cleanup(&workspace);
}

#[tokio::test]
async fn nonzero_exit_is_failure_even_with_reports_declared() {
    let pipeline = load_pipeline(TEST_STAGE);
    let workspace = temp_workspace();
    std::fs::write(
        workspace.join("test-results-unit.xml"),
        r#"<testsuite tests="3" failures="0" errors="0" skipped="0"/>"#,
    )
    .unwrap();

    let engine = Engine::new(MockRunner::new().fail_on("pytest --forked -n auto", 1));
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    assert_eq!(report.status, RunStatus::Failure);
    cleanup(&workspace);
}

#[tokio::test]
async fn unstable_does_not_skip_later_stages_by_default() {
    let yaml = r#"
name: unstable-continues
stages:
  - name: Test
    run: ["pytest"]
    reports:
      junit: ["results.xml"]
  - name: Package
    run: ["make package"]
"#;
    let pipeline = load_pipeline(yaml);
    let workspace = temp_workspace();
    std::fs::write(
        workspace.join("results.xml"),
        r#"<testsuite tests="4" failures="1" errors="0" skipped="0"/>"#,
    )
    .unwrap();

    let runner = MockRunner::new();
    let calls = runner.calls();
    let engine = Engine::new(runner);
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    // Without skip_after_unstable the pipeline keeps going
    assert!(calls.lock().unwrap().contains(&"make package".to_string()));
    assert_eq!(report.status, RunStatus::Unstable);
    cleanup(&workspace);
}
