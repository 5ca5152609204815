//! Parallel group status is the worst of its children, and a failing
//! child never cancels its siblings.

use crate::helpers::{cleanup, ctx, load_pipeline, temp_workspace, MockRunner};
use conveyor::core::{Outcome, RunStatus, StageDisposition};
use conveyor::execution::Engine;

const BUILD_GROUP: &str = r#"
name: build-all
stages:
  - name: Build
    parallel:
      - name: Build Backend
        run: ["poetry build"]
      - name: Build Frontend
        run: ["npm run build"]
      - name: Build UI Components
        run: ["bun run build"]
"#;

#[tokio::test]
async fn all_children_succeed() {
    let pipeline = load_pipeline(BUILD_GROUP);
    let workspace = temp_workspace();

    let engine = Engine::new(MockRunner::new());
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    let group = &report.stages[0];
    assert!(matches!(
        group.disposition,
        StageDisposition::Completed {
            outcome: Outcome::Success
        }
    ));
    assert_eq!(group.children.len(), 3);
    assert_eq!(report.status, RunStatus::Success);
    cleanup(&workspace);
}

#[tokio::test]
async fn one_failing_child_fails_the_group() {
    let pipeline = load_pipeline(BUILD_GROUP);
    let workspace = temp_workspace();

    let runner = MockRunner::new().fail_on("npm run build", 1);
    let calls = runner.calls();
    let engine = Engine::new(runner);
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    let group = &report.stages[0];
    assert!(matches!(
        group.disposition,
        StageDisposition::Completed {
            outcome: Outcome::Failure
        }
    ));

    // Every sibling ran to completion despite the failure
    let calls = calls.lock().unwrap();
    assert!(calls.contains(&"poetry build".to_string()));
    assert!(calls.contains(&"bun run build".to_string()));

    assert_eq!(report.status, RunStatus::Failure);
    cleanup(&workspace);
}

#[tokio::test]
async fn failure_outranks_unstable_among_children() {
    let yaml = r#"
name: mixed-outcomes
stages:
  - name: Test
    parallel:
      - name: Python Unit Tests
        run: ["pytest"]
        reports:
          junit: ["test-results-python.xml"]
      - name: Frontend Unit Tests
        run: ["npm run test"]
"#;
    let pipeline = load_pipeline(yaml);
    let workspace = temp_workspace();
    // The python suite passes its command but reports a failing test
    std::fs::write(
        workspace.join("test-results-python.xml"),
        r#"<testsuite tests="8" failures="1" errors="0" skipped="0"/>"#,
    )
    .unwrap();

    let engine = Engine::new(MockRunner::new().fail_on("npm run test", 1));
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    let group = &report.stages[0];
    assert!(matches!(
        group.children[0].disposition,
        StageDisposition::Completed {
            outcome: Outcome::Unstable
        }
    ));
    assert!(matches!(
        group.children[1].disposition,
        StageDisposition::Completed {
            outcome: Outcome::Failure
        }
    ));
    // failure > unstable > success
    assert!(matches!(
        group.disposition,
        StageDisposition::Completed {
            outcome: Outcome::Failure
        }
    ));
    assert_eq!(report.status, RunStatus::Failure);
    cleanup(&workspace);
}

#[tokio::test]
async fn skipped_sibling_does_not_dilute_the_group() {
    let yaml = r#"
name: skip-in-group
stages:
  - name: Lint
    parallel:
      - name: Lint Frontend
        when:
          changed: ["frontend/**"]
        run: ["npm run lint"]
      - name: Lint Python
        run: ["poetry run lint"]
"#;
    let pipeline = load_pipeline(yaml);
    let workspace = temp_workspace();

    let engine = Engine::new(MockRunner::new().fail_on("poetry run lint", 1));
    let report = engine
        .run(&pipeline, &ctx(&workspace, "feature/api", &[]))
        .await;

    // One child skipped, the other failed: the group fails
    let group = &report.stages[0];
    assert!(matches!(
        group.disposition,
        StageDisposition::Completed {
            outcome: Outcome::Failure
        }
    ));
    cleanup(&workspace);
}
