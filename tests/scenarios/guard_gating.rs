//! Guarded stages run iff the branch matches or a changed path matches;
//! a skip never turns into a failure on its own.

use crate::helpers::{cleanup, ctx, load_pipeline, temp_workspace, MockRunner};
use conveyor::core::RunStatus;
use conveyor::execution::Engine;

const GUARDED: &str = r#"
name: guarded
stages:
  - name: Lint Frontend
    when:
      branch: main
      changed: ["frontend/**"]
    run: ["npm run lint"]
"#;

#[tokio::test]
async fn runs_on_main_branch() {
    let pipeline = load_pipeline(GUARDED);
    let workspace = temp_workspace();

    let engine = Engine::new(MockRunner::new());
    let report = engine
        .run(&pipeline, &ctx(&workspace, "main", &["docs/notes.md"]))
        .await;

    assert!(!report.stages[0].disposition.is_skipped());
    assert_eq!(report.status, RunStatus::Success);
    cleanup(&workspace);
}

#[tokio::test]
async fn runs_on_matching_changeset() {
    let pipeline = load_pipeline(GUARDED);
    let workspace = temp_workspace();

    let engine = Engine::new(MockRunner::new());
    let report = engine
        .run(
            &pipeline,
            &ctx(&workspace, "feature/colors", &["frontend/src/theme.css"]),
        )
        .await;

    assert!(!report.stages[0].disposition.is_skipped());
    assert_eq!(report.status, RunStatus::Success);
    cleanup(&workspace);
}

#[tokio::test]
async fn skipped_when_neither_condition_holds() {
    let pipeline = load_pipeline(GUARDED);
    let workspace = temp_workspace();

    let runner = MockRunner::new();
    let calls = runner.calls();
    let engine = Engine::new(runner);
    let report = engine
        .run(
            &pipeline,
            &ctx(&workspace, "feature/api", &["backend/server.py"]),
        )
        .await;

    assert!(report.stages[0].disposition.is_skipped());
    // The guard prevented execution entirely
    assert!(calls.lock().unwrap().is_empty());
    // A skip must not flip aggregate status to failure
    assert_eq!(report.status, RunStatus::Success);
    cleanup(&workspace);
}

#[tokio::test]
async fn group_with_all_children_skipped_is_skipped_not_failed() {
    let yaml = r#"
name: all-gated
stages:
  - name: Lint
    parallel:
      - name: Lint Frontend
        when:
          changed: ["frontend/**"]
        run: ["npm run lint"]
      - name: Lint Components
        when:
          changed: ["openhands-ui/**"]
        run: ["bun run lint"]
"#;
    let pipeline = load_pipeline(yaml);
    let workspace = temp_workspace();

    let engine = Engine::new(MockRunner::new());
    let report = engine
        .run(&pipeline, &ctx(&workspace, "feature/api", &["backend/x.py"]))
        .await;

    assert!(report.stages[0].disposition.is_skipped());
    assert_eq!(report.status, RunStatus::Success);
    cleanup(&workspace);
}

#[tokio::test]
async fn unguarded_sibling_still_runs() {
    let yaml = r#"
name: mixed-gates
stages:
  - name: Lint
    parallel:
      - name: Lint Frontend
        when:
          changed: ["frontend/**"]
        run: ["npm run lint"]
      - name: Lint Python
        run: ["poetry run pre-commit run --all-files"]
"#;
    let pipeline = load_pipeline(yaml);
    let workspace = temp_workspace();

    let runner = MockRunner::new();
    let calls = runner.calls();
    let engine = Engine::new(runner);
    let report = engine
        .run(&pipeline, &ctx(&workspace, "feature/api", &[]))
        .await;

    let group = &report.stages[0];
    assert!(!group.disposition.is_skipped());
    assert!(group.children[0].disposition.is_skipped());
    assert!(!group.children[1].disposition.is_skipped());
    assert_eq!(
        calls.lock().unwrap().as_slice(),
        ["poetry run pre-commit run --all-files"]
    );
    assert_eq!(report.status, RunStatus::Success);
    cleanup(&workspace);
}
