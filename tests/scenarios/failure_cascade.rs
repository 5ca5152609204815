//! A failed stage skips everything after it; remaining commands inside
//! the failed stage body do not run.

use crate::helpers::{cleanup, ctx, load_pipeline, temp_workspace, MockRunner};
use conveyor::core::{Outcome, RunStatus, StageDisposition};
use conveyor::execution::Engine;

const LINT_THEN_BUILD: &str = r#"
name: lint-then-build
stages:
  - name: Lint
    parallel:
      - name: Lint Frontend
        run: ["npm run lint"]
      - name: Lint Python
        run: ["poetry run pre-commit run --all-files"]
      - name: Lint Enterprise Python
        run: ["poetry run lint-enterprise"]
  - name: Build
    parallel:
      - name: Build Backend
        run: ["poetry build"]
      - name: Build Frontend
        run: ["npm run build"]
"#;

#[tokio::test]
async fn failing_lint_sibling_skips_the_build_group() {
    let pipeline = load_pipeline(LINT_THEN_BUILD);
    let workspace = temp_workspace();

    let runner = MockRunner::new().fail_on("npm run lint", 1);
    let calls = runner.calls();
    let engine = Engine::new(runner);
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    // Lint group failed, the other lint siblings still completed
    assert!(matches!(
        report.stages[0].disposition,
        StageDisposition::Completed {
            outcome: Outcome::Failure
        }
    ));

    // Build group never ran
    assert!(report.stages[1].disposition.is_skipped());
    let calls = calls.lock().unwrap();
    assert!(!calls.iter().any(|c| c.contains("build")));

    assert_eq!(report.status, RunStatus::Failure);
    cleanup(&workspace);
}

#[tokio::test]
async fn commands_after_a_failure_in_the_same_body_do_not_run() {
    let yaml = r#"
name: body-stop
stages:
  - name: Setup Python
    run:
      - pip install poetry
      - poetry install
      - poetry check
"#;
    let pipeline = load_pipeline(yaml);
    let workspace = temp_workspace();

    let runner = MockRunner::new().fail_on("poetry install", 2);
    let calls = runner.calls();
    let engine = Engine::new(runner);
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    let calls = calls.lock().unwrap();
    assert_eq!(
        calls.as_slice(),
        ["pip install poetry", "poetry install"],
        "the command after the failure must not run"
    );
    assert_eq!(report.status, RunStatus::Failure);
    cleanup(&workspace);
}

#[tokio::test]
async fn later_stages_keep_their_skip_records() {
    let yaml = r#"
name: three-stages
stages:
  - name: Checkout
    run: ["git fetch"]
  - name: Build
    run: ["make build"]
  - name: Test
    run: ["make test"]
"#;
    let pipeline = load_pipeline(yaml);
    let workspace = temp_workspace();

    let engine = Engine::new(MockRunner::new().fail_on("git fetch", 128));
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    assert_eq!(report.stages.len(), 3);
    assert!(report.stages[1].disposition.is_skipped());
    assert!(report.stages[2].disposition.is_skipped());
    cleanup(&workspace);
}
