//! The run budget aborts in-flight stages, and post actions run exactly
//! once whatever the final status is.

use crate::helpers::{
    cleanup, ctx, load_pipeline, post_messages, record_events, temp_workspace, MockRunner,
};
use conveyor::core::RunStatus;
use conveyor::execution::Engine;
use std::time::Duration;

const WITH_POSTS: &str = r#"
name: post-heavy
stages:
  - name: Build
    run: ["make build"]
post:
  always:
    - echo: "always ran"
  success:
    - echo: "success message"
  failure:
    - echo: "failure message"
  unstable:
    - echo: "unstable message"
  aborted:
    - echo: "aborted message"
"#;

#[tokio::test]
async fn success_emits_only_the_success_message() {
    let pipeline = load_pipeline(WITH_POSTS);
    let workspace = temp_workspace();

    let engine = Engine::new(MockRunner::new());
    let events = record_events(&engine).await;
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    assert_eq!(report.status, RunStatus::Success);
    let messages = post_messages(&events);
    assert!(messages.contains(&"always ran".to_string()));
    assert!(messages.contains(&"success message".to_string()));
    assert!(!messages.contains(&"failure message".to_string()));
    assert!(!messages.contains(&"unstable message".to_string()));
    cleanup(&workspace);
}

#[tokio::test]
async fn failure_emits_always_and_failure_blocks_once() {
    let pipeline = load_pipeline(WITH_POSTS);
    let workspace = temp_workspace();

    let engine = Engine::new(MockRunner::new().fail_on("make build", 1));
    let events = record_events(&engine).await;
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    assert_eq!(report.status, RunStatus::Failure);
    let messages = post_messages(&events);
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.as_str() == "always ran")
            .count(),
        1
    );
    assert!(messages.contains(&"failure message".to_string()));
    assert!(!messages.contains(&"success message".to_string()));
    cleanup(&workspace);
}

#[tokio::test]
async fn timeout_aborts_and_still_runs_post_actions_once() {
    let yaml = r#"
name: too-slow
options:
  timeout_minutes: 0
stages:
  - name: Long Build
    run: ["make everything"]
post:
  always:
    - echo: "always ran"
  aborted:
    - echo: "aborted message"
  failure:
    - echo: "failure message"
"#;
    let pipeline = load_pipeline(yaml);
    let workspace = temp_workspace();

    // Far longer than the zero-minute budget
    let engine = Engine::new(MockRunner::new().with_delay(Duration::from_secs(600)));
    let events = record_events(&engine).await;
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    assert_eq!(report.status, RunStatus::Aborted);
    let messages = post_messages(&events);
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.as_str() == "always ran")
            .count(),
        1,
        "the always block must run exactly once even when aborted"
    );
    assert!(messages.contains(&"aborted message".to_string()));
    assert!(!messages.contains(&"failure message".to_string()));
    cleanup(&workspace);
}

#[tokio::test]
async fn timed_out_run_keeps_records_of_resolved_stages() {
    let yaml = r#"
name: partial
options:
  timeout_minutes: 0
stages:
  - name: Forever
    run: ["sleep a lot"]
"#;
    let pipeline = load_pipeline(yaml);
    let workspace = temp_workspace();

    let engine = Engine::new(MockRunner::new().with_delay(Duration::from_secs(600)));
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    assert_eq!(report.status, RunStatus::Aborted);
    // The in-flight stage never resolved, so it carries no record
    assert!(report.stages.is_empty());
    assert!(report.progress() < 1.0);
    cleanup(&workspace);
}

#[tokio::test]
async fn pipeline_without_post_block_completes_quietly() {
    let yaml = r#"
name: bare
stages:
  - name: Build
    run: ["make"]
"#;
    let pipeline = load_pipeline(yaml);
    let workspace = temp_workspace();

    let engine = Engine::new(MockRunner::new());
    let events = record_events(&engine).await;
    let report = engine.run(&pipeline, &ctx(&workspace, "main", &[])).await;

    assert_eq!(report.status, RunStatus::Success);
    assert!(post_messages(&events).is_empty());
    cleanup(&workspace);
}
