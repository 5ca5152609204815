//! Test utilities for conveyor scenarios

use async_trait::async_trait;
use conveyor::core::{Pipeline, PipelineConfig, RunContext};
use conveyor::execution::{
    CommandOutput, CommandRunner, CommandSpec, Engine, RunEvent, RunnerError,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted runner: listed commands fail with their exit code, everything
/// else succeeds. Records every command it was asked to run.
pub struct MockRunner {
    failures: HashMap<String, i32>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            failures: HashMap::new(),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fail_on(mut self, command: &str, exit_code: i32) -> Self {
        self.failures.insert(command.to_string(), exit_code);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Handle to the commands this runner has executed
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(spec.command.clone());

        let exit_code = self.failures.get(&spec.command).copied().unwrap_or(0);
        Ok(CommandOutput {
            exit_code,
            stdout: format!("ran: {}", spec.command),
            stderr: if exit_code == 0 {
                String::new()
            } else {
                format!("'{}' exited {}", spec.command, exit_code)
            },
        })
    }
}

/// Parse and validate a pipeline from YAML
pub fn load_pipeline(yaml: &str) -> Pipeline {
    PipelineConfig::from_yaml(yaml)
        .expect("scenario YAML should be valid")
        .to_pipeline()
}

/// A fresh temp workspace directory
pub fn temp_workspace() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("conveyor-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp workspace");
    dir
}

pub fn cleanup(workspace: &PathBuf) {
    std::fs::remove_dir_all(workspace).ok();
}

/// Context with no environment bindings
pub fn ctx(workspace: &PathBuf, branch: &str, changed: &[&str]) -> RunContext {
    RunContext::new(
        workspace,
        branch,
        changed.iter().map(|s| s.to_string()).collect(),
        &[],
    )
}

/// Register a recording event handler on the engine
pub async fn record_events<R: CommandRunner>(engine: &Engine<R>) -> Arc<Mutex<Vec<RunEvent>>> {
    let events: Arc<Mutex<Vec<RunEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;
    events
}

/// Post messages captured by a recording handler
pub fn post_messages(events: &Arc<Mutex<Vec<RunEvent>>>) -> Vec<String> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            RunEvent::PostMessage { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}
