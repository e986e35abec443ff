#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use drmflow::config::WorkflowFile;
use drmflow::execution::{Execution, ExecutionSettings};
use drmflow::fs::FileWait;
use drmflow::fs::mock::MockFileSystem;
use drmflow::types::TaskId;

pub use drmflow_test_utils::{init_tracing, with_timeout};

/// Settings for in-memory executions: file waits give up immediately.
pub fn quick_settings(max_attempts: u32) -> ExecutionSettings {
    let wait = FileWait::new(Duration::ZERO, Duration::from_millis(1));
    ExecutionSettings {
        name: "test".to_string(),
        max_attempts,
        log_root: PathBuf::from("/log"),
        output_root: PathBuf::from("/out"),
        failure_wait: wait,
        profile_wait: wait,
        ..ExecutionSettings::default()
    }
}

/// Empty execution over a fresh mock filesystem.
pub fn execution(max_attempts: u32) -> (Execution, MockFileSystem) {
    let fs = MockFileSystem::new();
    let ex = Execution::in_memory(quick_settings(max_attempts), Arc::new(fs.clone()));
    (ex, fs)
}

/// Build an execution from a workflow over a fresh mock filesystem.
pub fn from_workflow(workflow: &WorkflowFile) -> (Execution, MockFileSystem) {
    let fs = MockFileSystem::new();
    let ex = Execution::from_workflow(workflow, Arc::new(fs.clone()))
        .expect("workflow should build");
    (ex, fs)
}

/// Id of the task in `stage` carrying tag `key = value`.
pub fn task_by_tag(ex: &Execution, stage: &str, key: &str, value: &str) -> TaskId {
    let stage = ex.stage_by_name(stage).expect("stage exists");
    ex.tasks_of_stage(stage.id())
        .find(|t| t.tags().get(key).map(String::as_str) == Some(value))
        .map(|t| t.id())
        .expect("task exists")
}
