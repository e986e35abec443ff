// tests/workflow_config.rs

mod common;
use crate::common::{from_workflow, init_tracing, task_by_tag};

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use drmflow::config::{load_and_validate, parse_str, WorkflowFile};
use drmflow::errors::DrmflowError;
use drmflow::types::{LinkMode, StoreMode};
use drmflow_test_utils::builders::{StageBuilder, TaskBuilder, WorkflowBuilder};

type TestResult = Result<(), Box<dyn Error>>;

const PIPELINE: &str = r#"
[execution]
name = "variants"
max_attempts = 3
log_dir = "runs/log"
output_dir = "runs/out"
drm = "local"
file_wait_timeout_secs = 30
poll_interval_ms = 250
store = "file"
fail_fast = true

[stage.align]
[[stage.align.task]]
cmd = "bwa mem A"
tags = { sample = "A" }
mem_req = 4096
cpu_req = 4
time_req = 120
drm_native_specification = "-q long"

[[stage.align.task]]
cmd = "bwa mem B"
tags = { sample = "B" }
must_succeed = false

[stage.call]
after = ["align"]
link = "matching_tags"
[[stage.call.task]]
cmd = "call A"
tags = { sample = "A" }
[[stage.call.task]]
cmd = "call B"
tags = { sample = "B" }

[stage.summary]
after = ["call"]
[[stage.summary.task]]
noop = true
"#;

#[test]
fn loads_every_field_from_disk() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Drmflow.toml");
    std::fs::write(&path, PIPELINE)?;

    let wf = load_and_validate(&path)?;

    let exec = &wf.execution;
    assert_eq!(exec.name, "variants");
    assert_eq!(exec.max_attempts, 3);
    assert_eq!(exec.log_dir, PathBuf::from("runs/log"));
    assert_eq!(exec.store, StoreMode::File);
    assert!(exec.fail_fast);
    assert_eq!(exec.file_wait().timeout, Duration::from_secs(30));
    assert_eq!(exec.file_wait().poll_interval, Duration::from_millis(250));

    let align = &wf.stage["align"];
    assert_eq!(align.task[0].mem_req, Some(4096));
    assert_eq!(align.task[0].cpu_req, 4);
    assert_eq!(align.task[0].drm_native_specification.as_deref(), Some("-q long"));
    assert!(!align.task[1].must_succeed);
    assert!(align.task[0].must_succeed);
    assert_eq!(wf.stage["call"].link, LinkMode::MatchingTags);
    assert!(wf.stage["summary"].task[0].noop);

    let order: Vec<_> = wf.stages_in_order().map(|(n, _)| n).collect();
    assert_eq!(order, vec!["align", "call", "summary"]);
    Ok(())
}

#[test]
fn built_execution_mirrors_the_workflow() -> TestResult {
    init_tracing();
    let mut raw = parse_str(PIPELINE)?;
    raw.execution.store = StoreMode::Memory;
    let wf = WorkflowFile::try_from(raw)?;
    let (ex, _fs) = from_workflow(&wf);

    assert_eq!(ex.max_attempts(), 3);
    let call_a = task_by_tag(&ex, "call", "sample", "A");
    let align_a = task_by_tag(&ex, "align", "sample", "A");
    assert_eq!(ex.parents_of(call_a), &[align_a]);

    let summary = ex.stage_by_name("summary").unwrap().tasks()[0];
    assert_eq!(ex.parents_of(summary).len(), 2);
    assert!(ex.task(summary).unwrap().is_noop());

    let align = ex.task(align_a).unwrap();
    assert_eq!(align.drm(), "local");
    assert_eq!(align.log_dir(), PathBuf::from("runs/log/align/sample-A"));
    assert_eq!(ex.successors(align_a).len(), 2);
    Ok(())
}

#[test]
fn defaults_apply_when_sections_are_missing() -> TestResult {
    let wf = WorkflowFile::try_from(parse_str(
        r#"
        [stage.only]
        [[stage.only.task]]
        cmd = "true"
        "#,
    )?)?;

    assert_eq!(wf.execution.max_attempts, 1);
    assert_eq!(wf.execution.drm, "local");
    assert_eq!(wf.execution.store, StoreMode::Memory);
    assert_eq!(wf.execution.file_wait().timeout, Duration::from_secs(60));
    let task = &wf.stage["only"].task[0];
    assert_eq!(task.cpu_req, 1);
    assert!(task.must_succeed);
    assert!(task.tags.is_empty());
    Ok(())
}

#[test]
fn rejects_invalid_workflows() {
    let empty = WorkflowBuilder::new().try_build();
    assert!(matches!(empty, Err(DrmflowError::ConfigError(_))));

    let unknown = WorkflowBuilder::new()
        .stage(StageBuilder::new("b").after("missing").task(TaskBuilder::new("b")))
        .try_build();
    assert!(matches!(unknown, Err(DrmflowError::ConfigError(_))));

    let itself = WorkflowBuilder::new()
        .stage(StageBuilder::new("b").after("b").task(TaskBuilder::new("b")))
        .try_build();
    assert!(matches!(itself, Err(DrmflowError::ConfigError(_))));

    let no_tasks = WorkflowBuilder::new()
        .stage(StageBuilder::new("empty"))
        .try_build();
    assert!(matches!(no_tasks, Err(DrmflowError::ConfigError(_))));

    let bad_store = parse_str(
        r#"
        [execution]
        store = "sqlite"
        "#,
    );
    assert!(matches!(bad_store, Err(DrmflowError::TomlError(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/definitely/not/here/Drmflow.toml").unwrap_err();
    assert!(matches!(err, DrmflowError::IoError(_)));
}
