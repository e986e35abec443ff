// tests/stage_aggregation.rs

mod common;
use crate::common::{execution, from_workflow, init_tracing, task_by_tag};

use drmflow::model::NewTask;
use drmflow::types::{StageStatus, TaskStatus};
use drmflow_test_utils::builders::{StageBuilder, TaskBuilder, WorkflowBuilder};

#[test]
fn stage_is_running_after_first_submission() {
    init_tracing();
    let (mut ex, _fs) = execution(1);
    let s = ex.add_stage("align").unwrap();
    let a = ex.add_task(s, NewTask::command("a").tag("n", "a")).unwrap();
    ex.add_task(s, NewTask::command("b").tag("n", "b")).unwrap();

    assert_eq!(ex.stage(s).unwrap().status(), StageStatus::NoAttempt);
    ex.set_status(a, TaskStatus::Waiting).unwrap();
    assert_eq!(ex.stage(s).unwrap().status(), StageStatus::NoAttempt);
    ex.set_status(a, TaskStatus::Submitted).unwrap();
    assert_eq!(ex.stage(s).unwrap().status(), StageStatus::Running);
}

#[test]
fn optional_tasks_do_not_hold_a_stage_back() {
    init_tracing();
    let wf = WorkflowBuilder::new()
        .stage(
            StageBuilder::new("qc")
                .task(TaskBuilder::new("required").tag("n", "1"))
                .task(TaskBuilder::new("optional").tag("n", "2").must_succeed(false)),
        )
        .build();
    let (mut ex, _fs) = from_workflow(&wf);
    let required = task_by_tag(&ex, "qc", "n", "1");

    ex.set_status(required, TaskStatus::Submitted).unwrap();
    ex.set_status(required, TaskStatus::Successful).unwrap();

    let stage = ex.stage_by_name("qc").unwrap();
    assert_eq!(stage.status(), StageStatus::Successful);
}

#[test]
fn failed_stage_stays_failed_when_siblings_succeed() {
    init_tracing();
    let (mut ex, _fs) = execution(1);
    let s = ex.add_stage("call").unwrap();
    let bad = ex.add_task(s, NewTask::command("bad").tag("n", "1")).unwrap();
    let good = ex.add_task(s, NewTask::command("good").tag("n", "2")).unwrap();

    ex.set_status(bad, TaskStatus::Submitted).unwrap();
    ex.set_status(good, TaskStatus::Submitted).unwrap();
    ex.set_status(bad, TaskStatus::Failed).unwrap();
    ex.set_status(good, TaskStatus::Successful).unwrap();

    assert_eq!(ex.stage(s).unwrap().status(), StageStatus::Failed);
    assert!(ex.has_failed_stage());
}

#[test]
fn successful_stage_is_terminal() {
    init_tracing();
    let (mut ex, _fs) = execution(1);
    let s = ex.add_stage("call").unwrap();
    let required = ex.add_task(s, NewTask::command("r").tag("n", "1")).unwrap();
    let optional = ex
        .add_task(s, NewTask::command("o").tag("n", "2").must_succeed(false))
        .unwrap();

    ex.set_status(required, TaskStatus::Submitted).unwrap();
    ex.set_status(optional, TaskStatus::Submitted).unwrap();
    ex.set_status(required, TaskStatus::Successful).unwrap();
    assert_eq!(ex.stage(s).unwrap().status(), StageStatus::Successful);

    // A late tolerated failure changes nothing.
    ex.set_status(optional, TaskStatus::Failed).unwrap();
    assert_eq!(ex.stage(s).unwrap().status(), StageStatus::Successful);
}
