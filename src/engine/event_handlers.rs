// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, info, warn};

use crate::engine::{RuntimeOptions, TaskOutcome};
use crate::errors::Result;
use crate::exec::ScheduledTask;
use crate::execution::Execution;
use crate::types::{TaskId, TaskStatus};

/// Command produced by the core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand these tasks to the backend. They are already `waiting`.
    Submit(Vec<ScheduledTask>),
    /// Nothing left to do; the shell should stop.
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    pub keep_running: bool,
}

impl CoreStep {
    fn exit() -> Self {
        Self {
            commands: vec![CoreCommand::RequestExit],
            keep_running: false,
        }
    }
}

/// Handle a job outcome reported by a backend.
///
/// Completions for tasks that are not `submitted` are stale (a cancelled
/// task, or an attempt that was already resolved) and are ignored.
pub fn handle_task_completion(
    execution: &mut Execution,
    options: &RuntimeOptions,
    task: TaskId,
    outcome: TaskOutcome,
) -> Result<CoreStep> {
    let live = match execution.task(task) {
        None => {
            warn!(%task, ?outcome, "completion for unknown task; ignoring");
            false
        }
        Some(t) if t.status() != TaskStatus::Submitted => {
            warn!(task = %t, status = %t.status(), ?outcome, "stale completion; ignoring");
            false
        }
        Some(_) => true,
    };

    if live {
        let counters = execution.update_from_profile_output(task)?;
        debug!(%task, counters, ?outcome, "profile ingested");
        let status = match outcome {
            TaskOutcome::Success => TaskStatus::Successful,
            TaskOutcome::Failed(code) => {
                debug!(%task, exit_code = code, "job failed");
                TaskStatus::Failed
            }
        };
        execution.set_status(task, status)?;
    }
    schedule(execution, options)
}

pub fn handle_cancel(
    execution: &mut Execution,
    options: &RuntimeOptions,
    task: TaskId,
) -> Result<CoreStep> {
    if execution.task(task).is_some() {
        execution.cancel(task)?;
    } else {
        warn!(%task, "cancel for unknown task; ignoring");
    }
    schedule(execution, options)
}

/// Move every ready task to `waiting` and ask the shell to submit it, or
/// request exit when the execution can make no further progress.
pub fn schedule(execution: &mut Execution, options: &RuntimeOptions) -> Result<CoreStep> {
    let halted = options.fail_fast && execution.has_failed_stage();

    let mut batch = Vec::new();
    if !halted {
        for id in execution.ready_tasks() {
            execution.set_status(id, TaskStatus::Waiting)?;
            if let Some(task) = execution.task(id) {
                batch.push(ScheduledTask::from_task(task));
            }
        }
    }

    if !batch.is_empty() {
        debug!(count = batch.len(), "submitting ready tasks");
        return Ok(CoreStep {
            commands: vec![CoreCommand::Submit(batch)],
            keep_running: true,
        });
    }

    if execution.in_flight() > 0 {
        return Ok(CoreStep {
            commands: Vec::new(),
            keep_running: true,
        });
    }

    report_idle(execution, halted);
    Ok(CoreStep::exit())
}

pub fn handle_shutdown(execution: &Execution) -> CoreStep {
    info!(
        in_flight = execution.in_flight(),
        "shutdown requested; abandoning in-flight tasks"
    );
    CoreStep::exit()
}

fn report_idle(execution: &Execution, halted: bool) {
    let blocked = execution.blocked_tasks();
    if !blocked.is_empty() {
        let labels: Vec<String> = blocked
            .iter()
            .filter_map(|id| execution.task(*id).map(|t| t.label()))
            .collect();
        warn!(count = blocked.len(), ?labels, "tasks blocked by failed dependencies");
    }

    let unstarted = execution
        .tasks()
        .filter(|t| t.status() == TaskStatus::NoAttempt)
        .count();
    if halted && unstarted > 0 {
        warn!(unstarted, "fail_fast: stopped submitting after a stage failed");
    }

    info!(
        execution = %execution.name(),
        failed_stage = execution.has_failed_stage(),
        "execution idle"
    );
}
