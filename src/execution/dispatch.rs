// src/execution/dispatch.rs

//! Side effects of task status changes.
//!
//! [`Execution::transition`] calls [`Execution::on_status_change`] exactly
//! once for every applied change. Nothing else sets timestamps, bumps
//! attempts or touches stage status.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::Execution;
use crate::errors::{DrmflowError, Result};
use crate::fs::wait_for_file;
use crate::types::{StageId, StageStatus, TaskId, TaskStatus};

impl Execution {
    pub(crate) fn on_status_change(&mut self, id: TaskId, depth: u8) -> Result<()> {
        debug_assert!(depth <= 1, "status change nested {depth} levels deep");

        let now = Utc::now();
        let status = self.task_ref(id)?.status();

        match status {
            TaskStatus::NoAttempt => {}
            TaskStatus::Waiting => {
                self.task_mut(id)?.set_started_on(now);
            }
            TaskStatus::Submitted => {
                let task = self.task_mut(id)?;
                task.set_submitted_on(now);
                if !task.is_noop() {
                    info!(
                        task = %task,
                        drm = task.drm(),
                        job_id = task.drm_job_id().unwrap_or("none"),
                        "submitted"
                    );
                }
                let stage = task.stage();
                self.set_stage_status(stage, StageStatus::Running)?;
            }
            TaskStatus::Successful => {
                let task = self.task_mut(id)?;
                task.mark_successful(now);
                if !task.is_noop() {
                    info!(task = %task, attempt = task.attempt(), "successful");
                }
                let stage = task.stage();
                if self.stage_tasks_resolved(stage) {
                    self.set_stage_status(stage, StageStatus::Successful)?;
                }
            }
            TaskStatus::Failed => return self.on_failure(id, depth),
        }

        self.save_task(id)
    }

    /// Retry policy for a task that just moved to `failed`.
    fn on_failure(&mut self, id: TaskId, depth: u8) -> Result<()> {
        let max_attempts = self.settings.max_attempts;
        let failure_wait = self.settings.failure_wait;
        let now = Utc::now();
        let task = self.task_ref(id)?;

        if !task.must_succeed() {
            warn!(
                task = %task,
                attempt = task.attempt(),
                "failed, but must_succeed is false\n{}",
                task.failure_report(self.fs.as_ref())
            );
            self.task_mut(id)?.mark_finished(now);
            return self.save_task(id);
        }

        if task.attempt() < max_attempts {
            warn!(
                task = %task,
                attempt = task.attempt(),
                max_attempts,
                "failed, will retry\n{}",
                task.failure_report(self.fs.as_ref())
            );
            self.task_mut(id)?.bump_attempt();
            // Lands on NoAttempt, which has no further side effects.
            self.transition(id, TaskStatus::NoAttempt, depth + 1)?;
            return self.save_task(id);
        }

        let stderr_path = task.output_stderr_path();
        if !wait_for_file(self.fs.as_ref(), &stderr_path, failure_wait) {
            debug!(task = %id, path = ?stderr_path, "stderr never appeared");
        }

        let task = self.task_ref(id)?;
        error!(
            task = %task,
            attempt = task.attempt(),
            max_attempts,
            "failed after all attempts\n{}",
            task.failure_report(self.fs.as_ref())
        );
        let task = self.task_mut(id)?;
        task.mark_finished(now);
        let stage = task.stage();
        self.set_stage_status(stage, StageStatus::Failed)?;
        self.save_task(id)
    }

    /// Whether every task of `stage` is either successful or allowed to fail.
    ///
    /// Tasks allowed to fail count as resolved even while still running.
    fn stage_tasks_resolved(&self, stage: StageId) -> bool {
        self.tasks_of_stage(stage)
            .all(|t| t.successful() || !t.must_succeed())
    }

    /// Move a stage forward. Successful and failed stages never change again.
    fn set_stage_status(&mut self, id: StageId, status: StageStatus) -> Result<()> {
        let Some(stage) = self.stages.get_mut(id.0) else {
            return Ok(());
        };
        if stage.status() == status || stage.status().is_terminal() {
            return Ok(());
        }

        match status {
            StageStatus::Successful => info!(stage = stage.name(), "stage successful"),
            StageStatus::Failed => error!(stage = stage.name(), "stage failed"),
            _ => debug!(stage = stage.name(), %status, "stage status changed"),
        }
        stage.set_status_field(status);
        self.store.save_stage(stage)
    }

    pub(super) fn save_task(&mut self, id: TaskId) -> Result<()> {
        let task = self.tasks.get(&id).ok_or(DrmflowError::TaskNotFound(id))?;
        self.store.save_task(task)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::execution::{Execution, ExecutionSettings};
    use crate::fs::FileWait;
    use crate::fs::mock::MockFileSystem;
    use crate::model::NewTask;
    use crate::types::{StageStatus, TaskStatus};

    fn execution(max_attempts: u32) -> (Execution, MockFileSystem) {
        let fs = MockFileSystem::new();
        let quick = FileWait::new(Duration::from_millis(20), Duration::from_millis(5));
        let settings = ExecutionSettings {
            max_attempts,
            log_root: PathBuf::from("/log"),
            output_root: PathBuf::from("/out"),
            failure_wait: quick,
            profile_wait: quick,
            ..ExecutionSettings::default()
        };
        (Execution::in_memory(settings, Arc::new(fs.clone())), fs)
    }

    #[test]
    fn waiting_and_submitted_stamp_their_times() {
        let (mut ex, _) = execution(1);
        let s = ex.add_stage("s").unwrap();
        let t = ex.add_task(s, NewTask::command("true")).unwrap();

        ex.set_status(t, TaskStatus::Waiting).unwrap();
        assert!(ex.task(t).unwrap().started_on().is_some());
        assert!(ex.task(t).unwrap().submitted_on().is_none());
        assert_eq!(ex.stage(s).unwrap().status(), StageStatus::NoAttempt);

        ex.set_status(t, TaskStatus::Submitted).unwrap();
        assert!(ex.task(t).unwrap().submitted_on().is_some());
        assert!(ex.task(t).unwrap().finished_on().is_none());
        assert_eq!(ex.stage(s).unwrap().status(), StageStatus::Running);
    }

    #[test]
    fn repeated_status_is_a_no_op() {
        let (mut ex, _) = execution(1);
        let s = ex.add_stage("s").unwrap();
        let t = ex.add_task(s, NewTask::command("true")).unwrap();

        assert!(ex.set_status(t, TaskStatus::Waiting).unwrap());
        let started = ex.task(t).unwrap().started_on();
        assert!(!ex.set_status(t, TaskStatus::Waiting).unwrap());

        assert_eq!(ex.task(t).unwrap().started_on(), started);
        assert_eq!(ex.history().len(), 1);
    }

    #[test]
    fn successful_tasks_never_leave_successful() {
        let (mut ex, _) = execution(3);
        let s = ex.add_stage("s").unwrap();
        let t = ex.add_task(s, NewTask::command("true")).unwrap();
        ex.set_status(t, TaskStatus::Submitted).unwrap();
        ex.set_status(t, TaskStatus::Successful).unwrap();
        let finished = ex.task(t).unwrap().finished_on();

        assert!(!ex.set_status(t, TaskStatus::Failed).unwrap());
        assert!(!ex.set_status(t, TaskStatus::NoAttempt).unwrap());

        let task = ex.task(t).unwrap();
        assert_eq!(task.status(), TaskStatus::Successful);
        assert_eq!(task.attempt(), 1);
        assert_eq!(task.finished_on(), finished);
        assert!(ex.ready_tasks().is_empty());
        assert_eq!(ex.stage(s).unwrap().status(), StageStatus::Successful);
        assert_eq!(ex.history().len(), 2);
    }

    #[test]
    fn final_failure_is_not_reopened() {
        let (mut ex, _) = execution(1);
        let s = ex.add_stage("s").unwrap();
        let t = ex.add_task(s, NewTask::command("false")).unwrap();
        ex.set_status(t, TaskStatus::Submitted).unwrap();
        ex.set_status(t, TaskStatus::Failed).unwrap();

        assert!(!ex.set_status(t, TaskStatus::NoAttempt).unwrap());
        assert!(!ex.set_status(t, TaskStatus::Waiting).unwrap());

        let task = ex.task(t).unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert!(task.finished_on().is_some());
        assert!(ex.ready_tasks().is_empty());
        assert_eq!(ex.stage(s).unwrap().status(), StageStatus::Failed);
    }

    #[test]
    fn tolerated_failure_is_final_too() {
        let (mut ex, _) = execution(3);
        let s = ex.add_stage("s").unwrap();
        let t = ex
            .add_task(s, NewTask::command("x").must_succeed(false))
            .unwrap();
        ex.set_status(t, TaskStatus::Failed).unwrap();

        assert!(!ex.set_status(t, TaskStatus::Submitted).unwrap());
        assert_eq!(ex.task(t).unwrap().status(), TaskStatus::Failed);
        assert_eq!(ex.task(t).unwrap().attempt(), 1);
    }

    #[test]
    fn retry_goes_through_the_transition_once() {
        let (mut ex, _) = execution(2);
        let s = ex.add_stage("s").unwrap();
        let t = ex.add_task(s, NewTask::command("false")).unwrap();

        ex.set_status(t, TaskStatus::Failed).unwrap();

        let task = ex.task(t).unwrap();
        assert_eq!(task.status(), TaskStatus::NoAttempt);
        assert_eq!(task.attempt(), 2);
        assert!(task.finished_on().is_none());

        let tail: Vec<_> = ex.history().iter().map(|c| (c.from, c.to)).collect();
        assert_eq!(
            tail,
            vec![
                (TaskStatus::NoAttempt, TaskStatus::Failed),
                (TaskStatus::Failed, TaskStatus::NoAttempt),
            ]
        );
        assert_eq!(ex.ready_tasks(), vec![t]);
    }

    #[test]
    fn exhausted_attempts_fail_the_stage() {
        let (mut ex, fs) = execution(1);
        let s = ex.add_stage("s").unwrap();
        let t = ex.add_task(s, NewTask::command("false")).unwrap();
        fs.add_file(ex.task(t).unwrap().output_stderr_path(), "boom");

        ex.set_status(t, TaskStatus::Waiting).unwrap();
        ex.set_status(t, TaskStatus::Submitted).unwrap();
        ex.set_status(t, TaskStatus::Failed).unwrap();

        let task = ex.task(t).unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert!(task.finished_on().is_some());
        assert!(!task.successful());
        assert_eq!(ex.stage(s).unwrap().status(), StageStatus::Failed);
    }

    #[test]
    fn missing_stderr_does_not_block_final_failure() {
        let (mut ex, _) = execution(1);
        let s = ex.add_stage("s").unwrap();
        let t = ex.add_task(s, NewTask::command("false")).unwrap();

        ex.set_status(t, TaskStatus::Failed).unwrap();

        assert_eq!(ex.stage(s).unwrap().status(), StageStatus::Failed);
    }

    #[test]
    fn terminal_stages_never_move() {
        let (mut ex, _) = execution(1);
        let s = ex.add_stage("s").unwrap();
        let a = ex.add_task(s, NewTask::command("a").tag("n", "a")).unwrap();
        let b = ex.add_task(s, NewTask::command("b").tag("n", "b")).unwrap();

        ex.set_status(a, TaskStatus::Failed).unwrap();
        assert_eq!(ex.stage(s).unwrap().status(), StageStatus::Failed);

        ex.set_status(b, TaskStatus::Submitted).unwrap();
        ex.set_status(b, TaskStatus::Successful).unwrap();
        assert_eq!(ex.stage(s).unwrap().status(), StageStatus::Failed);
    }

    #[test]
    fn stage_succeeds_on_last_required_task() {
        let (mut ex, _) = execution(1);
        let s = ex.add_stage("s").unwrap();
        let a = ex.add_task(s, NewTask::command("a").tag("n", "a")).unwrap();
        let b = ex.add_task(s, NewTask::command("b").tag("n", "b")).unwrap();
        let optional = ex
            .add_task(s, NewTask::command("c").tag("n", "c").must_succeed(false))
            .unwrap();

        for t in [a, b, optional] {
            ex.set_status(t, TaskStatus::Submitted).unwrap();
        }
        ex.set_status(a, TaskStatus::Successful).unwrap();
        assert_eq!(ex.stage(s).unwrap().status(), StageStatus::Running);

        ex.set_status(b, TaskStatus::Successful).unwrap();
        assert_eq!(ex.stage(s).unwrap().status(), StageStatus::Successful);
        assert_eq!(ex.task(optional).unwrap().status(), TaskStatus::Submitted);
    }
}
