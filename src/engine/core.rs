// src/engine/core.rs

//! Synchronous core of the run loop.
//!
//! [`CoreRuntime`] owns the [`Execution`] and consumes [`RuntimeEvent`]s one
//! at a time, producing [`CoreCommand`]s for the IO shell
//! (`engine::runtime::Runtime`). Because every event goes through this single
//! owner, all task and stage transitions are serialized.
//!
//! The core has no channels or Tokio types, so it can be driven directly in
//! tests.

use tracing::debug;

use crate::engine::event_handlers::{
    CoreStep, handle_cancel, handle_shutdown, handle_task_completion, schedule,
};
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::errors::Result;
use crate::exec::JobHandle;
use crate::execution::Execution;
use crate::types::TaskId;

#[derive(Debug)]
pub struct CoreRuntime {
    execution: Execution,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(execution: Execution, options: RuntimeOptions) -> Self {
        Self { execution, options }
    }

    /// Submit the initial ready set.
    pub fn start(&mut self) -> Result<CoreStep> {
        debug!(tasks = self.execution.tasks().count(), "core runtime starting");
        schedule(&mut self.execution, &self.options)
    }

    /// Handle a single event and return the resulting commands.
    pub fn step(&mut self, event: RuntimeEvent) -> Result<CoreStep> {
        match event {
            RuntimeEvent::TaskCompleted { task, outcome } => {
                handle_task_completion(&mut self.execution, &self.options, task, outcome)
            }
            RuntimeEvent::CancelRequested { task } => {
                handle_cancel(&mut self.execution, &self.options, task)
            }
            RuntimeEvent::ShutdownRequested => Ok(handle_shutdown(&self.execution)),
        }
    }

    /// A backend accepted `task`.
    pub fn record_submission(&mut self, task: TaskId, handle: JobHandle) -> Result<()> {
        self.execution.record_submission(task, handle)
    }

    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    pub fn into_execution(self) -> Execution {
        self.execution
    }
}
