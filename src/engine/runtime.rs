// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tokio::task::block_in_place;
use tracing::{debug, info};

use crate::errors::{DrmflowError, Result};
use crate::exec::{DrmBackend, ScheduledTask};
use crate::execution::Execution;

use super::core::CoreRuntime;
use super::{CoreCommand, CoreStep, RuntimeEvent};

/// Async shell around [`CoreRuntime`].
///
/// Reads events from the channel, feeds them to the core and submits the
/// tasks the core hands back to a [`DrmBackend`]. Core steps may block on the
/// bounded file wait, so they run under `block_in_place`; this requires the
/// multi-threaded Tokio runtime.
pub struct Runtime<B: DrmBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    backend: B,
}

impl<B: DrmBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

impl<B: DrmBackend> Runtime<B> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, backend: B) -> Self {
        Self {
            core,
            event_rx,
            backend,
        }
    }

    /// Run until the execution is idle, shutdown is requested or the event
    /// channel closes. Returns the execution in its final state.
    pub async fn run(mut self) -> Result<Execution> {
        info!(
            execution = %self.core.execution().name(),
            backend = self.backend.name(),
            "runtime started"
        );

        let step = block_in_place(|| self.core.start())?;
        let mut keep_running = self.apply(step).await?;

        while keep_running {
            let Some(event) = self.event_rx.recv().await else {
                info!("runtime event channel closed; exiting");
                break;
            };
            debug!(?event, "runtime received event");

            let step = block_in_place(|| self.core.step(event))?;
            keep_running = self.apply(step).await?;
        }

        info!("runtime exiting");
        Ok(self.core.into_execution())
    }

    async fn apply(&mut self, step: CoreStep) -> Result<bool> {
        for command in step.commands {
            match command {
                CoreCommand::Submit(tasks) => self.submit_all(tasks).await?,
                CoreCommand::RequestExit => debug!("core issued RequestExit"),
            }
        }
        Ok(step.keep_running)
    }

    async fn submit_all(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        for task in tasks {
            let id = task.id;
            let label = task.label.clone();
            let handle = self.backend.submit(task).await.map_err(|e| match e {
                DrmflowError::Submission { .. } => e,
                other => DrmflowError::Submission {
                    task: id,
                    reason: other.to_string(),
                },
            })?;
            debug!(task = %label, job_id = %handle.job_id, "backend accepted job");
            self.core.record_submission(id, handle)?;
        }
        Ok(())
    }
}
