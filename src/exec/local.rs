// src/exec/local.rs

//! Local process backend.

use std::fs::File;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Instant;

use anyhow::{Context, anyhow};
use serde_json::json;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::{DrmflowError, Result};
use crate::exec::{DrmBackend, JobHandle, ScheduledTask};

/// Runs each job as `sh <command script>` on this machine.
///
/// Per attempt it writes the command script, captures stdout and stderr to
/// their attempt files and, once the process exits, writes a profile report
/// with `exit_status` and `wall_time` before reporting the outcome. No-op
/// tasks are reported successful straight away.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl LocalBackend {
    pub const NAME: &'static str = "local";

    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { runtime_tx }
    }
}

impl DrmBackend for LocalBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn submit(
        &mut self,
        task: ScheduledTask,
    ) -> Pin<Box<dyn Future<Output = Result<JobHandle>> + Send + '_>> {
        let runtime_tx = self.runtime_tx.clone();

        Box::pin(async move {
            if task.drm != Self::NAME {
                warn!(task = %task.label, drm = %task.drm, "no such backend; running locally");
            }

            if task.noop {
                tokio::spawn(async move {
                    send_outcome(&runtime_tx, &task, TaskOutcome::Success).await;
                });
                return Ok(JobHandle::new("noop"));
            }

            let child = spawn_job(&task).await.map_err(|e| DrmflowError::Submission {
                task: task.id,
                reason: format!("{e:#}"),
            })?;
            let job_id = child
                .id()
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "unknown".to_string());

            tokio::spawn(wait_for_job(task, child, runtime_tx));
            Ok(JobHandle::new(job_id))
        })
    }
}

async fn spawn_job(task: &ScheduledTask) -> anyhow::Result<Child> {
    let cmd = task
        .cmd
        .as_deref()
        .ok_or_else(|| anyhow!("task {} has no command", task.label))?;

    tokio::fs::create_dir_all(&task.log_dir)
        .await
        .with_context(|| format!("creating log dir {:?}", task.log_dir))?;
    tokio::fs::create_dir_all(&task.output_dir)
        .await
        .with_context(|| format!("creating output dir {:?}", task.output_dir))?;

    let script = format!("#!/bin/sh\n{cmd}\n");
    tokio::fs::write(&task.command_script_path, script)
        .await
        .with_context(|| format!("writing command script {:?}", task.command_script_path))?;

    let stdout = File::create(&task.stdout_path)
        .with_context(|| format!("creating {:?}", task.stdout_path))?;
    let stderr = File::create(&task.stderr_path)
        .with_context(|| format!("creating {:?}", task.stderr_path))?;

    info!(
        task = %task.label,
        attempt = task.attempt,
        cmd = %cmd,
        "starting local job"
    );

    Command::new("sh")
        .arg(&task.command_script_path)
        .current_dir(&task.output_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()
        .with_context(|| format!("spawning process for task {}", task.label))
}

async fn wait_for_job(task: ScheduledTask, mut child: Child, runtime_tx: mpsc::Sender<RuntimeEvent>) {
    let started = Instant::now();

    let outcome = match child.wait().await {
        Ok(status) => {
            let code = status.code().unwrap_or(-1);
            debug!(
                task = %task.label,
                attempt = task.attempt,
                exit_code = code,
                "local job exited"
            );
            if status.success() {
                TaskOutcome::Success
            } else {
                TaskOutcome::Failed(code)
            }
        }
        Err(e) => {
            error!(task = %task.label, error = %e, "waiting for local job failed");
            TaskOutcome::Failed(-1)
        }
    };

    let exit_status = match outcome {
        TaskOutcome::Success => 0,
        TaskOutcome::Failed(code) => code,
    };
    let profile = json!({
        "exit_status": exit_status,
        "wall_time": started.elapsed().as_secs(),
    });
    if let Err(e) = tokio::fs::write(&task.profile_path, profile.to_string()).await {
        warn!(task = %task.label, path = ?task.profile_path, error = %e, "could not write profile report");
    }

    send_outcome(&runtime_tx, &task, outcome).await;
}

async fn send_outcome(runtime_tx: &mpsc::Sender<RuntimeEvent>, task: &ScheduledTask, outcome: TaskOutcome) {
    let event = RuntimeEvent::TaskCompleted {
        task: task.id,
        outcome,
    };
    if runtime_tx.send(event).await.is_err() {
        debug!(task = %task.label, "runtime gone; dropping job outcome");
    }
}
