// src/exec/job.rs

//! Types exchanged between the core and a backend.

use std::path::PathBuf;

use crate::model::Task;
use crate::types::{TaskId, Tags};

/// Description of a task the core wants a backend to run now.
///
/// Carries everything a backend needs so it never has to reach back into the
/// execution while the job is in flight.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub label: String,
    pub stage: String,
    pub tags: Tags,
    pub cmd: Option<String>,
    pub noop: bool,
    pub attempt: u32,
    pub mem_req: Option<u64>,
    pub cpu_req: u32,
    pub time_req: Option<u64>,
    pub drm: String,
    pub drm_native_specification: Option<String>,
    pub log_dir: PathBuf,
    pub output_dir: PathBuf,
    pub command_script_path: PathBuf,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub profile_path: PathBuf,
}

impl ScheduledTask {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id(),
            label: task.label(),
            stage: task.stage_name().to_string(),
            tags: task.tags().clone(),
            cmd: task.cmd().map(str::to_string),
            noop: task.is_noop(),
            attempt: task.attempt(),
            mem_req: task.mem_req(),
            cpu_req: task.cpu_req(),
            time_req: task.time_req(),
            drm: task.drm().to_string(),
            drm_native_specification: task.drm_native_specification().map(str::to_string),
            log_dir: task.log_dir().to_path_buf(),
            output_dir: task.output_dir().to_path_buf(),
            command_script_path: task.output_command_script_path(),
            stdout_path: task.output_stdout_path(),
            stderr_path: task.output_stderr_path(),
            profile_path: task.output_profile_path(),
        }
    }
}

/// What a backend hands back after accepting a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
    /// Backend-specific submission hints actually used, if any.
    pub native_specification: Option<String>,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            native_specification: None,
        }
    }
}
