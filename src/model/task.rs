// src/model/task.rs

//! The unit of schedulable work.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fs::{FileSystem, read_artifact};
use crate::model::usage::{Profile, ResourceUsage};
use crate::types::{StageId, TaskId, TaskStatus, Tags, format_tags};

pub const PROFILE_FILE: &str = "profile.json";
pub const COMMAND_SCRIPT_FILE: &str = "command.bash";
pub const STDOUT_FILE: &str = "stdout.txt";
pub const STDERR_FILE: &str = "stderr.txt";

/// Everything a caller supplies when adding a task to a stage.
///
/// Lifecycle fields (status, attempt, timestamps) are not part of this: they
/// start at their initial values and only the status-change dispatcher moves
/// them afterwards.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub tags: Tags,
    pub cmd: Option<String>,
    pub mem_req: Option<u64>,
    pub cpu_req: u32,
    pub time_req: Option<u64>,
    pub must_succeed: bool,
    pub noop: bool,
    /// Backend identifier; falls back to the execution default.
    pub drm: Option<String>,
    pub drm_native_specification: Option<String>,
}

impl Default for NewTask {
    fn default() -> Self {
        Self {
            tags: Tags::new(),
            cmd: None,
            mem_req: None,
            cpu_req: 1,
            time_req: None,
            must_succeed: true,
            noop: false,
            drm: None,
            drm_native_specification: None,
        }
    }
}

impl NewTask {
    pub fn command(cmd: impl Into<String>) -> Self {
        Self {
            cmd: Some(cmd.into()),
            ..Self::default()
        }
    }

    pub fn noop() -> Self {
        Self {
            noop: true,
            ..Self::default()
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn must_succeed(mut self, must_succeed: bool) -> Self {
        self.must_succeed = must_succeed;
        self
    }

    pub fn resources(mut self, mem_req: Option<u64>, cpu_req: u32, time_req: Option<u64>) -> Self {
        self.mem_req = mem_req;
        self.cpu_req = cpu_req;
        self.time_req = time_req;
        self
    }
}

/// A job that gets submitted to a backend. Tags are unique within its stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    stage: StageId,
    stage_name: String,
    tags: Tags,
    cmd: Option<String>,
    mem_req: Option<u64>,
    cpu_req: u32,
    time_req: Option<u64>,
    noop: bool,
    must_succeed: bool,

    drm: String,
    drm_job_id: Option<String>,
    drm_native_specification: Option<String>,

    log_dir: PathBuf,
    output_dir: PathBuf,

    status: TaskStatus,
    attempt: u32,
    successful: bool,
    started_on: Option<DateTime<Utc>>,
    submitted_on: Option<DateTime<Utc>>,
    finished_on: Option<DateTime<Utc>>,

    usage: ResourceUsage,

    /// Parsed profile report and the attempt it belongs to.
    #[serde(skip)]
    profile: Option<(u32, Profile)>,
}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        stage: StageId,
        stage_name: &str,
        new_task: NewTask,
        default_drm: &str,
        log_dir: PathBuf,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            id,
            stage,
            stage_name: stage_name.to_string(),
            tags: new_task.tags,
            cmd: new_task.cmd,
            mem_req: new_task.mem_req,
            cpu_req: new_task.cpu_req,
            time_req: new_task.time_req,
            noop: new_task.noop,
            must_succeed: new_task.must_succeed,
            drm: new_task.drm.unwrap_or_else(|| default_drm.to_string()),
            drm_job_id: None,
            drm_native_specification: new_task.drm_native_specification,
            log_dir,
            output_dir,
            status: TaskStatus::NoAttempt,
            attempt: 1,
            successful: false,
            started_on: None,
            submitted_on: None,
            finished_on: None,
            usage: ResourceUsage::default(),
            profile: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn stage(&self) -> StageId {
        self.stage
    }

    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn cmd(&self) -> Option<&str> {
        self.cmd.as_deref()
    }

    pub fn mem_req(&self) -> Option<u64> {
        self.mem_req
    }

    pub fn cpu_req(&self) -> u32 {
        self.cpu_req
    }

    pub fn time_req(&self) -> Option<u64> {
        self.time_req
    }

    /// No-op tasks are never really executed and report no profile.
    pub fn is_noop(&self) -> bool {
        self.noop
    }

    pub fn must_succeed(&self) -> bool {
        self.must_succeed
    }

    pub fn drm(&self) -> &str {
        &self.drm
    }

    pub fn drm_job_id(&self) -> Option<&str> {
        self.drm_job_id.as_deref()
    }

    pub fn drm_native_specification(&self) -> Option<&str> {
        self.drm_native_specification.as_deref()
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn successful(&self) -> bool {
        self.successful
    }

    pub fn started_on(&self) -> Option<DateTime<Utc>> {
        self.started_on
    }

    pub fn submitted_on(&self) -> Option<DateTime<Utc>> {
        self.submitted_on
    }

    pub fn finished_on(&self) -> Option<DateTime<Utc>> {
        self.finished_on
    }

    pub fn usage(&self) -> &ResourceUsage {
        &self.usage
    }

    pub fn finished(&self) -> bool {
        matches!(self.status, TaskStatus::Successful | TaskStatus::Failed)
    }

    /// A failure that was recorded but must not fail the stage.
    pub fn is_tolerated_failure(&self) -> bool {
        self.status == TaskStatus::Failed && !self.must_succeed
    }

    /// Failed for good while being required to succeed.
    pub fn is_fatal_failure(&self) -> bool {
        self.status == TaskStatus::Failed && self.must_succeed
    }

    /// Children may be submitted once every parent is resolved.
    pub fn resolves_dependents(&self) -> bool {
        self.successful || self.is_tolerated_failure()
    }

    fn attempt_path(&self, file_name: &str) -> PathBuf {
        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{ext}")),
            None => (file_name, String::new()),
        };
        self.log_dir
            .join(format!("{stem}_attempt{}{ext}", self.attempt))
    }

    pub fn output_profile_path(&self) -> PathBuf {
        self.attempt_path(PROFILE_FILE)
    }

    pub fn output_command_script_path(&self) -> PathBuf {
        self.attempt_path(COMMAND_SCRIPT_FILE)
    }

    pub fn output_stdout_path(&self) -> PathBuf {
        self.attempt_path(STDOUT_FILE)
    }

    pub fn output_stderr_path(&self) -> PathBuf {
        self.attempt_path(STDERR_FILE)
    }

    /// Label used for graph rendering and dry-run output.
    pub fn label(&self) -> String {
        if self.tags.is_empty() {
            format!("[{}] {}", self.id, self.stage_name)
        } else {
            format!("[{}] {} {}", self.id, self.stage_name, format_tags(&self.tags))
        }
    }

    /// Full failure report for the current attempt: command, stdout, stderr.
    pub fn failure_report(&self, fs: &dyn FileSystem) -> String {
        let command_path = self.output_command_script_path();
        let stdout_path = self.output_stdout_path();
        let stderr_path = self.output_stderr_path();
        format!(
            "Failure Info:\n\
             <COMMAND path={} drm_jobID={}>\n{}\n</COMMAND>\n\
             <STDOUT path={}>\n{}\n</STDOUT>\n\
             <STDERR path={}>\n{}\n</STDERR>\n\
             Failed Task.output_dir: {}",
            command_path.display(),
            self.drm_job_id.as_deref().unwrap_or("none"),
            read_artifact(fs, &command_path),
            stdout_path.display(),
            read_artifact(fs, &stdout_path),
            stderr_path.display(),
            read_artifact(fs, &stderr_path),
            self.output_dir.display(),
        )
    }

    pub(crate) fn cached_profile(&self) -> Option<&Profile> {
        match &self.profile {
            Some((attempt, profile)) if *attempt == self.attempt => Some(profile),
            _ => None,
        }
    }

    pub(crate) fn cache_profile(&mut self, profile: Profile) {
        self.profile = Some((self.attempt, profile));
    }

    pub(crate) fn usage_mut(&mut self) -> &mut ResourceUsage {
        &mut self.usage
    }

    pub(crate) fn set_status_field(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub(crate) fn set_started_on(&mut self, at: DateTime<Utc>) {
        self.started_on = Some(at);
    }

    pub(crate) fn set_submitted_on(&mut self, at: DateTime<Utc>) {
        self.submitted_on = Some(at);
    }

    pub(crate) fn mark_successful(&mut self, at: DateTime<Utc>) {
        self.successful = true;
        self.finished_on = Some(at);
    }

    pub(crate) fn mark_finished(&mut self, at: DateTime<Utc>) {
        self.finished_on = Some(at);
    }

    pub(crate) fn bump_attempt(&mut self) {
        self.attempt += 1;
    }

    pub(crate) fn set_must_succeed(&mut self, must_succeed: bool) {
        self.must_succeed = must_succeed;
    }

    pub(crate) fn record_job(&mut self, job_id: String, native_specification: Option<String>) {
        self.drm_job_id = Some(job_id);
        if native_specification.is_some() {
            self.drm_native_specification = native_specification;
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Task[{}] {} {{{}}}>",
            self.id,
            self.stage_name,
            format_tags(&self.tags)
        )
    }
}
