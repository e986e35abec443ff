// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::execution::ExecutionSettings;
use crate::fs::FileWait;
use crate::model::NewTask;
use crate::types::{LinkMode, StoreMode, Tags};

/// Top-level workflow file as read from TOML.
///
/// ```toml
/// [execution]
/// name = "demo"
/// max_attempts = 3
///
/// [stage.align]
///
/// [[stage.align.task]]
/// cmd = "bwa mem ref.fa A.fq"
/// tags = { sample = "A" }
///
/// [stage.call]
/// after = ["align"]
/// link = "matching_tags"
///
/// [[stage.call.task]]
/// cmd = "call A.bam"
/// tags = { sample = "A" }
/// ```
///
/// Not validated yet; see [`WorkflowFile`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkflowFile {
    #[serde(default)]
    pub execution: ExecutionSection,

    /// Stages keyed by name.
    #[serde(default)]
    pub stage: BTreeMap<String, StageConfig>,
}

/// Validated workflow. Built with `WorkflowFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct WorkflowFile {
    pub execution: ExecutionSection,
    pub stage: BTreeMap<String, StageConfig>,
    /// Stage names, upstream stages first.
    order: Vec<String>,
}

impl WorkflowFile {
    pub(crate) fn new_unchecked(
        execution: ExecutionSection,
        stage: BTreeMap<String, StageConfig>,
        order: Vec<String>,
    ) -> Self {
        Self {
            execution,
            stage,
            order,
        }
    }

    /// Stages in dependency order.
    pub fn stages_in_order(&self) -> impl Iterator<Item = (&str, &StageConfig)> {
        self.order
            .iter()
            .filter_map(|name| self.stage.get(name).map(|s| (name.as_str(), s)))
    }

    pub fn task_count(&self) -> usize {
        self.stage.values().map(|s| s.task.len()).sum()
    }
}

/// `[execution]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSection {
    #[serde(default = "default_name")]
    pub name: String,

    /// Retry ceiling shared by every task.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Backend used by tasks that don't name one.
    #[serde(default = "default_drm")]
    pub drm: String,

    /// Bound for the stderr and profile waits.
    #[serde(default = "default_file_wait_timeout_secs")]
    pub file_wait_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub store: StoreMode,

    /// Stop submitting new work once a stage has failed.
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_name() -> String {
    "drmflow".to_string()
}

fn default_max_attempts() -> u32 {
    1
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("log")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_drm() -> String {
    "local".to_string()
}

fn default_file_wait_timeout_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_attempts: default_max_attempts(),
            log_dir: default_log_dir(),
            output_dir: default_output_dir(),
            drm: default_drm(),
            file_wait_timeout_secs: default_file_wait_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            store: StoreMode::default(),
            fail_fast: false,
        }
    }
}

impl ExecutionSection {
    pub fn file_wait(&self) -> FileWait {
        FileWait::new(
            Duration::from_secs(self.file_wait_timeout_secs),
            Duration::from_millis(self.poll_interval_ms.max(1)),
        )
    }

    pub fn settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            name: self.name.clone(),
            max_attempts: self.max_attempts,
            log_root: self.log_dir.clone(),
            output_root: self.output_dir.clone(),
            default_drm: self.drm.clone(),
            failure_wait: self.file_wait(),
            profile_wait: self.file_wait(),
        }
    }
}

/// `[stage.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageConfig {
    /// Upstream stages. Every task of this stage waits on them.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub link: LinkMode,

    /// `[[stage.<name>.task]]` entries.
    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

/// `[[stage.<name>.task]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Shell command. Required unless `noop = true`.
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default)]
    pub tags: Tags,

    /// Memory in MB.
    #[serde(default)]
    pub mem_req: Option<u64>,

    #[serde(default = "default_cpu_req")]
    pub cpu_req: u32,

    /// Wall time in minutes.
    #[serde(default)]
    pub time_req: Option<u64>,

    #[serde(default = "default_must_succeed")]
    pub must_succeed: bool,

    #[serde(default)]
    pub noop: bool,

    #[serde(default)]
    pub drm: Option<String>,

    #[serde(default)]
    pub drm_native_specification: Option<String>,
}

fn default_cpu_req() -> u32 {
    1
}

fn default_must_succeed() -> bool {
    true
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            cmd: None,
            tags: Tags::new(),
            mem_req: None,
            cpu_req: default_cpu_req(),
            time_req: None,
            must_succeed: default_must_succeed(),
            noop: false,
            drm: None,
            drm_native_specification: None,
        }
    }
}

impl TaskConfig {
    pub fn to_new_task(&self) -> NewTask {
        NewTask {
            tags: self.tags.clone(),
            cmd: self.cmd.clone(),
            mem_req: self.mem_req,
            cpu_req: self.cpu_req,
            time_req: self.time_req,
            must_succeed: self.must_succeed,
            noop: self.noop,
            drm: self.drm.clone(),
            drm_native_specification: self.drm_native_specification.clone(),
        }
    }
}
