// crates/test-utils/src/builders.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use drmflow::config::{ExecutionSection, RawWorkflowFile, StageConfig, TaskConfig, WorkflowFile};
use drmflow::errors::Result;
use drmflow::types::{LinkMode, StoreMode};

/// Builder for `WorkflowFile` to simplify test setup.
///
/// Defaults suit in-memory tests: memory store, file waits that give up
/// immediately, and log/output roots under `/drmflow-test`.
pub struct WorkflowBuilder {
    workflow: RawWorkflowFile,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        let execution = ExecutionSection {
            name: "test".to_string(),
            log_dir: PathBuf::from("/drmflow-test/log"),
            output_dir: PathBuf::from("/drmflow-test/output"),
            file_wait_timeout_secs: 0,
            poll_interval_ms: 1,
            ..ExecutionSection::default()
        };
        Self {
            workflow: RawWorkflowFile {
                execution,
                stage: BTreeMap::new(),
            },
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.workflow.execution.max_attempts = n;
        self
    }

    pub fn fail_fast(mut self, val: bool) -> Self {
        self.workflow.execution.fail_fast = val;
        self
    }

    pub fn dirs(mut self, log_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        self.workflow.execution.log_dir = log_dir.into();
        self.workflow.execution.output_dir = output_dir.into();
        self
    }

    pub fn file_wait_secs(mut self, secs: u64) -> Self {
        self.workflow.execution.file_wait_timeout_secs = secs;
        self
    }

    pub fn file_store(mut self) -> Self {
        self.workflow.execution.store = StoreMode::File;
        self
    }

    pub fn stage(mut self, stage: StageBuilder) -> Self {
        self.workflow.stage.insert(stage.name, stage.stage);
        self
    }

    pub fn raw(self) -> RawWorkflowFile {
        self.workflow
    }

    pub fn try_build(self) -> Result<WorkflowFile> {
        WorkflowFile::try_from(self.workflow)
    }

    pub fn build(self) -> WorkflowFile {
        self.try_build()
            .expect("Failed to build valid workflow from builder")
    }
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one `[stage.<name>]` section.
pub struct StageBuilder {
    name: String,
    stage: StageConfig,
}

impl StageBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stage: StageConfig::default(),
        }
    }

    pub fn after(mut self, upstream: &str) -> Self {
        self.stage.after.push(upstream.to_string());
        self
    }

    pub fn matching_tags(mut self) -> Self {
        self.stage.link = LinkMode::MatchingTags;
        self
    }

    pub fn task(mut self, task: TaskBuilder) -> Self {
        self.stage.task.push(task.build());
        self
    }
}

/// Builder for `TaskConfig`.
pub struct TaskBuilder {
    task: TaskConfig,
}

impl TaskBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn noop() -> Self {
        Self {
            task: TaskConfig {
                noop: true,
                ..TaskConfig::default()
            },
        }
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.task.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn must_succeed(mut self, val: bool) -> Self {
        self.task.must_succeed = val;
        self
    }

    pub fn drm(mut self, drm: &str) -> Self {
        self.task.drm = Some(drm.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
