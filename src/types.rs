// src/types.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordered key/value attributes distinguishing sibling tasks within a stage.
pub type Tags = BTreeMap<String, String>;

/// Opaque task identifier, assigned by the [`Execution`](crate::execution::Execution)
/// when the task is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stage identifier: position of the stage inside its execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(pub(crate) usize);

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a single task.
///
/// `running` is not modelled separately: a task stays `Submitted` until the
/// backend reports a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NoAttempt,
    Waiting,
    Submitted,
    Successful,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::NoAttempt => "no_attempt",
            TaskStatus::Waiting => "waiting",
            TaskStatus::Submitted => "submitted",
            TaskStatus::Successful => "successful",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "no_attempt" => Ok(TaskStatus::NoAttempt),
            "waiting" => Ok(TaskStatus::Waiting),
            "submitted" => Ok(TaskStatus::Submitted),
            "successful" => Ok(TaskStatus::Successful),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("invalid task status: {other}")),
        }
    }
}

/// Aggregate state of a stage.
///
/// `Successful` and `Failed` are terminal: once reached, the stage never
/// changes status again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    NoAttempt,
    Running,
    Successful,
    Failed,
}

impl StageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StageStatus::Successful | StageStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::NoAttempt => "no_attempt",
            StageStatus::Running => "running",
            StageStatus::Successful => "successful",
            StageStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where task/stage records are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    /// Keep records in memory only (lost on restart).
    #[default]
    Memory,
    /// Write-through JSON snapshot at `<log_dir>/execution.json`.
    File,
}

impl FromStr for StoreMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreMode::Memory),
            "file" => Ok(StoreMode::File),
            other => Err(format!(
                "invalid store mode: {other} (expected \"memory\" or \"file\")"
            )),
        }
    }
}

/// How tasks of a stage are linked to the tasks of its upstream stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    /// Every task depends on every upstream task.
    #[default]
    All,
    /// A task depends on the upstream tasks whose tags are a subset of its own.
    MatchingTags,
}

/// Render tags as `key: value` pairs separated by spaces.
pub fn format_tags(tags: &Tags) -> String {
    tags.iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join(" ")
}
