// src/model/stage.rs

use serde::{Deserialize, Serialize};

use crate::types::{StageId, StageStatus, TaskId};

/// A named group of sibling tasks occupying one step of the pipeline.
///
/// The status is derived from the tasks by the status-change dispatcher and
/// is never set by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    id: StageId,
    name: String,
    status: StageStatus,
    tasks: Vec<TaskId>,
}

impl Stage {
    pub(crate) fn new(id: StageId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            status: StageStatus::NoAttempt,
            tasks: Vec::new(),
        }
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    /// Task ids in creation order.
    pub fn tasks(&self) -> &[TaskId] {
        &self.tasks
    }

    pub(crate) fn push_task(&mut self, id: TaskId) {
        self.tasks.push(id);
    }

    pub(crate) fn remove_task(&mut self, id: TaskId) {
        self.tasks.retain(|t| *t != id);
    }

    pub(crate) fn set_status_field(&mut self, status: StageStatus) {
        self.status = status;
    }
}
