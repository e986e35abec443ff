// src/store/mod.rs

//! Durable records of stages, tasks and edges.
//!
//! The execution writes through a [`Store`] after every change it makes, so a
//! crashed run can be inspected (or rebuilt with
//! [`Execution::restore`](crate::execution::Execution::restore)) from the last
//! persisted [`Snapshot`].

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::model::{Stage, Task};
use crate::types::TaskId;

pub mod file;
pub mod memory;

pub use file::{JsonFileStore, SNAPSHOT_FILE};
pub use memory::MemoryStore;

/// Abstract storage for execution records.
pub trait Store: Send + Debug {
    fn save_task(&mut self, task: &Task) -> Result<()>;
    fn save_stage(&mut self, stage: &Stage) -> Result<()>;
    fn save_edge(&mut self, parent: TaskId, child: TaskId) -> Result<()>;
    /// Remove a task and every edge touching it.
    fn delete_task(&mut self, id: TaskId) -> Result<()>;
    fn snapshot(&self) -> Result<Snapshot>;
}

/// Everything needed to rebuild an execution's graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub stages: Vec<Stage>,
    pub tasks: Vec<Task>,
    pub edges: Vec<(TaskId, TaskId)>,
}
