// src/store/memory.rs

use std::collections::{BTreeMap, BTreeSet};

use super::{Snapshot, Store};
use crate::errors::Result;
use crate::model::{Stage, Task};
use crate::types::{StageId, TaskId};

/// Keeps records in memory only (lost on restart).
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    stages: BTreeMap<StageId, Stage>,
    tasks: BTreeMap<TaskId, Task>,
    edges: BTreeSet<(TaskId, TaskId)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            stages: snapshot.stages.into_iter().map(|s| (s.id(), s)).collect(),
            tasks: snapshot.tasks.into_iter().map(|t| (t.id(), t)).collect(),
            edges: snapshot.edges.into_iter().collect(),
        }
    }
}

impl Store for MemoryStore {
    fn save_task(&mut self, task: &Task) -> Result<()> {
        self.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    fn save_stage(&mut self, stage: &Stage) -> Result<()> {
        self.stages.insert(stage.id(), stage.clone());
        Ok(())
    }

    fn save_edge(&mut self, parent: TaskId, child: TaskId) -> Result<()> {
        self.edges.insert((parent, child));
        Ok(())
    }

    fn delete_task(&mut self, id: TaskId) -> Result<()> {
        self.tasks.remove(&id);
        self.edges.retain(|(p, c)| *p != id && *c != id);
        Ok(())
    }

    fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            stages: self.stages.values().cloned().collect(),
            tasks: self.tasks.values().cloned().collect(),
            edges: self.edges.iter().copied().collect(),
        })
    }
}
