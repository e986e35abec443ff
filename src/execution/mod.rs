// src/execution/mod.rs

//! The run-level context.
//!
//! An [`Execution`] owns the stages, the tasks and their dependency graph,
//! the global retry ceiling, and the handles to the filesystem and the
//! durable store. All lifecycle changes go through [`Execution::set_status`],
//! which hands the task to the status-change dispatcher in [`dispatch`].
//!
//! - [`dispatch`] applies the side effects of each status change (timestamps,
//!   retries, stage aggregation).
//! - [`profile`] absorbs backend usage reports into task records.
//! - [`build`] instantiates an execution from a validated workflow file.

pub mod build;
pub mod dispatch;
pub mod profile;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dag::TaskGraph;
use crate::errors::{DrmflowError, Result};
use crate::exec::JobHandle;
use crate::fs::{FileSystem, FileWait};
use crate::model::{NewTask, Stage, Task};
use crate::store::{MemoryStore, Snapshot, Store};
use crate::types::{StageId, StageStatus, TaskId, TaskStatus, format_tags};

/// Global policy for one execution.
#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    pub name: String,
    /// Retry ceiling shared by every task.
    pub max_attempts: u32,
    /// Per-task log directories live under `<log_root>/<stage>/<task>`.
    pub log_root: PathBuf,
    pub output_root: PathBuf,
    pub default_drm: String,
    /// Bound on waiting for a failed task's stderr before declaring it dead.
    pub failure_wait: FileWait,
    /// Bound on waiting for a profile report to appear.
    pub profile_wait: FileWait,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            name: "drmflow".to_string(),
            max_attempts: 1,
            log_root: PathBuf::from("log"),
            output_root: PathBuf::from("output"),
            default_drm: "local".to_string(),
            failure_wait: FileWait::default(),
            profile_wait: FileWait::default(),
        }
    }
}

/// One applied task status change, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub task: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
    /// Attempt number at the moment of the change.
    pub attempt: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Execution {
    settings: ExecutionSettings,
    stages: Vec<Stage>,
    tasks: BTreeMap<TaskId, Task>,
    graph: TaskGraph,
    next_task_id: u64,
    fs: Arc<dyn FileSystem>,
    store: Box<dyn Store>,
    history: Vec<StatusChange>,
}

impl Execution {
    pub fn new(
        settings: ExecutionSettings,
        fs: Arc<dyn FileSystem>,
        store: Box<dyn Store>,
    ) -> Self {
        Self {
            settings,
            stages: Vec::new(),
            tasks: BTreeMap::new(),
            graph: TaskGraph::new(),
            next_task_id: 1,
            fs,
            store,
            history: Vec::new(),
        }
    }

    /// Execution backed by a [`MemoryStore`].
    pub fn in_memory(settings: ExecutionSettings, fs: Arc<dyn FileSystem>) -> Self {
        Self::new(settings, fs, Box::new(MemoryStore::new()))
    }

    /// Rebuild an execution from persisted records.
    pub fn restore(
        settings: ExecutionSettings,
        fs: Arc<dyn FileSystem>,
        store: Box<dyn Store>,
        snapshot: Snapshot,
    ) -> Result<Self> {
        let mut execution = Self::new(settings, fs, store);

        let mut stages = snapshot.stages;
        stages.sort_by_key(|s| s.id());
        for (idx, stage) in stages.iter().enumerate() {
            if stage.id() != StageId(idx) {
                return Err(DrmflowError::Store(format!(
                    "stage ids are not contiguous: expected {idx}, found {}",
                    stage.id()
                )));
            }
        }
        execution.stages = stages;

        for task in snapshot.tasks {
            if execution.stages.get(task.stage().0).is_none() {
                return Err(DrmflowError::StageNotFound(task.stage().to_string()));
            }
            execution.next_task_id = execution.next_task_id.max(task.id().0 + 1);
            execution.graph.add_node(task.id());
            execution.tasks.insert(task.id(), task);
        }

        for (parent, child) in snapshot.edges {
            if !execution.tasks.contains_key(&parent) || !execution.tasks.contains_key(&child) {
                warn!(%parent, %child, "dropping persisted edge to unknown task");
                continue;
            }
            execution.graph.insert_edge_unchecked(parent, child);
        }

        if let Err(e) = execution.graph.topological_order() {
            warn!(error = %e, "restored task graph is not acyclic");
        }

        // Jobs handed out by a previous process will never report back.
        let orphaned: Vec<TaskId> = execution
            .tasks
            .values()
            .filter(|t| matches!(t.status(), TaskStatus::Waiting | TaskStatus::Submitted))
            .map(|t| t.id())
            .collect();
        for id in orphaned {
            warn!(task = %id, "requeueing task left in flight by a previous run");
            execution.set_status(id, TaskStatus::NoAttempt)?;
        }

        info!(
            execution = %execution.settings.name,
            stages = execution.stages.len(),
            tasks = execution.tasks.len(),
            "restored execution from snapshot"
        );
        Ok(execution)
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn max_attempts(&self) -> u32 {
        self.settings.max_attempts
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Every status change applied so far, oldest first.
    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        self.store.snapshot()
    }

    /// Add a new, empty stage. Names are unique within an execution.
    pub fn add_stage(&mut self, name: &str) -> Result<StageId> {
        if self.stages.iter().any(|s| s.name() == name) {
            return Err(DrmflowError::DuplicateStage(name.to_string()));
        }
        let id = StageId(self.stages.len());
        let stage = Stage::new(id, name);
        self.store.save_stage(&stage)?;
        self.stages.push(stage);
        debug!(stage = %name, %id, "added stage");
        Ok(id)
    }

    /// Add a task to a stage. Its tags must be unique within the stage.
    pub fn add_task(&mut self, stage: StageId, new_task: NewTask) -> Result<TaskId> {
        let stage_name = self
            .stages
            .get(stage.0)
            .map(|s| s.name().to_string())
            .ok_or_else(|| DrmflowError::StageNotFound(stage.to_string()))?;

        let clash = self
            .tasks_of_stage(stage)
            .any(|t| t.tags() == &new_task.tags);
        if clash {
            return Err(DrmflowError::DuplicateTags {
                stage: stage_name,
                tags: format_tags(&new_task.tags),
            });
        }

        let id = TaskId(self.next_task_id);
        self.next_task_id += 1;

        let dir_name = task_dir_name(id, &new_task);
        let log_dir = self.settings.log_root.join(&stage_name).join(&dir_name);
        let output_dir = self.settings.output_root.join(&stage_name).join(&dir_name);

        let task = Task::new(
            id,
            stage,
            &stage_name,
            new_task,
            &self.settings.default_drm,
            log_dir,
            output_dir,
        );

        self.store.save_task(&task)?;
        self.graph.add_node(id);
        self.tasks.insert(id, task);
        if let Some(s) = self.stages.get_mut(stage.0) {
            s.push_task(id);
            self.store.save_stage(s)?;
        }
        Ok(id)
    }

    /// Add a `parent -> child` dependency. Edges that would close a cycle
    /// are rejected.
    pub fn add_edge(&mut self, parent: TaskId, child: TaskId) -> Result<()> {
        if self.graph.add_edge(parent, child)? {
            self.store.save_edge(parent, child)?;
        }
        Ok(())
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub(crate) fn task_ref(&self, id: TaskId) -> Result<&Task> {
        self.tasks.get(&id).ok_or(DrmflowError::TaskNotFound(id))
    }

    pub(crate) fn task_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.tasks.get_mut(&id).ok_or(DrmflowError::TaskNotFound(id))
    }

    /// All tasks, ordered by id.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(id.0)
    }

    pub fn stage_by_name(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name() == name)
    }

    pub fn tasks_of_stage(&self, stage: StageId) -> impl Iterator<Item = &Task> {
        self.stages
            .get(stage.0)
            .map(|s| s.tasks())
            .unwrap_or(&[])
            .iter()
            .filter_map(|id| self.tasks.get(id))
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn parents_of(&self, id: TaskId) -> &[TaskId] {
        self.graph.parents_of(id)
    }

    pub fn children_of(&self, id: TaskId) -> &[TaskId] {
        self.graph.children_of(id)
    }

    /// Every task downstream of `id`.
    pub fn successors(&self, id: TaskId) -> BTreeSet<TaskId> {
        self.graph.successors(id)
    }

    /// Change a task's status and run the dispatcher.
    ///
    /// Setting the status a task already has is a no-op, and so is moving a
    /// task out of `successful` or a final `failed`. Returns whether a change
    /// was applied.
    pub fn set_status(&mut self, id: TaskId, status: TaskStatus) -> Result<bool> {
        self.transition(id, status, 0)
    }

    /// The single mutator of task status. `depth` counts nested transitions
    /// triggered by the dispatcher for the same outside event.
    pub(crate) fn transition(&mut self, id: TaskId, status: TaskStatus, depth: u8) -> Result<bool> {
        let task = self.task_mut(id)?;
        let from = task.status();
        if from == status {
            return Ok(false);
        }
        // A retry moves `failed` back to `no_attempt` before `finished_on`
        // is set; any other exit from a finished status is refused.
        if task.finished() && task.finished_on().is_some() {
            warn!(task = %id, %from, to = %status, "task already finished; ignoring status change");
            return Ok(false);
        }

        task.set_status_field(status);
        let attempt = task.attempt();
        debug!(task = %id, %from, to = %status, attempt, "task status changed");

        self.history.push(StatusChange {
            task: id,
            from,
            to: status,
            attempt,
            at: Utc::now(),
        });

        self.on_status_change(id, depth)?;
        Ok(true)
    }

    /// Record the backend's job handle and move the task to `submitted`.
    pub fn record_submission(&mut self, id: TaskId, handle: JobHandle) -> Result<()> {
        let task = self.task_mut(id)?;
        task.record_job(handle.job_id, handle.native_specification);
        self.set_status(id, TaskStatus::Submitted)?;
        Ok(())
    }

    /// Tasks that have never been (or are again) eligible for submission and
    /// whose parents have all resolved.
    pub fn ready_tasks(&self) -> Vec<TaskId> {
        self.tasks
            .values()
            .filter(|t| t.status() == TaskStatus::NoAttempt)
            .filter(|t| {
                self.graph.parents_of(t.id()).iter().all(|p| {
                    self.tasks
                        .get(p)
                        .is_some_and(|parent| parent.resolves_dependents())
                })
            })
            .map(|t| t.id())
            .collect()
    }

    /// Number of tasks handed to (or about to be handed to) a backend.
    pub fn in_flight(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| matches!(t.status(), TaskStatus::Waiting | TaskStatus::Submitted))
            .count()
    }

    /// Tasks that can never run because an ancestor failed for good.
    pub fn blocked_tasks(&self) -> BTreeSet<TaskId> {
        self.tasks
            .values()
            .filter(|t| t.is_fatal_failure())
            .flat_map(|t| self.graph.successors(t.id()))
            .filter(|id| {
                self.tasks
                    .get(id)
                    .is_some_and(|t| t.status() == TaskStatus::NoAttempt)
            })
            .collect()
    }

    pub fn has_failed_stage(&self) -> bool {
        self.stages.iter().any(|s| s.status() == StageStatus::Failed)
    }

    /// Force a task into a tolerated failure, bypassing retries.
    ///
    /// Finished tasks are left untouched.
    pub fn cancel(&mut self, id: TaskId) -> Result<()> {
        let task = self.task_mut(id)?;
        if task.finished() {
            debug!(task = %id, status = %task.status(), "cancel ignored; task already finished");
            return Ok(());
        }
        task.set_must_succeed(false);
        info!(task = %id, "cancelling task");
        self.set_status(id, TaskStatus::Failed)?;
        Ok(())
    }

    /// Remove a task, its edges and (optionally) its log and output dirs.
    pub fn delete_task(&mut self, id: TaskId, delete_files: bool) -> Result<Task> {
        let task = self
            .tasks
            .remove(&id)
            .ok_or(DrmflowError::TaskNotFound(id))?;
        debug!(task = %task, delete_files, "deleting task");

        if delete_files {
            self.fs.remove_dir_all(task.log_dir())?;
            self.fs.remove_dir_all(task.output_dir())?;
        }

        self.graph.remove_node(id);
        self.store.delete_task(id)?;
        if let Some(stage) = self.stages.get_mut(task.stage().0) {
            stage.remove_task(id);
            self.store.save_stage(stage)?;
        }
        Ok(task)
    }
}

/// Directory name for a task: its tags, or its id when it has none.
fn task_dir_name(id: TaskId, new_task: &NewTask) -> String {
    if new_task.tags.is_empty() {
        return format!("task_{id}");
    }
    new_task.tags
        .iter()
        .map(|(k, v)| format!("{}-{}", sanitize(k), sanitize(v)))
        .collect::<Vec<_>>()
        .join("__")
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn execution() -> Execution {
        let settings = ExecutionSettings {
            log_root: PathBuf::from("/log"),
            output_root: PathBuf::from("/out"),
            ..ExecutionSettings::default()
        };
        Execution::in_memory(settings, Arc::new(MockFileSystem::new()))
    }

    #[test]
    fn tags_must_be_unique_within_a_stage() {
        let mut ex = execution();
        let align = ex.add_stage("align").unwrap();
        let call = ex.add_stage("call").unwrap();

        ex.add_task(align, NewTask::command("a").tag("sample", "A")).unwrap();
        ex.add_task(call, NewTask::command("c").tag("sample", "A")).unwrap();
        let dup = ex.add_task(align, NewTask::command("b").tag("sample", "A"));

        assert!(matches!(dup, Err(DrmflowError::DuplicateTags { .. })));
        assert_eq!(ex.stage(align).unwrap().tasks().len(), 1);
    }

    #[test]
    fn stage_names_are_unique() {
        let mut ex = execution();
        ex.add_stage("align").unwrap();
        assert!(matches!(
            ex.add_stage("align"),
            Err(DrmflowError::DuplicateStage(_))
        ));
    }

    #[test]
    fn task_dirs_are_derived_from_stage_and_tags() {
        let mut ex = execution();
        let align = ex.add_stage("align").unwrap();
        let tagged = ex
            .add_task(align, NewTask::command("a").tag("sample", "A 1").tag("lane", "2"))
            .unwrap();
        let bare = ex.add_task(align, NewTask::command("b")).unwrap();

        assert_eq!(
            ex.task(tagged).unwrap().log_dir(),
            PathBuf::from("/log/align/lane-2__sample-A_1")
        );
        assert_eq!(
            ex.task(bare).unwrap().output_dir(),
            PathBuf::from(format!("/out/align/task_{bare}"))
        );
    }

    #[test]
    fn ready_tasks_wait_for_parents() {
        let mut ex = execution();
        let s = ex.add_stage("s").unwrap();
        let a = ex.add_task(s, NewTask::command("a").tag("n", "a")).unwrap();
        let b = ex.add_task(s, NewTask::command("b").tag("n", "b")).unwrap();
        ex.add_edge(a, b).unwrap();

        assert_eq!(ex.ready_tasks(), vec![a]);

        ex.set_status(a, TaskStatus::Waiting).unwrap();
        assert!(ex.ready_tasks().is_empty());
        assert_eq!(ex.in_flight(), 1);

        ex.set_status(a, TaskStatus::Submitted).unwrap();
        ex.set_status(a, TaskStatus::Successful).unwrap();
        assert_eq!(ex.ready_tasks(), vec![b]);
    }

    #[test]
    fn tolerated_failures_release_children() {
        let mut ex = execution();
        let s = ex.add_stage("s").unwrap();
        let a = ex
            .add_task(s, NewTask::command("a").tag("n", "a").must_succeed(false))
            .unwrap();
        let b = ex.add_task(s, NewTask::command("b").tag("n", "b")).unwrap();
        ex.add_edge(a, b).unwrap();

        ex.set_status(a, TaskStatus::Failed).unwrap();

        assert_eq!(ex.ready_tasks(), vec![b]);
        assert!(ex.blocked_tasks().is_empty());
    }

    #[test]
    fn cancel_forces_a_tolerated_failure() {
        let mut ex = execution();
        let s = ex.add_stage("s").unwrap();
        let a = ex.add_task(s, NewTask::command("a")).unwrap();
        ex.set_status(a, TaskStatus::Waiting).unwrap();
        ex.set_status(a, TaskStatus::Submitted).unwrap();

        ex.cancel(a).unwrap();

        let task = ex.task(a).unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert!(!task.must_succeed());
        assert_eq!(task.attempt(), 1);
        assert!(task.finished_on().is_some());
        assert_eq!(ex.stage(s).unwrap().status(), StageStatus::Running);
    }

    #[test]
    fn delete_task_removes_edges_and_files() {
        let fs = MockFileSystem::new();
        let settings = ExecutionSettings {
            log_root: PathBuf::from("/log"),
            output_root: PathBuf::from("/out"),
            ..ExecutionSettings::default()
        };
        let mut ex = Execution::in_memory(settings, Arc::new(fs.clone()));
        let s = ex.add_stage("s").unwrap();
        let a = ex.add_task(s, NewTask::command("a").tag("n", "a")).unwrap();
        let b = ex.add_task(s, NewTask::command("b").tag("n", "b")).unwrap();
        ex.add_edge(a, b).unwrap();

        let log_dir = ex.task(a).unwrap().log_dir().to_path_buf();
        fs.add_file(log_dir.join("stdout_attempt1.txt"), "hi");

        let removed = ex.delete_task(a, true).unwrap();

        assert_eq!(removed.id(), a);
        assert!(ex.task(a).is_none());
        assert!(ex.parents_of(b).is_empty());
        assert_eq!(ex.stage(s).unwrap().tasks(), &[b]);
        assert!(!fs.exists(&log_dir));
        assert!(ex.snapshot().unwrap().edges.is_empty());
    }
}
