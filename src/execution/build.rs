// src/execution/build.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::Execution;
use crate::config::WorkflowFile;
use crate::errors::{DrmflowError, Result};
use crate::fs::FileSystem;
use crate::store::{JsonFileStore, MemoryStore, SNAPSHOT_FILE, Store};
use crate::types::{LinkMode, StoreMode, TaskId, format_tags};

impl Execution {
    /// Instantiate stages, tasks and edges from a validated workflow.
    ///
    /// Stages are added upstream first. With `link = "matching_tags"` a task
    /// depends on the upstream tasks whose tags are a subset of its own, and
    /// must match at least one.
    pub fn from_workflow(workflow: &WorkflowFile, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let section = &workflow.execution;
        let store: Box<dyn Store> = match section.store {
            StoreMode::Memory => Box::new(MemoryStore::new()),
            StoreMode::File => {
                let path = section.log_dir.join(SNAPSHOT_FILE);
                debug!(?path, "writing execution snapshot");
                Box::new(JsonFileStore::create(fs.clone(), path)?)
            }
        };

        let mut execution = Execution::new(section.settings(), fs, store);
        let mut stage_tasks: BTreeMap<&str, Vec<TaskId>> = BTreeMap::new();

        for (name, stage_cfg) in workflow.stages_in_order() {
            let stage = execution.add_stage(name)?;
            let mut ids = Vec::with_capacity(stage_cfg.task.len());

            for task_cfg in stage_cfg.task.iter() {
                let id = execution.add_task(stage, task_cfg.to_new_task())?;
                ids.push(id);

                for upstream in stage_cfg.after.iter() {
                    let parents = stage_tasks
                        .get(upstream.as_str())
                        .ok_or_else(|| DrmflowError::StageNotFound(upstream.clone()))?;

                    let mut linked = 0;
                    for &parent in parents {
                        let wanted = match stage_cfg.link {
                            LinkMode::All => true,
                            LinkMode::MatchingTags => execution
                                .task(parent)
                                .is_some_and(|p| {
                                    p.tags().iter().all(|(k, v)| task_cfg.tags.get(k) == Some(v))
                                }),
                        };
                        if wanted {
                            execution.add_edge(parent, id)?;
                            linked += 1;
                        }
                    }

                    if linked == 0 {
                        return Err(DrmflowError::ConfigError(format!(
                            "task {{{}}} of stage '{name}' matches no task of upstream stage '{upstream}'",
                            format_tags(&task_cfg.tags)
                        )));
                    }
                }
            }

            stage_tasks.insert(name, ids);
        }

        info!(
            execution = %execution.name(),
            stages = execution.stages().len(),
            tasks = workflow.task_count(),
            max_attempts = execution.max_attempts(),
            "execution built"
        );
        Ok(execution)
    }
}
