// src/execution/profile.rs

//! Absorbing backend usage reports into task records.

use serde_json::Value;
use tracing::{debug, warn};

use super::Execution;
use crate::errors::{DrmflowError, Result};
use crate::fs::wait_for_file;
use crate::model::Profile;
use crate::types::TaskId;

impl Execution {
    /// Parsed profile report for the task's current attempt.
    ///
    /// No-op tasks report nothing and never touch the filesystem. A report
    /// that does not show up within the profile wait is logged and treated as
    /// empty. A report that is not a JSON object is an error.
    pub fn profile(&mut self, id: TaskId) -> Result<Profile> {
        let task = self.task_ref(id)?;
        if task.is_noop() {
            return Ok(Profile::new());
        }
        if let Some(cached) = task.cached_profile() {
            return Ok(cached.clone());
        }

        let path = task.output_profile_path();
        if !wait_for_file(self.fs.as_ref(), &path, self.settings.profile_wait) {
            warn!(
                task = %task,
                path = ?path,
                timeout = ?self.settings.profile_wait.timeout,
                "profile report never appeared"
            );
            return Ok(Profile::new());
        }

        let raw = self.fs.read_to_string(&path)?;
        let parsed: Value = serde_json::from_str(&raw).map_err(|source| {
            DrmflowError::ProfileParse {
                path: path.clone(),
                source,
            }
        })?;
        let profile = match parsed {
            Value::Object(map) => map,
            other => {
                let source = <serde_json::Error as serde::de::Error>::custom(format!(
                    "expected a JSON object, found {other}"
                ));
                return Err(DrmflowError::ProfileParse { path, source });
            }
        };

        self.task_mut(id)?.cache_profile(profile.clone());
        Ok(profile)
    }

    /// Copy every known counter of the task's profile onto its usage record.
    ///
    /// Returns how many counters were assigned. Unknown keys are skipped.
    pub fn update_from_profile_output(&mut self, id: TaskId) -> Result<usize> {
        let profile = self.profile(id)?;
        if profile.is_empty() {
            return Ok(0);
        }

        let task = self.task_mut(id)?;
        let usage = task.usage_mut();
        let mut assigned = 0;
        for (key, value) in &profile {
            if usage.assign(key, value) {
                assigned += 1;
            } else {
                debug!(task = %id, key = %key, "ignoring profile entry");
            }
        }

        self.save_task(id)?;
        Ok(assigned)
    }
}
