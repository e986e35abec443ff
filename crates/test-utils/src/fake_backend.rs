// crates/test-utils/src/fake_backend.rs

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use drmflow::engine::{RuntimeEvent, TaskOutcome};
use drmflow::errors::Result;
use drmflow::exec::{DrmBackend, JobHandle, ScheduledTask};
use drmflow::types::TaskId;

/// Shared log of `(task, attempt)` pairs in submission order.
pub type Submissions = Arc<Mutex<Vec<(TaskId, u32)>>>;

/// A fake backend that:
/// - records which task attempts were submitted
/// - reports a scripted outcome for each one (success unless told otherwise)
/// - writes no files
pub struct FakeBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    failures: HashMap<TaskId, u32>,
    held: HashSet<TaskId>,
    submitted: Submissions,
}

impl FakeBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            runtime_tx,
            failures: HashMap::new(),
            held: HashSet::new(),
            submitted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail the first `times` attempts of `task`, then succeed.
    pub fn fail(mut self, task: TaskId, times: u32) -> Self {
        self.failures.insert(task, times);
        self
    }

    pub fn always_fail(self, task: TaskId) -> Self {
        self.fail(task, u32::MAX)
    }

    /// Accept `task` but never report an outcome for it.
    pub fn hold(mut self, task: TaskId) -> Self {
        self.held.insert(task);
        self
    }

    pub fn submissions(&self) -> Submissions {
        Arc::clone(&self.submitted)
    }
}

impl DrmBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn submit(
        &mut self,
        task: ScheduledTask,
    ) -> Pin<Box<dyn Future<Output = Result<JobHandle>> + Send + '_>> {
        self.submitted.lock().unwrap().push((task.id, task.attempt));

        let job_id = format!("fake-{}-{}", task.id, task.attempt);
        let failures = self.failures.get(&task.id).copied().unwrap_or(0);
        let outcome = if task.attempt <= failures {
            TaskOutcome::Failed(1)
        } else {
            TaskOutcome::Success
        };

        let held = self.held.contains(&task.id);
        debug!(task = %task.id, attempt = task.attempt, ?outcome, held, "fake backend accepted job");

        if !held {
            let tx = self.runtime_tx.clone();
            tokio::spawn(async move {
                let event = RuntimeEvent::TaskCompleted {
                    task: task.id,
                    outcome,
                };
                if tx.send(event).await.is_err() {
                    warn!(task = %task.id, "runtime gone before fake outcome was delivered");
                }
            });
        }

        Box::pin(async move { Ok(JobHandle::new(job_id)) })
    }
}
