// src/exec/backend.rs

//! Pluggable DRM backend abstraction.
//!
//! The runtime hands ready tasks to a `DrmBackend` and gets a job handle
//! back. How the job actually runs (local process, cluster queue, test fake)
//! is up to the backend; it reports the outcome later by sending
//! `RuntimeEvent::TaskCompleted` on the runtime channel.
//!
//! - [`LocalBackend`](super::LocalBackend) runs commands with `sh` on this
//!   machine.
//! - Tests provide their own backend that emits scripted outcomes.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::exec::{JobHandle, ScheduledTask};

pub trait DrmBackend: Send {
    /// Identifier matched against a task's `drm` field.
    fn name(&self) -> &str;

    /// Start `task` and return its job handle without waiting for it to
    /// finish.
    ///
    /// An error here means the backend itself is unusable; the run stops.
    fn submit(
        &mut self,
        task: ScheduledTask,
    ) -> Pin<Box<dyn Future<Output = Result<JobHandle>> + Send + '_>>;
}
