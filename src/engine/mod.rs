// src/engine/mod.rs

//! Run loop for an execution.
//!
//! Backends report job outcomes as [`RuntimeEvent`]s. The runtime reacts by:
//! - ingesting profiles and applying `successful` / `failed` transitions
//! - submitting tasks whose parents have resolved
//! - stopping once nothing is in flight and nothing is ready
//!
//! The synchronous core lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::types::TaskId;

/// Outcome of a job as seen by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(i32),
}

/// Runtime options used by the core.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Stop submitting new work once any stage has failed.
    pub fail_fast: bool,
}

/// Events flowing into the runtime from backends and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A job finished with a concrete outcome.
    TaskCompleted { task: TaskId, outcome: TaskOutcome },
    /// Give up on a task without retrying it.
    CancelRequested { task: TaskId },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
