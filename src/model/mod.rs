// src/model/mod.rs

//! Task and stage records.
//!
//! - [`task`] holds the per-task record, its artifact paths and failure report.
//! - [`stage`] holds a named group of tasks and its aggregate status.
//! - [`usage`] holds the resource counters absorbed from profile reports.

pub mod stage;
pub mod task;
pub mod usage;

pub use stage::Stage;
pub use task::{NewTask, Task};
pub use usage::{Profile, ResourceUsage};
