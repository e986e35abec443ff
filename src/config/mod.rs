// src/config/mod.rs

//! Workflow files.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a workflow file from disk.
//! - `validate.rs`: stage references, stage cycles, task sanity.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{ExecutionSection, RawWorkflowFile, StageConfig, TaskConfig, WorkflowFile};
pub use validate::validate_workflow;
