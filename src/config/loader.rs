// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{RawWorkflowFile, WorkflowFile};
use crate::errors::Result;

/// Read and deserialize a workflow file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawWorkflowFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_str(&contents)
}

pub fn parse_str(contents: &str) -> Result<RawWorkflowFile> {
    let workflow: RawWorkflowFile = toml::from_str(contents)?;
    Ok(workflow)
}

/// Load a workflow file and validate it.
///
/// Checks stage references, stage cycles, task commands and tag uniqueness.
/// This is the entry point the binary uses.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<WorkflowFile> {
    let raw = load_from_path(&path)?;
    WorkflowFile::try_from(raw)
}
