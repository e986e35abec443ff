// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::TaskId;

#[derive(Error, Debug)]
pub enum DrmflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Stage '{0}' already exists in this execution")]
    DuplicateStage(String),

    #[error("Stage '{stage}' already has a task tagged {{{tags}}}")]
    DuplicateTags { stage: String, tags: String },

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("Submission of task {task} failed: {reason}")]
    Submission { task: TaskId, reason: String },

    #[error("Malformed profile report at {path:?}: {source}")]
    ProfileParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DrmflowError>;
