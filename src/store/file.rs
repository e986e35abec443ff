// src/store/file.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::{MemoryStore, Snapshot, Store};
use crate::errors::{DrmflowError, Result};
use crate::fs::FileSystem;
use crate::model::{Stage, Task};
use crate::types::TaskId;

/// File name of the snapshot inside the execution log directory.
pub const SNAPSHOT_FILE: &str = "execution.json";

/// Write-through JSON snapshot on disk.
///
/// Every mutation rewrites the whole snapshot, which keeps the file readable
/// after a crash at any point.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    records: MemoryStore,
}

impl JsonFileStore {
    /// Open the snapshot at `path`, starting empty if it doesn't exist yet.
    pub fn open(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if fs.exists(&path) {
            MemoryStore::from_snapshot(Self::load(fs.as_ref(), &path)?)
        } else {
            MemoryStore::new()
        };
        Ok(Self { path, fs, records })
    }

    /// Start a fresh snapshot at `path`, replacing whatever was there.
    pub fn create(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            fs,
            records: MemoryStore::new(),
        };
        store.flush()?;
        Ok(store)
    }

    /// Read a snapshot written by a previous run.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Snapshot> {
        let text = fs.read_to_string(path)?;
        let snapshot = serde_json::from_str(&text)?;
        Ok(snapshot)
    }

    fn flush(&self) -> Result<()> {
        let snapshot = self.records.snapshot()?;
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        self.fs
            .write(&self.path, &bytes)
            .map_err(|e| DrmflowError::Store(format!("writing {:?}: {e:#}", self.path)))?;
        debug!(path = ?self.path, "flushed execution snapshot");
        Ok(())
    }
}

impl Store for JsonFileStore {
    fn save_task(&mut self, task: &Task) -> Result<()> {
        self.records.save_task(task)?;
        self.flush()
    }

    fn save_stage(&mut self, stage: &Stage) -> Result<()> {
        self.records.save_stage(stage)?;
        self.flush()
    }

    fn save_edge(&mut self, parent: TaskId, child: TaskId) -> Result<()> {
        self.records.save_edge(parent, child)?;
        self.flush()
    }

    fn delete_task(&mut self, id: TaskId) -> Result<()> {
        self.records.delete_task(id)?;
        self.flush()
    }

    fn snapshot(&self) -> Result<Snapshot> {
        self.records.snapshot()
    }
}
