// src/fs/mod.rs

//! Filesystem access used by the core.
//!
//! Task artifacts (stdout, stderr, command scripts, profile reports) are
//! written asynchronously by backends, often on a shared network filesystem.
//! The core only reads them, through the [`FileSystem`] trait, so tests can
//! swap in [`mock::MockFileSystem`].

use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

pub mod mock;
pub mod wait;

pub use wait::{FileWait, wait_for_file};

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;

    /// Recursively remove a directory. Missing directories are not an error.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
        }
        let mut file = fs::File::create(path).with_context(|| format!("creating file {:?}", path))?;
        file.write_all(contents).with_context(|| format!("writing to file {:?}", path))?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        fs::remove_dir_all(path).with_context(|| format!("removing dir {:?}", path))
    }
}

/// Read a text artifact, or a placeholder if it hasn't been written.
pub fn read_artifact(fs: &dyn FileSystem, path: &Path) -> String {
    if !fs.exists(path) {
        return "file does not exist".to_string();
    }
    match fs.read_to_string(path) {
        Ok(text) => text.trim().to_string(),
        Err(e) => format!("could not read file: {e}"),
    }
}
