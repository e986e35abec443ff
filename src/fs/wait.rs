// src/fs/wait.rs

//! Bounded wait for a file to show up.
//!
//! Backends write artifacts after the process exits, and shared filesystems
//! may take a while to make them visible. This is the only place in the core
//! that blocks on an external event; it polls and always gives up after
//! `timeout`.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::FileSystem;

/// Polling parameters for [`wait_for_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileWait {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for FileWait {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl FileWait {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

/// Poll `fs` until `path` exists or `wait.timeout` elapses.
///
/// Returns `true` if the file was found. Never errors on timeout.
pub fn wait_for_file(fs: &dyn FileSystem, path: &Path, wait: FileWait) -> bool {
    let started = Instant::now();
    loop {
        if fs.exists(path) {
            return true;
        }

        let elapsed = started.elapsed();
        if elapsed >= wait.timeout {
            debug!(?path, ?elapsed, "gave up waiting for file");
            return false;
        }

        let remaining = wait.timeout - elapsed;
        thread::sleep(wait.poll_interval.min(remaining));
    }
}
