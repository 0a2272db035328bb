//! Per-trace writer lock
//!
//! An exclusive advisory lock on `<trace>/.lock`. Every acquisition opens its
//! own file handle, so the lock excludes other tasks in this process as well
//! as other processes. The lock file itself is never removed.

use camino::{Utf8Path, Utf8PathBuf};
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};

use specsmith_utils::error::StoreError;

pub const LOCK_FILE_NAME: &str = ".lock";

pub(crate) struct TraceLock {
    path: Utf8PathBuf,
    trace_id: String,
    lock: RwLock<File>,
}

impl TraceLock {
    pub fn open(trace_dir: &Utf8Path, trace_id: &str) -> Result<Self, StoreError> {
        let path = trace_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| StoreError::Lock {
                trace_id: trace_id.to_string(),
                reason: format!("cannot open {path}: {e}"),
            })?;

        Ok(Self {
            path,
            trace_id: trace_id.to_string(),
            lock: RwLock::new(file),
        })
    }

    /// Block until the exclusive lock is held, then run `f` under it.
    pub fn with_exclusive<T>(
        &mut self,
        f: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.write().map_err(|e| StoreError::Lock {
            trace_id: self.trace_id.clone(),
            reason: format!("cannot lock {}: {e}", self.path),
        })?;
        f()
    }
}
