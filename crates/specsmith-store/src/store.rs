use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use tracing::{debug, info};

use specsmith_utils::atomic_write::{is_already_exists, write_file_atomic, write_file_new};
use specsmith_utils::error::StoreError;
use specsmith_utils::trace_id::validate_trace_id;

use crate::lock::{LOCK_FILE_NAME, TraceLock};
use crate::records::{
    HistoryEntry, LatestPointer, Provenance, VersionKind, VersionRecord, parse_version_file_name,
    version_file_name,
};

pub const TRACES_DIR: &str = "traces";
pub const LATEST_FILE: &str = "latest.json";
pub const HISTORY_FILE: &str = "history.json";

/// Result of a successful [`VersionStore::persist`].
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedVersion {
    pub trace_id: String,
    pub version: u32,
    pub kind: VersionKind,
    pub path: Utf8PathBuf,
}

/// Append-only store rooted at `<state_dir>/traces`.
#[derive(Debug, Clone)]
pub struct VersionStore {
    root: Utf8PathBuf,
}

impl VersionStore {
    #[must_use]
    pub fn new(state_dir: impl AsRef<Utf8Path>) -> Self {
        Self {
            root: state_dir.as_ref().join(TRACES_DIR),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Directory of one trace. The id is validated before it touches a path.
    pub fn trace_dir(&self, trace_id: &str) -> Result<Utf8PathBuf, StoreError> {
        Ok(self.root.join(validate_trace_id(trace_id)?))
    }

    /// Persist `spec` as the next version of `trace_id`.
    ///
    /// The version number is derived from the files on disk while the trace's
    /// writer lock is held, so concurrent persists for one trace always produce
    /// a gapless sequence. Version files are created, never replaced.
    pub fn persist(
        &self,
        trace_id: &str,
        spec: &Value,
        provenance: Provenance<'_>,
    ) -> Result<PersistedVersion, StoreError> {
        let dir = self.trace_dir(trace_id)?;
        fs::create_dir_all(&dir).map_err(|e| StoreError::CreateDir {
            path: dir.to_string(),
            reason: e.to_string(),
        })?;

        let mut lock = TraceLock::open(&dir, trace_id)?;
        lock.with_exclusive(|| self.persist_locked(&dir, trace_id, spec, provenance))
    }

    fn persist_locked(
        &self,
        dir: &Utf8Path,
        trace_id: &str,
        spec: &Value,
        provenance: Provenance<'_>,
    ) -> Result<PersistedVersion, StoreError> {
        let version = scan_versions(dir)?.last().map_or(1, |max| max + 1);
        let history_path = dir.join(HISTORY_FILE);
        let mut history: Vec<HistoryEntry> = read_json_opt(&history_path)?.unwrap_or_default();
        let generated_at = Utc::now();
        let kind = provenance.kind();

        let record = VersionRecord {
            version,
            generated_at,
            parent_version: match provenance {
                Provenance::Initial { .. } => None,
                Provenance::Refinement { .. } => version.checked_sub(1).filter(|v| *v > 0),
            },
            trace_id: trace_id.to_string(),
            kind,
            refinement_instruction: match provenance {
                Provenance::Initial { .. } => None,
                Provenance::Refinement { instruction } => Some(instruction.to_string()),
            },
            spec: spec.clone(),
        };

        let version_path = dir.join(version_file_name(version));
        write_file_new(&version_path, &to_pretty_json(&version_path, &record)?).map_err(|e| {
            if is_already_exists(&e) {
                StoreError::VersionExists {
                    path: version_path.to_string(),
                }
            } else {
                StoreError::Write {
                    path: version_path.to_string(),
                    reason: format!("{e:#}"),
                }
            }
        })?;
        debug!(trace_id, version, path = %version_path, "Version record written");

        let latest_path = dir.join(LATEST_FILE);
        let latest = LatestPointer::new(version, trace_id, spec);
        write_json(&latest_path, &latest)?;

        history.push(HistoryEntry::new(version, generated_at, provenance));
        write_json(&history_path, &history)?;

        info!(trace_id, version, kind = %kind, "Specification persisted");

        Ok(PersistedVersion {
            trace_id: trace_id.to_string(),
            version,
            kind,
            path: version_path,
        })
    }

    /// Contents of `latest.json`.
    pub fn latest(&self, trace_id: &str) -> Result<LatestPointer, StoreError> {
        let path = self.trace_dir(trace_id)?.join(LATEST_FILE);
        read_json_opt(&path)?.ok_or_else(|| not_found(trace_id, "latest version"))
    }

    /// Contents of `history.json`; empty for a trace with no versions.
    pub fn history(&self, trace_id: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        let path = self.trace_dir(trace_id)?.join(HISTORY_FILE);
        Ok(read_json_opt(&path)?.unwrap_or_default())
    }

    pub fn load_version(&self, trace_id: &str, version: u32) -> Result<VersionRecord, StoreError> {
        let path = self.trace_dir(trace_id)?.join(version_file_name(version));
        read_json_opt(&path)?.ok_or_else(|| not_found(trace_id, &format!("version {version}")))
    }

    /// Persisted version numbers, ascending.
    pub fn versions(&self, trace_id: &str) -> Result<Vec<u32>, StoreError> {
        let dir = self.trace_dir(trace_id)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        scan_versions(&dir)
    }

    /// Trace ids with a directory under the store root, sorted.
    pub fn traces(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(read_error(&self.root, &e)),
        };

        let mut traces = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| read_error(&self.root, &e))?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let file_name = entry.file_name();
            if let (true, Some(name)) = (is_dir, file_name.to_str())
                && validate_trace_id(name).is_ok()
            {
                traces.push(name.to_string());
            }
        }
        traces.sort();
        Ok(traces)
    }
}

fn scan_versions(dir: &Utf8Path) -> Result<Vec<u32>, StoreError> {
    let entries = fs::read_dir(dir).map_err(|e| read_error(dir, &e))?;

    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| read_error(dir, &e))?;
        if let Some(version) = entry.file_name().to_str().and_then(parse_version_file_name) {
            versions.push(version);
        }
    }
    versions.sort_unstable();
    Ok(versions)
}

fn to_pretty_json<T: Serialize>(path: &Utf8Path, value: &T) -> Result<String, StoreError> {
    serde_json::to_string_pretty(value).map_err(|e| StoreError::Write {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), StoreError> {
    let content = to_pretty_json(path, value)?;
    write_file_atomic(path, &content).map_err(|e| StoreError::Write {
        path: path.to_string(),
        reason: format!("{e:#}"),
    })
}

/// `Ok(None)` when the file does not exist.
fn read_json_opt<T: DeserializeOwned>(path: &Utf8Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(read_error(path, &e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StoreError::Corrupted {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

fn read_error(path: &Utf8Path, e: &std::io::Error) -> StoreError {
    StoreError::Read {
        path: path.to_string(),
        reason: e.to_string(),
    }
}

fn not_found(trace_id: &str, what: &str) -> StoreError {
    StoreError::NotFound {
        trace_id: trace_id.to_string(),
        what: what.to_string(),
    }
}
