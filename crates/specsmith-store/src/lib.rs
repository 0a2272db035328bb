//! Versioned artifact store
//!
//! Layout under the state directory:
//!
//! ```text
//! traces/<trace_id>/
//!     v1.json, v2.json, ...   immutable version records
//!     latest.json             newest spec, flattened, plus `current_version`
//!     history.json            one summary entry per version
//!     .lock                   writer lock, held while a version is appended
//! ```

mod lock;
mod records;
mod store;

pub use lock::LOCK_FILE_NAME;
pub use records::{
    HistoryEntry, INSTRUCTION_SUMMARY_CHARS, LatestPointer, Provenance,
    REQUIREMENTS_SUMMARY_CHARS, VersionKind, VersionRecord, parse_version_file_name, summarize,
    version_file_name,
};
pub use specsmith_utils::error::StoreError;
pub use store::{HISTORY_FILE, LATEST_FILE, PersistedVersion, TRACES_DIR, VersionStore};
