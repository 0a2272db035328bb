//! Atomic file operations
//!
//! Every write goes to a temporary file in the target directory, is fsynced,
//! then renamed into place. Content is normalized to LF line endings.
//!
//! Two flavors are provided:
//! - [`write_file_atomic`] replaces the target if it exists (`latest.json`, `history.json`)
//! - [`write_file_new`] refuses to replace an existing target (immutable `v<N>.json` records)

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use std::io::Write;

use tempfile::NamedTempFile;

/// Atomically write content to a file, replacing any previous content.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> Result<()> {
    let temp_file = stage_temp_file(path, content)?;

    temp_file
        .persist(path.as_std_path())
        .map_err(|e| anyhow::Error::new(e.error))
        .with_context(|| format!("Failed to atomically write file: {path}"))?;

    Ok(())
}

/// Atomically create a file that must not already exist.
///
/// If `path` exists the call fails and the existing file is left untouched.
/// The underlying `std::io::Error` (kind `AlreadyExists`) stays reachable via
/// `anyhow::Error::downcast_ref`.
pub fn write_file_new(path: &Utf8Path, content: &str) -> Result<()> {
    let temp_file = stage_temp_file(path, content)?;

    temp_file
        .persist_noclobber(path.as_std_path())
        .map_err(|e| anyhow::Error::new(e.error))
        .with_context(|| format!("Failed to create file: {path}"))?;

    Ok(())
}

/// Returns true when `err` was caused by the target already existing.
#[must_use]
pub fn is_already_exists(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|io| io.kind() == std::io::ErrorKind::AlreadyExists)
}

fn stage_temp_file(path: &Utf8Path, content: &str) -> Result<NamedTempFile> {
    let normalized_content = normalize_line_endings(content);

    let temp_dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    fs::create_dir_all(temp_dir)
        .with_context(|| format!("Failed to create parent directory: {temp_dir}"))?;

    let mut temp_file = NamedTempFile::new_in(temp_dir)
        .with_context(|| format!("Failed to create temporary file in: {temp_dir}"))?;

    temp_file
        .write_all(normalized_content.as_bytes())
        .with_context(|| "Failed to write content to temporary file")?;

    temp_file
        .as_file()
        .sync_all()
        .with_context(|| "Failed to fsync temporary file")?;

    Ok(temp_file)
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_write_file_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = utf8_dir(&dir).join("latest.json");

        write_file_atomic(&path, "first").unwrap();
        write_file_atomic(&path, "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_write_file_atomic_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = utf8_dir(&dir).join("traces/t1/history.json");

        write_file_atomic(&path, "[]").unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_line_endings_normalized() {
        let dir = TempDir::new().unwrap();
        let path = utf8_dir(&dir).join("crlf.txt");

        write_file_atomic(&path, "a\r\nb\rc\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\nc\n");
    }

    #[test]
    fn test_write_file_new_refuses_existing_target() {
        let dir = TempDir::new().unwrap();
        let path = utf8_dir(&dir).join("v1.json");

        write_file_new(&path, "original").unwrap();
        let err = write_file_new(&path, "clobber").unwrap_err();

        assert!(is_already_exists(&err), "unexpected error: {err:#}");
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let root = utf8_dir(&dir);

        write_file_atomic(&root.join("a.json"), "{}").unwrap();
        write_file_new(&root.join("b.json"), "{}").unwrap();
        let _ = write_file_new(&root.join("b.json"), "{}");

        let names: Vec<String> = fs::read_dir(&root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "{names:?}");
    }
}
