//! Atomic file operations for crash-safe persistence.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::error::{PersistenceError, Result};

/// Writes data to a file atomically.
///
/// Data goes to a temporary file in the same directory, which is then
/// renamed over the target, so readers never observe a partial write.
///
/// # Errors
/// Returns an error if the write or rename fails.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::DirectoryError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    // Same directory, so the rename stays on one filesystem
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temp_file =
        tempfile::NamedTempFile::new_in(dir).map_err(|source| PersistenceError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;

    temp_file
        .write_all(data)
        .and_then(|_| temp_file.flush())
        .map_err(|source| PersistenceError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;

    temp_file
        .persist(path)
        .map_err(|e| PersistenceError::WriteError {
            path: path.to_path_buf(),
            source: e.error,
        })?;

    Ok(())
}

/// Writes JSON data to a file atomically.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, json.as_bytes())
}

/// Reads a file to a string, returning None if it doesn't exist.
pub fn read_to_string_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PersistenceError::ReadError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Reads JSON from a file, returning None if the file doesn't exist.
pub fn read_json_optional<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match read_to_string_optional(path)? {
        Some(data) => Ok(Some(serde_json::from_str(&data)?)),
        None => Ok(None),
    }
}

/// Removes a file. Returns false if it was already gone.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(PersistenceError::WriteError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn test_atomic_write_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.txt");

        atomic_write(&path, b"hello world").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello world");
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/test.txt");

        atomic_write(&path, b"nested content").unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_atomic_write_replaces_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.md");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_read_json_optional() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        let missing: Option<TestData> = read_json_optional(&path).unwrap();
        assert!(missing.is_none());

        let data = TestData {
            name: "exists".to_string(),
            value: 99,
        };
        atomic_write_json(&path, &data).unwrap();

        let loaded: Option<TestData> = read_json_optional(&path).unwrap();
        assert_eq!(loaded, Some(data));
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.json");

        assert!(!remove_if_exists(&path).unwrap());
        fs::write(&path, "{}").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }
}
