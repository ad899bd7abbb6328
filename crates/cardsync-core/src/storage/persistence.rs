//! File persistence helpers
//!
//! Thin wrappers over `std::fs` that attach the path to every error, plus the
//! atomic write used for the metadata file.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use super::error::{StorageError, StorageResult};

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
///
/// The target file is never left in a partially-written state.
pub fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    // Same directory, so the rename below stays on one filesystem
    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

/// Read a UTF-8 file
pub fn read_to_string(path: &Path) -> StorageResult<String> {
    fs::read_to_string(path).map_err(|e| StorageError::from_read(e, path.to_path_buf()))
}

/// Read a file's raw bytes
pub fn read_bytes(path: &Path) -> StorageResult<Vec<u8>> {
    fs::read(path).map_err(|e| StorageError::from_read(e, path.to_path_buf()))
}

/// Copy a file, creating the target's parent directory if needed
pub fn copy_file(from: &Path, to: &Path) -> StorageResult<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::copy(from, to).map_err(|e| StorageError::from_io(e, to.to_path_buf()))?;
    Ok(())
}

/// Remove a file
pub fn remove_file(path: &Path) -> StorageResult<()> {
    fs::remove_file(path).map_err(|e| StorageError::from_io(e, path.to_path_buf()))
}
