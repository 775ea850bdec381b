//! File-backed local store
//!
//! Stores each key as `<dir>/<key>.json`. Uses atomic writes (write to a
//! temp file, sync, then rename) so a snapshot is never left half-written.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{validate_key, Access, LocalStore, StorageError, StorageResult};

/// One JSON file per collection key
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StorageError::from_io(Access::CreateDir, e, &dir))?;
        Ok(Self { dir })
    }

    /// Directory holding the snapshots
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot file for `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        validate_key(key)?;
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::from_io(Access::Read, e, path)),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        validate_key(key)?;
        atomic_write(&self.path_for(key), value.as_bytes())
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StorageError::from_io(Access::CreateDir, e, parent))?;
    }

    // Temp file in the same directory so the rename stays on one filesystem
    let temp_path = path.with_extension("tmp");

    let write_err = |e| StorageError::from_io(Access::Write, e, &temp_path);
    let mut file = File::create(&temp_path).map_err(write_err)?;
    file.write_all(data).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;

    fs::rename(&temp_path, path).map_err(|e| StorageError::from_io(Access::Replace, e, path))?;

    Ok(())
}
