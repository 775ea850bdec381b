//! Local storage errors
//!
//! I/O failures carry the path and what the adapter was doing, and are
//! classified so the session can log a recovery hint next to them.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// What an adapter was doing when an I/O call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    CreateDir,
    /// Moving a finished temp file over the snapshot
    Replace,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Access::Read => "read",
            Access::Write => "write",
            Access::CreateDir => "create directory",
            Access::Replace => "replace",
        })
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot {access} '{path}': permission denied")]
    PermissionDenied {
        access: Access,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot {access} '{path}': no space left on device")]
    DiskFull {
        access: Access,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to {access} '{path}': {source}")]
    Io {
        access: Access,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Key is not one of the collection keys
    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),

    /// Snapshot could not be encoded or decoded
    #[error("Snapshot for '{key}' is not valid JSON: {source}")]
    Snapshot {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl StorageError {
    /// Wrap an I/O error, classifying permission and disk-space failures
    pub fn from_io(access: Access, source: io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::PermissionDenied {
            StorageError::PermissionDenied {
                access,
                path,
                source,
            }
        } else if is_out_of_space(&source) {
            StorageError::DiskFull {
                access,
                path,
                source,
            }
        } else {
            StorageError::Io {
                access,
                path,
                source,
            }
        }
    }

    /// Hint logged next to a failed snapshot write
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::DiskFull { .. } => Some("Free up disk space and try again."),
            StorageError::PermissionDenied { .. } => {
                Some("Check permissions of the portal data directory.")
            }
            StorageError::Io {
                access: Access::CreateDir,
                ..
            } => Some("Check that data_dir points to a writable location."),
            StorageError::Snapshot { .. } => {
                Some("The snapshot is replaced by seed data on next start. Remove it to reset.")
            }
            _ => None,
        }
    }
}

fn is_out_of_space(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    ["no space left", "disk full", "quota exceeded", "not enough space"]
        .iter()
        .any(|needle| msg.contains(needle))
}

pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_classification() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = StorageError::from_io(Access::Write, io_err, "/data/portal/local/students.tmp");

        assert!(matches!(err, StorageError::PermissionDenied { .. }));
        assert!(err.to_string().starts_with("Cannot write"));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_out_of_space_classification() {
        let io_err = io::Error::new(io::ErrorKind::Other, "No space left on device");
        let err = StorageError::from_io(Access::Write, io_err, "/full/links.tmp");

        assert!(matches!(err, StorageError::DiskFull { .. }));
    }

    #[test]
    fn test_other_failures_keep_access() {
        let io_err = io::Error::new(io::ErrorKind::Other, "device busy");
        let err = StorageError::from_io(Access::Replace, io_err, "/busy/teacher.json");

        assert!(matches!(
            err,
            StorageError::Io {
                access: Access::Replace,
                ..
            }
        ));
        assert!(err.to_string().contains("Failed to replace"));
        assert!(err.recovery_suggestion().is_none());
    }
}
