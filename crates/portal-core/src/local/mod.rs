//! Local store adapters
//!
//! Durable key/value storage for collection snapshots. Each collection is
//! stored as one JSON document under its key (`teacher`, `students`,
//! `links`, `sections`). Reads happen once at startup; every commit
//! rewrites the whole snapshot for its key.
//!
//! ## Adapters
//!
//! - [`FileStore`]: one file per key, atomic writes (default)
//! - [`SqliteStore`]: a single key/value table
//! - [`MemoryStore`]: in-process map, shareable across sessions in tests

mod error;
mod file;
mod memory;
mod sqlite;

pub use error::{Access, StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{Config, LocalBackend};

/// Synchronous key/value storage for collection snapshots
pub trait LocalStore: Send {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replace the value stored under `key`
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
}

/// Open the local store selected by the configuration
pub fn open(config: &Config) -> StorageResult<Box<dyn LocalStore>> {
    match config.local_backend {
        LocalBackend::File => Ok(Box::new(FileStore::new(config.snapshot_dir())?)),
        LocalBackend::Sqlite => Ok(Box::new(SqliteStore::open(&config.sqlite_path())?)),
    }
}

/// Read and decode the snapshot under `key`
///
/// Returns `Ok(None)` when nothing is stored yet.
pub fn read_snapshot<T: DeserializeOwned>(
    store: &dyn LocalStore,
    key: &str,
) -> StorageResult<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StorageError::Snapshot {
            key: key.to_string(),
            source,
        })
}

/// Encode and store a snapshot under `key`
pub fn write_snapshot<T: Serialize + ?Sized>(
    store: &dyn LocalStore,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let raw = serde_json::to_string(value).map_err(|source| StorageError::Snapshot {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw)
}

/// Keys are collection names; anything else could escape the storage directory
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}
