//! SQLite-backed local store
//!
//! A single `snapshots` table keyed by collection name. Each `set` is an
//! upsert of the full snapshot.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use super::{validate_key, Access, LocalStore, StorageError, StorageResult};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Key/value snapshot storage in SQLite
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::from_io(Access::CreateDir, e, parent))?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Schema version recorded in the database
    pub fn schema_version(&self) -> StorageResult<Option<i32>> {
        let version: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM schema_info WHERE key = 'version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.and_then(|v| v.parse().ok()))
    }
}

/// Initialize the database schema
fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS snapshots (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_info (key, value) VALUES ('version', ?1)",
        params![SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

impl LocalStore for SqliteStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        validate_key(key)?;
        let value = self
            .conn
            .query_row(
                "SELECT value FROM snapshots WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.conn.execute(
            "INSERT INTO snapshots (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_schema_initialized() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_set_get_and_replace() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get("students").unwrap().is_none());

        store.set("students", "[1]").unwrap();
        store.set("students", "[2]").unwrap();
        assert_eq!(store.get("students").unwrap().as_deref(), Some("[2]"));
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("portal.db");

        SqliteStore::open(&path)
            .unwrap()
            .set("teacher", r#"{"name":"T"}"#)
            .unwrap();

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("teacher").unwrap().as_deref(),
            Some(r#"{"name":"T"}"#)
        );
    }
}
