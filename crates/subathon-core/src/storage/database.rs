//! Snapshot persistence.
//!
//! Provides the durable key/value store the timer snapshot lives in:
//! - [`SnapshotStore`]: the narrow interface the runtime depends on
//! - [`SqliteStore`]: SQLite `kv` table in the data directory
//! - [`MemoryStore`]: process-local store for tests and ephemeral hosts

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::data_dir;
use crate::error::{Result, StorageError};
use crate::timer::TimerState;

/// Durable home of the timer snapshot.
///
/// Failures are reported but never fatal to callers: the in-memory engine
/// stays authoritative and the next write simply tries again.
pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<TimerState>>;

    fn set(&self, key: &str, snapshot: &TimerState) -> Result<()>;
}

/// SQLite-backed snapshot store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database at `~/.config/subathon/subathon.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("subathon.db"))
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get a raw value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a raw value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SnapshotStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<TimerState>> {
        let Some(json) = self.kv_get(key)? else {
            return Ok(None);
        };
        let snapshot = serde_json::from_str(&json).map_err(|e| StorageError::CorruptSnapshot {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(snapshot))
    }

    fn set(&self, key: &str, snapshot: &TimerState) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        self.kv_set(key, &json)
    }
}

/// In-memory snapshot store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, TimerState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(key: &str, snapshot: TimerState) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.lock() {
            entries.insert(key.to_string(), snapshot);
        }
        store
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<TimerState>> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, snapshot: &TimerState) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), snapshot.clone());
        Ok(())
    }
}
