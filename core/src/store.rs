use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, params};

use crate::error::{LogbookError, Result};

/// One persisted document. Each is a whole JSON list or record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Vehicles,
    OdometerReadings,
    DriveEntries,
    UserProfile,
}

impl StoreKey {
    pub const ALL: [StoreKey; 4] = [
        StoreKey::Vehicles,
        StoreKey::OdometerReadings,
        StoreKey::DriveEntries,
        StoreKey::UserProfile,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKey::Vehicles => "vehicles",
            StoreKey::OdometerReadings => "odometer_readings",
            StoreKey::DriveEntries => "drive_entries",
            StoreKey::UserProfile => "user_profile",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load-all / save-all persistence port. Saves replace the whole document.
pub trait StateStore: Send {
    fn load(&self, key: StoreKey) -> Result<Option<String>>;
    fn save(&mut self, key: StoreKey, json: &str) -> Result<()>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            LogbookError::Storage(format!("Failed to open database {}: {e}", path.display()))
        })?;
        let store = SqliteStore { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS stores (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    pub fn updated_at(&self, key: StoreKey) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT updated_at FROM stores WHERE key = ?1")?;
        let mut rows = stmt.query(params![key.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

impl StateStore for SqliteStore {
    fn load(&self, key: StoreKey) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM stores WHERE key = ?1")?;
        let mut rows = stmt.query(params![key.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, key: StoreKey, json: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO stores (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key.as_str(), json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

/// Non-persistent store for tests and throwaway sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    docs: HashMap<StoreKey, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, key: StoreKey) -> Result<Option<String>> {
        Ok(self.docs.get(&key).cloned())
    }

    fn save(&mut self, key: StoreKey, json: &str) -> Result<()> {
        self.docs.insert(key, json.to_string());
        Ok(())
    }
}
