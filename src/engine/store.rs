// ── Zeus Engine: Durable Store ─────────────────────────────────────────────
// Small SQLite key/value store standing in for the browser's localStorage.
// Holds the bearer token, the cached user profile, and the model-selection
// slot set. The per-conversation processing map is deliberately NOT here —
// it is transient and dies with the session.

use std::path::{Path, PathBuf};

use log::info;
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use crate::atoms::constants::CLIENT_DB_FILE;
use crate::atoms::error::ClientResult;

/// Thread-safe database wrapper.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the client database inside `data_dir`.
    pub fn open(data_dir: &Path) -> ClientResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path: PathBuf = data_dir.join(CLIENT_DB_FILE);
        info!("[store] Opening client store at {:?}", path);

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        Self::init(&conn)?;

        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    /// An in-memory store for tests and throwaway sessions. Nothing written
    /// here survives the process.
    pub fn open_in_memory() -> ClientResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> ClientResult<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS client_config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> ClientResult<Option<String>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT value FROM client_config WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO client_config (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> ClientResult<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM client_config WHERE key = ?1", params![key])?;
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove_round_trip() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v1").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v1".to_string()));

        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v2".to_string()));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn values_survive_reopen_on_disk() {
        let dir = std::env::temp_dir().join(format!("zeus-store-test-{}", uuid::Uuid::new_v4()));
        {
            let store = Store::open(&dir).unwrap();
            store.set("token", "abc").unwrap();
        }
        {
            let store = Store::open(&dir).unwrap();
            assert_eq!(store.get("token").unwrap(), Some("abc".to_string()));
        }
        std::fs::remove_dir_all(&dir).ok();
    }
}
