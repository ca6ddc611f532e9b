//! Main store implementation.

use std::path::Path;

use rusqlite::Connection;
use time::OffsetDateTime;
use tracing::{debug, info};

use bluetemp_types::Climate;

use crate::error::{Error, Result};
use crate::models::StoredRecord;
use crate::schema;

/// SQLite-based store for climate records.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        info!("Opening database at {}", path.display());
        let mut conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&mut conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        schema::initialize(&mut conn)?;
        Ok(Self { conn })
    }

    /// Persist a climate record, stamped with the current time.
    pub fn store(&self, climate: &Climate) -> Result<StoredRecord> {
        if !climate.temperature.is_finite() || !climate.humidity.is_finite() {
            return Err(Error::InvalidRecord(format!(
                "non-finite value in {climate:?}"
            )));
        }

        let created_at = OffsetDateTime::now_utc();
        self.conn.execute(
            "INSERT INTO records (temperature, humidity, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![climate.temperature, climate.humidity, created_at],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, "Stored climate record");

        Ok(StoredRecord {
            id,
            temperature: climate.temperature,
            humidity: climate.humidity,
            created_at,
        })
    }

    /// The newest `limit` records, newest first.
    ///
    /// Insertion order decides, so records stored within the same clock
    /// tick still come back in the order they were stored.
    pub fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT id, temperature, humidity, created_at FROM records
             ORDER BY id DESC LIMIT ?",
        )?;

        let records = stmt
            .query_map([limit], |row| {
                Ok(StoredRecord {
                    id: row.get(0)?,
                    temperature: row.get(1)?,
                    humidity: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.conn.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn climate(temperature: f64, humidity: f64) -> Climate {
        Climate {
            temperature,
            humidity,
        }
    }

    #[test]
    fn test_store_assigns_id_and_timestamp() {
        let store = Store::open_in_memory().unwrap();
        let before = OffsetDateTime::now_utc();

        let record = store.store(&climate(21.5, 40.25)).unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.temperature, 21.5);
        assert_eq!(record.humidity, 40.25);
        assert!(record.created_at >= before);
        assert!(record.created_at <= OffsetDateTime::now_utc());
    }

    #[test]
    fn test_recent_is_newest_first() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..5 {
            store.store(&climate(20.0 + f64::from(i), 50.0)).unwrap();
        }

        let records = store.recent(3).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].temperature, 24.0);
        assert_eq!(records[1].temperature, 23.0);
        assert_eq!(records[2].temperature, 22.0);
        assert!(records[0].created_at >= records[2].created_at);
        assert_eq!(store.count().unwrap(), 5);
    }

    #[test]
    fn test_round_trips_timestamp() {
        let store = Store::open_in_memory().unwrap();
        let stored = store.store(&climate(18.0, 60.0)).unwrap();

        let loaded = store.recent(1).unwrap();
        assert_eq!(loaded[0].id, stored.id);
        assert_eq!(
            loaded[0].created_at.unix_timestamp(),
            stored.created_at.unix_timestamp()
        );
    }

    #[test]
    fn test_rejects_non_finite_values() {
        let store = Store::open_in_memory().unwrap();
        let err = store.store(&climate(f64::NAN, 50.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_empty_store() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.recent(10).unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_open_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.db");

        {
            let store = Store::open(&path).unwrap();
            store.store(&climate(22.0, 45.0)).unwrap();
        }
        assert!(path.exists());

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
