//! Database schema.
//!
//! The schema version is kept in SQLite's `user_version` pragma. Entry `n` of
//! [`MIGRATIONS`] upgrades a database from version `n` to `n + 1`, each in its
//! own transaction.

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Error, Result};

const MIGRATIONS: &[&str] = &[
    // 1: climate records
    "CREATE TABLE records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        temperature REAL NOT NULL,
        humidity REAL NOT NULL,
        created_at TEXT NOT NULL
    );",
];

/// Version of a fully migrated database.
pub const SCHEMA_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring the database up to [`SCHEMA_VERSION`].
pub fn initialize(conn: &mut Connection) -> Result<()> {
    let current = user_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(Error::UnsupportedSchema {
            found: current,
            supported: SCHEMA_VERSION,
        });
    }

    for (version, sql) in (1..).zip(MIGRATIONS).skip(current as usize) {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        debug!(version, "Applied schema migration");
    }
    Ok(())
}

fn user_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
