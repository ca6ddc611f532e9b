//! Error types for bluetemp-store.

use std::path::PathBuf;

/// Result type for bluetemp-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bluetemp-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The database was written by a newer version.
    #[error("Database schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },

    /// A value cannot be stored.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}
