//! Local persistence for climate records.
//!
//! This crate is the sink a completed climate read is handed to. Each
//! record is stamped with its creation time by the store itself and kept
//! in a SQLite database.
//!
//! # Example
//!
//! ```no_run
//! use bluetemp_store::Store;
//! use bluetemp_types::Climate;
//!
//! let store = Store::open_default()?;
//! let record = store.store(&Climate { temperature: 21.5, humidity: 40.0 })?;
//! println!("Stored #{} at {}", record.id, record.created_at);
//!
//! for record in store.recent(10)? {
//!     println!("{:.2}°C {:.2}%", record.temperature, record.humidity);
//! }
//! # Ok::<(), bluetemp_store::Error>(())
//! ```

mod error;
mod models;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::StoredRecord;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/bluetemp/records.db`
/// - macOS: `~/Library/Application Support/bluetemp/records.db`
/// - Windows: `C:\Users\<user>\AppData\Local\bluetemp\records.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("bluetemp")
        .join("records.db")
}
