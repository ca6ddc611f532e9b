//! Data models for stored data.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use bluetemp_types::Climate;

/// A climate record stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Database row ID.
    pub id: i64,
    /// Temperature in °C.
    pub temperature: f64,
    /// Relative humidity in %.
    pub humidity: f64,
    /// When the store accepted the record.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl StoredRecord {
    /// The climate values of this record.
    pub fn climate(&self) -> Climate {
        Climate {
            temperature: self.temperature,
            humidity: self.humidity,
        }
    }
}
