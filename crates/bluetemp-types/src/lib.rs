//! Platform-agnostic types for BLE environmental sensing peripherals.
//!
//! This crate provides the shared vocabulary used by bluetemp-core,
//! bluetemp-store and the command-line tool.
//!
//! # Features
//!
//! - Sensor roles and their characteristic UUIDs
//! - Decoded readings and the temperature/humidity record
//! - The wire codec for characteristic payloads
//!
//! # Example
//!
//! ```
//! use bluetemp_types::{codec, Reading, Role};
//!
//! let value = codec::decode(&[0x10, 0x0B]).unwrap();
//! let reading = Reading::new(Role::Temperature, value);
//! assert_eq!(reading.to_string(), "28.32°C");
//! ```

pub mod codec;
pub mod error;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use types::{Climate, Reading, Role};
pub use uuid as uuids;
