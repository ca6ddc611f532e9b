//! BLE protocol library for environmental sensing peripherals.
//!
//! This crate finds one peripheral by id or address, connects to it,
//! resolves its temperature, humidity and battery characteristics, and
//! reads them. Every step is bounded and de-duplicated:
//!
//! - **Discovery** waits for the radio, scans filtered by the Environmental
//!   Sensing service and gives up after 10 s by default
//! - **Connection setup** enumerates the service and resolves as soon as
//!   every requested characteristic is found, within 5 s by default
//! - **Reads** run concurrently over one connection and the peripheral is
//!   disconnected afterwards
//! - **Interrupts** disconnect the known peripheral on a best-effort basis
//!
//! Concurrent callers share a single scan and a single connection attempt.
//! Failures are forgotten so the next call starts fresh; nothing retries
//! on its own.
//!
//! # Characteristics
//!
//! | Role | UUID | Unit |
//! |------|------|------|
//! | Temperature | `2a6e` | °C |
//! | Humidity | `2a6f` | % |
//! | Battery | `2a19` | % |
//!
//! Each value is a little-endian `u16` in hundredths, see
//! [`bluetemp_types::codec`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use bluetemp_core::{PlatformTransport, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(PlatformTransport::new().await?);
//!     let session = Session::new(transport, SessionConfig::new("A4:C1:38:F0:E9:D2"))?;
//!
//!     let climate = session.read_climate().await?;
//!     println!("{:.2}°C, {:.2}%", climate.temperature, climate.humidity);
//!
//!     let battery = session.read_battery().await?;
//!     println!("Battery: {battery:.2}%");
//!
//!     Ok(())
//! }
//! ```

pub mod completion;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod guard;
pub mod lifecycle;
pub mod mock;
pub mod pending;
pub mod peripheral;
pub mod platform;
pub mod readings;
pub mod scan;
pub mod session;
pub mod traits;
pub mod util;

// Core exports
pub use config::SessionConfig;
pub use error::{Error, Result, TransportError, TransportResult};
pub use lifecycle::{Lifecycle, Outcome, interrupt};
pub use session::Session;

pub use completion::{Completion, Waiter};
pub use connection::{CharacteristicSet, ConnectOptions, ConnectionSession};
pub use events::{Advertisement, LinkState, RadioState};
pub use guard::{DEFAULT_CONNECTION_TIMEOUT, DEFAULT_SCAN_TIMEOUT, Deadline};
pub use mock::{MockPeripheral, MockPeripheralBuilder, MockTransport};
pub use pending::{Pending, PendingSlot, SlotState};
pub use peripheral::PeripheralHandle;
pub use platform::{PlatformPeripheral, PlatformTransport};
pub use readings::{read_all, read_value};
pub use scan::{DiscoverySession, ScanOptions};
pub use traits::{Characteristic, Peripheral, Service, Transport};
pub use util::format_peripheral_id;

// Re-export from bluetemp-types
pub use bluetemp_types::uuid as uuids;
pub use bluetemp_types::{Climate, Reading, Role};
