//! Bluetooth UUIDs for environmental sensing peripherals.
//!
//! All identifiers are 16-bit assigned numbers expanded onto the Bluetooth
//! base UUID (`0000xxxx-0000-1000-8000-00805f9b34fb`).

use uuid::{Uuid, uuid};

/// The Bluetooth base UUID with a zero short form.
pub const BLUETOOTH_BASE: Uuid = uuid!("00000000-0000-1000-8000-00805f9b34fb");

// --- Service UUIDs ---

/// Environmental Sensing service (`0x181A`).
pub const ENVIRONMENTAL_SENSING_SERVICE: Uuid = uuid!("0000181a-0000-1000-8000-00805f9b34fb");

// --- Characteristic UUIDs ---

/// Temperature characteristic (`0x2A6E`).
pub const TEMPERATURE: Uuid = uuid!("00002a6e-0000-1000-8000-00805f9b34fb");

/// Humidity characteristic (`0x2A6F`).
pub const HUMIDITY: Uuid = uuid!("00002a6f-0000-1000-8000-00805f9b34fb");

/// Battery level characteristic (`0x2A19`).
pub const BATTERY_LEVEL: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");

/// Expand a 16-bit assigned number onto the Bluetooth base UUID.
///
/// ```
/// use bluetemp_types::uuids::{from_short, TEMPERATURE};
///
/// assert_eq!(from_short(0x2a6e), TEMPERATURE);
/// ```
#[must_use]
pub fn from_short(short: u16) -> Uuid {
    let (_, d2, d3, d4) = BLUETOOTH_BASE.as_fields();
    Uuid::from_fields(u32::from(short), d2, d3, d4)
}

/// The 16-bit short form of a UUID, if it sits on the Bluetooth base.
#[must_use]
pub fn short_form(uuid: &Uuid) -> Option<u16> {
    let (d1, d2, d3, d4) = uuid.as_fields();
    let (_, b2, b3, b4) = BLUETOOTH_BASE.as_fields();
    if d2 == b2 && d3 == b3 && d4 == b4 {
        u16::try_from(d1).ok()
    } else {
        None
    }
}
