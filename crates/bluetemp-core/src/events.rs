//! Radio, link and advertisement events.
//!
//! Transports publish radio power state through a `watch` channel and
//! advertisements through a `broadcast` channel. Peripheral handles track
//! their link state the same way.

use std::fmt;
use std::sync::Arc;

use crate::traits::Peripheral;
use crate::util::is_placeholder_address;

/// Power state of the local radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RadioState {
    /// Not yet reported by the platform.
    #[default]
    Unknown,
    /// Ready to scan.
    PoweredOn,
    /// Switched off or unavailable.
    PoweredOff,
}

impl RadioState {
    /// Whether the radio has reported a definite state.
    #[must_use]
    pub fn is_known(self) -> bool {
        self != RadioState::Unknown
    }
}

impl fmt::Display for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioState::Unknown => write!(f, "unknown"),
            RadioState::PoweredOn => write!(f, "powered on"),
            RadioState::PoweredOff => write!(f, "powered off"),
        }
    }
}

/// Link state of a discovered peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    /// Seen in an advertisement, never connected.
    #[default]
    Discovered,
    /// A connect call is in flight.
    Connecting,
    /// The link is up.
    Connected,
    /// The link is down, either on request or unsolicited.
    Disconnected,
}

/// A peripheral seen while scanning.
#[derive(Clone)]
pub struct Advertisement {
    /// Platform identifier of the peripheral.
    pub id: String,
    /// Bluetooth address of the peripheral.
    pub address: String,
    /// Advertised local name.
    pub local_name: Option<String>,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
    /// The peripheral itself.
    pub peripheral: Arc<dyn Peripheral>,
}

impl Advertisement {
    /// Whether this advertisement is from `target`, by id or by address.
    ///
    /// Comparison ignores ASCII case since platforms disagree on how
    /// addresses are printed. A placeholder address never matches.
    #[must_use]
    pub fn matches(&self, target: &str) -> bool {
        if target.is_empty() {
            return false;
        }
        self.id.eq_ignore_ascii_case(target)
            || (!is_placeholder_address(&self.address) && self.address.eq_ignore_ascii_case(target))
    }
}

impl fmt::Debug for Advertisement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advertisement")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("local_name", &self.local_name)
            .field("rssi", &self.rssi)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPeripheral;

    fn advertisement(id: &str, address: &str) -> Advertisement {
        let peripheral = Arc::new(MockPeripheral::builder().id(id).address(address).build());
        Advertisement {
            id: id.to_string(),
            address: address.to_string(),
            local_name: None,
            rssi: Some(-60),
            peripheral,
        }
    }

    #[test]
    fn test_matches_by_id() {
        let ad = advertisement("a4c138f0e9d2", "A4:C1:38:F0:E9:D2");
        assert!(ad.matches("a4c138f0e9d2"));
    }

    #[test]
    fn test_matches_by_address_ignoring_case() {
        let ad = advertisement("hci0/dev_A4_C1_38_F0_E9_D2", "A4:C1:38:F0:E9:D2");
        assert!(ad.matches("A4:C1:38:F0:E9:D2"));
        assert!(ad.matches("a4:c1:38:f0:e9:d2"));
    }

    #[test]
    fn test_does_not_match_other_peripheral() {
        let ad = advertisement("a4c138f0e9d2", "A4:C1:38:F0:E9:D2");
        assert!(!ad.matches("a4c138000000"));
        assert!(!ad.matches(""));
    }

    #[test]
    fn test_placeholder_address_never_matches() {
        let ad = advertisement("6A1F3C52-7E0B-4D7A-9C1E-2B5D8F0A4E91", "00:00:00:00:00:00");
        assert!(!ad.matches("00:00:00:00:00:00"));
        assert!(ad.matches("6a1f3c52-7e0b-4d7a-9c1e-2b5d8f0a4e91"));
    }

    #[test]
    fn test_radio_state_default_is_unknown() {
        assert_eq!(RadioState::default(), RadioState::Unknown);
        assert!(!RadioState::Unknown.is_known());
        assert!(RadioState::PoweredOff.is_known());
    }

    #[test]
    fn test_advertisement_debug_omits_peripheral() {
        let ad = advertisement("abc", "AA:BB:CC:DD:EE:FF");
        let debug = format!("{ad:?}");
        assert!(debug.contains("abc"));
        assert!(debug.contains(".."));
    }
}
