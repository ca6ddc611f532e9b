//! Utility functions for bluetemp-core.

use btleplug::platform::PeripheralId;

/// Address reported by platforms that hide the real one.
pub const PLACEHOLDER_ADDRESS: &str = "00:00:00:00:00:00";

/// Format a peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms they are derived
/// from the Bluetooth address. The `PeripheralId(...)` wrapper of the debug
/// form is stripped.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    strip_wrapper(&format!("{id:?}")).to_string()
}

fn strip_wrapper(debug: &str) -> &str {
    debug
        .strip_prefix("PeripheralId(")
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(debug)
}

/// Whether `address` is the all-zero placeholder CoreBluetooth reports.
pub fn is_placeholder_address(address: &str) -> bool {
    address == PLACEHOLDER_ADDRESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_wrapper() {
        assert_eq!(strip_wrapper("PeripheralId(hci0/dev_A4_C1)"), "hci0/dev_A4_C1");
        assert_eq!(strip_wrapper("A4:C1:38:F0:E9:D2"), "A4:C1:38:F0:E9:D2");
    }

    #[test]
    fn test_placeholder_address() {
        assert!(is_placeholder_address("00:00:00:00:00:00"));
        assert!(!is_placeholder_address("A4:C1:38:F0:E9:D2"));
    }
}
