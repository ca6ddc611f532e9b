//! Wire codec for characteristic values.
//!
//! Peripherals report each value as a little-endian unsigned integer in
//! hundredths of the engineering unit: `0x10 0x0B` is `0x0B10` = 2832, which
//! decodes to `28.32`. An empty payload is a distinct result, not zero.
//!
//! # Example
//!
//! ```
//! use bluetemp_types::codec;
//!
//! assert_eq!(codec::decode(&[0x10, 0x0B]), Some(28.32));
//! assert_eq!(codec::decode(&[]), None);
//! ```

use bytes::Buf;

/// Divisor applied to the raw integer.
pub const SCALE: f64 = 100.0;

/// Decode a raw characteristic payload.
///
/// Returns `None` for a zero-length payload. Any other length is accepted:
/// the bytes are read least significant first. Never panics.
#[must_use]
pub fn decode(data: &[u8]) -> Option<f64> {
    let raw = match data.len() {
        0 => return None,
        2 => {
            let mut buf = data;
            f64::from(buf.get_u16_le())
        }
        _ => data
            .iter()
            .rev()
            .fold(0.0, |acc, &byte| acc * 256.0 + f64::from(byte)),
    };
    Some(raw / SCALE)
}

/// Encode a value into the two-byte wire format.
///
/// Returns `None` if the value is negative, not finite, or too large for
/// a `u16` after scaling.
#[must_use]
pub fn encode(value: f64) -> Option<[u8; 2]> {
    let raw = (value * SCALE).round();
    if !raw.is_finite() || raw < 0.0 || raw > f64::from(u16::MAX) {
        return None;
    }
    // Range checked above.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let raw = raw as u16;
    Some(raw.to_le_bytes())
}

/// Format a decoded value with two decimals.
#[must_use]
pub fn format_value(value: f64) -> String {
    format!("{value:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_observed_temperature() {
        assert_eq!(decode(&[0x10, 0x0B]), Some(28.32));
    }

    #[test]
    fn test_decode_empty_is_none() {
        assert_eq!(decode(&[]), None);
    }

    #[test]
    fn test_decode_zero_is_not_empty() {
        assert_eq!(decode(&[0x00, 0x00]), Some(0.0));
    }

    #[test]
    fn test_decode_single_byte() {
        // Battery level peripherals sometimes send one byte
        assert_eq!(decode(&[0x64]), Some(1.0));
    }

    #[test]
    fn test_decode_max_u16() {
        assert_eq!(decode(&[0xFF, 0xFF]), Some(655.35));
    }

    #[test]
    fn test_decode_four_bytes() {
        // 0x00010000 = 65536
        assert_eq!(decode(&[0x00, 0x00, 0x01, 0x00]), Some(655.36));
    }

    #[test]
    fn test_encode_observed_temperature() {
        assert_eq!(encode(28.32), Some([0x10, 0x0B]));
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        assert_eq!(encode(-1.0), None);
        assert_eq!(encode(655.36), None);
        assert_eq!(encode(f64::NAN), None);
        assert_eq!(encode(f64::INFINITY), None);
    }

    #[test]
    fn test_format_value_two_decimals() {
        assert_eq!(format_value(28.32), "28.32");
        assert_eq!(format_value(45.0), "45.00");
        assert_eq!(format_value(0.5), "0.50");
    }

    proptest! {
        /// Decoding arbitrary payloads never panics.
        #[test]
        fn decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = decode(&data);
        }

        /// Only the empty payload decodes to None.
        #[test]
        fn decode_is_some_for_non_empty(data in proptest::collection::vec(any::<u8>(), 1..16)) {
            prop_assert!(decode(&data).is_some());
        }

        /// Two-byte payloads decode to the little-endian integer over 100.
        #[test]
        fn decode_two_bytes_is_little_endian(lo: u8, hi: u8) {
            let expected = f64::from(u16::from_le_bytes([lo, hi])) / 100.0;
            prop_assert_eq!(decode(&[lo, hi]), Some(expected));
        }

        /// Decoded values are never negative.
        #[test]
        fn decode_is_non_negative(data in proptest::collection::vec(any::<u8>(), 1..9)) {
            let value = decode(&data).unwrap_or_default();
            prop_assert!(value >= 0.0);
        }
    }
}
