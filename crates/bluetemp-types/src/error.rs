//! Error types for bluetemp-types.

use thiserror::Error;

/// Errors that can occur when parsing sensor types from text or identifiers.
///
/// Platform-agnostic: BLE errors belong in bluetemp-core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The name does not match any sensor role.
    #[error("Unknown sensor role: {0} (expected temperature, humidity or battery)")]
    UnknownRole(String),

    /// The UUID is not one of the known characteristics.
    #[error("Unknown characteristic: {0}")]
    UnknownCharacteristic(uuid::Uuid),
}

/// Result type alias using bluetemp-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
